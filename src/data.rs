use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::api::{self, Channel, LoginResponse, MediaItem, MediaPost, RegisterRequest, User};
use crate::browser::{Limit, TimeFrame};

pub trait AuthService: Send + Sync {
    fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;
    fn register(&self, request: &RegisterRequest) -> Result<()>;
}

pub trait ChannelService: Send + Sync {
    fn popular_channels(&self) -> Result<Vec<Channel>>;
    fn keywords(&self) -> Result<Vec<String>>;
    fn channels_for_keyword(&self, keyword: &str) -> Result<Vec<Channel>>;
}

pub trait MediaService: Send + Sync {
    fn subreddit_media(
        &self,
        subreddit: &str,
        limit: Limit,
        time_frame: TimeFrame,
    ) -> Result<Vec<MediaPost>>;
    fn search_media(&self, query: &str) -> Result<Vec<MediaItem>>;
    fn probe_image(&self, url: &str) -> Result<()>;
}

pub struct ApiAuthService {
    client: Arc<api::Client>,
}

impl ApiAuthService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl AuthService for ApiAuthService {
    fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.client
            .login(username, password)
            .context("log in")
    }

    fn register(&self, request: &RegisterRequest) -> Result<()> {
        self.client.register(request).context("register account")?;
        Ok(())
    }
}

pub struct ApiChannelService {
    client: Arc<api::Client>,
    search_limit: u32,
}

impl ApiChannelService {
    pub fn new(client: Arc<api::Client>, search_limit: u32) -> Self {
        Self {
            client,
            search_limit,
        }
    }
}

impl ChannelService for ApiChannelService {
    fn popular_channels(&self) -> Result<Vec<Channel>> {
        self.client
            .popular_channels()
            .context("fetch trending channels")
    }

    fn keywords(&self) -> Result<Vec<String>> {
        self.client.keywords().context("fetch keywords")
    }

    fn channels_for_keyword(&self, keyword: &str) -> Result<Vec<Channel>> {
        self.client
            .search_channels(keyword, self.search_limit)
            .with_context(|| format!("fetch channels for {keyword}"))
    }
}

pub struct ApiMediaService {
    client: Arc<api::Client>,
}

impl ApiMediaService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl MediaService for ApiMediaService {
    fn subreddit_media(
        &self,
        subreddit: &str,
        limit: Limit,
        time_frame: TimeFrame,
    ) -> Result<Vec<MediaPost>> {
        self.client
            .subreddit_media(subreddit, limit, time_frame)
            .with_context(|| format!("fetch media for r/{subreddit}"))
    }

    fn search_media(&self, query: &str) -> Result<Vec<MediaItem>> {
        self.client.search_media(query).context("search media")
    }

    fn probe_image(&self, url: &str) -> Result<()> {
        self.client.probe(url).context("load image")
    }
}

#[derive(Default)]
pub struct MockAuthService;

impl AuthService for MockAuthService {
    fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        if username.trim().is_empty() || password.is_empty() {
            bail!("Invalid username or password");
        }
        Ok(LoginResponse {
            token: format!("demo-{}", username.trim()),
            user: User {
                user_name: username.trim().to_string(),
                email: format!("{}@pentyflix.local", username.trim()),
                first_name: None,
                last_name: None,
            },
        })
    }

    fn register(&self, _request: &RegisterRequest) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockChannelService;

impl ChannelService for MockChannelService {
    fn popular_channels(&self) -> Result<Vec<Channel>> {
        Ok(vec![
            mock_channel("pics", 31_000_000),
            mock_channel("videos", 26_500_000),
            mock_channel("gifs", 21_300_000),
            mock_channel("earthporn", 23_800_000),
        ])
    }

    fn keywords(&self) -> Result<Vec<String>> {
        Ok(["cinema", "animation", "documentary", "music", "gaming"]
            .iter()
            .map(|s| s.to_string())
            .collect())
    }

    fn channels_for_keyword(&self, keyword: &str) -> Result<Vec<Channel>> {
        Ok((1..=6)
            .map(|i| mock_channel(&format!("{keyword}{i}"), 1_000 * i * i * i))
            .collect())
    }
}

#[derive(Default)]
pub struct MockMediaService;

impl MediaService for MockMediaService {
    fn subreddit_media(
        &self,
        subreddit: &str,
        limit: Limit,
        _time_frame: TimeFrame,
    ) -> Result<Vec<MediaPost>> {
        let count = limit.count().min(12) as i64;
        Ok((0..count)
            .map(|i| {
                let (media_type, is_video) = match i % 3 {
                    0 => ("image", false),
                    1 => ("video", true),
                    _ => ("link", false),
                };
                MediaPost {
                    title: format!("Sample post {} from r/{}", i + 1, subreddit),
                    author: "pentyflix".into(),
                    permalink: format!("/r/{subreddit}/comments/{i}"),
                    url: format!("https://example.com/{subreddit}/{i}"),
                    thumbnail: String::new(),
                    score: 100 * (count - i),
                    created_utc: Some((1_700_000_000 + i * 3_600).to_string()),
                    is_video,
                    media_type: media_type.into(),
                }
            })
            .collect())
    }

    fn search_media(&self, query: &str) -> Result<Vec<MediaItem>> {
        let query = query.trim().to_lowercase();
        Ok(MockChannelService
            .popular_channels()?
            .into_iter()
            .filter(|c| c.display_name.contains(&query))
            .collect())
    }

    fn probe_image(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

fn mock_channel(name: &str, subscribers: i64) -> Channel {
    Channel {
        id: None,
        name: format!("t5_{name}"),
        display_name: name.to_string(),
        title: name.to_string(),
        description: Some(format!("Sample channel r/{name}")),
        url: Some(format!("/r/{name}/")),
        subscriber_count: subscribers,
        is_nsfw: Some(false),
        icon_url: None,
        banner_url: None,
        created_utc: None,
        kind: Some("subreddit".into()),
        image_url: None,
    }
}
