use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::browser::{Limit, TimeFrame};

pub const LOGIN_PATH: &str = "Auth/login";
pub const REGISTER_PATH: &str = "Auth/register";
pub const POPULAR_CHANNELS_PATH: &str = "reddit/Category/popular";
pub const SEARCH_CHANNELS_PATH: &str = "reddit/Category/search";
pub const KEYWORDS_PATH: &str = "NsfwKeywords";
pub const SUBREDDIT_MEDIA_PATH: &str = "Reddit/media";
pub const SEARCH_MEDIA_PATH: &str = "media/search";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api: invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api: request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api: {endpoint} returned {status}")]
    Status {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    #[error("api: unexpected response format from {endpoint}")]
    UnexpectedShape { endpoint: String },
    #[error("api: decode {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_unexpected_shape(&self) -> bool {
        matches!(self, ApiError::UnexpectedShape { .. })
    }
}

/// True when `err` (or anything it wraps) is a non-array list response.
pub fn is_unexpected_shape(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ApiError>()
            .map(ApiError::is_unexpected_shape)
            .unwrap_or(false)
    })
}

pub fn server_message(err: &anyhow::Error) -> Option<String> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<ApiError>()
            .and_then(ApiError::server_message)
            .map(str::to_string)
    })
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    base_url: Url,
    user_agent: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&crate::config::normalize_base_url(&config.base_url))?;
        let http = match config.http_client {
            Some(client) => client,
            None => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                HttpClient::builder()
                    .default_headers(headers)
                    .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                    .build()?
            }
        };
        let user_agent = if config.user_agent.trim().is_empty() {
            format!("pentyflix/{}", crate::VERSION)
        } else {
            config.user_agent
        };

        Ok(Client {
            http,
            base_url,
            user_agent,
        })
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest { username, password };
        let value = self.send(LOGIN_PATH, self.post(LOGIN_PATH, &[])?.json(&body))?;
        decode(LOGIN_PATH, value)
    }

    pub fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        self.send(REGISTER_PATH, self.post(REGISTER_PATH, &[])?.json(request))
    }

    pub fn popular_channels(&self) -> Result<Vec<Channel>, ApiError> {
        self.fetch_list(POPULAR_CHANNELS_PATH, &[])
    }

    pub fn search_channels(&self, query: &str, limit: u32) -> Result<Vec<Channel>, ApiError> {
        self.fetch_list(
            SEARCH_CHANNELS_PATH,
            &[("query", query.to_string()), ("limit", limit.to_string())],
        )
    }

    pub fn keywords(&self) -> Result<Vec<String>, ApiError> {
        self.fetch_list(KEYWORDS_PATH, &[])
    }

    pub fn subreddit_media(
        &self,
        subreddit: &str,
        limit: Limit,
        time_frame: TimeFrame,
    ) -> Result<Vec<MediaPost>, ApiError> {
        let name = subreddit.trim().trim_start_matches("r/");
        let path = format!(
            "{}/{}",
            SUBREDDIT_MEDIA_PATH,
            utf8_percent_encode(name, PATH_SEGMENT)
        );
        self.fetch_list(
            &path,
            &[
                ("limit", limit.count().to_string()),
                ("timeFrame", time_frame.as_str().to_string()),
            ],
        )
    }

    pub fn search_media(&self, query: &str) -> Result<Vec<MediaItem>, ApiError> {
        self.fetch_list(SEARCH_MEDIA_PATH, &[("query", query.to_string())])
    }

    pub fn probe(&self, url: &str) -> Result<(), ApiError> {
        let target = Url::parse(url)?;
        let resp = self
            .http
            .get(target)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "image/*")
            .send()?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                endpoint: url.to_string(),
                status: status.as_u16(),
                message: None,
            })
        }
    }

    fn fetch_list<T>(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let value = self.send(path, self.get(path, params)?)?;
        if !value.is_array() {
            warn!(endpoint = path, "response is not a list");
            return Err(ApiError::UnexpectedShape {
                endpoint: path.to_string(),
            });
        }
        decode(path, value)
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path, params)?;
        Ok(self.http.get(url).header(USER_AGENT, self.user_agent.clone()))
    }

    fn post(&self, path: &str, params: &[(&str, String)]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path, params)?;
        Ok(self
            .http
            .post(url)
            .header(USER_AGENT, self.user_agent.clone()))
    }

    fn send(&self, path: &str, req: RequestBuilder) -> Result<Value, ApiError> {
        debug!(endpoint = path, "api request");
        let resp = req.send()?;
        let status = resp.status();
        if status.is_success() {
            let text = resp.text()?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|source| ApiError::Decode {
                endpoint: path.to_string(),
                source,
            });
        }

        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message);
        warn!(endpoint = path, status = status.as_u16(), "api error");
        Err(ApiError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl User {
    pub fn initials(&self) -> String {
        let first = self.first_name.as_deref().and_then(|s| s.chars().next());
        let last = self.last_name.as_deref().and_then(|s| s.chars().next());
        if let (Some(first), Some(last)) = (first, last) {
            return format!("{first}{last}").to_uppercase();
        }
        if !self.user_name.is_empty() {
            return self.user_name.chars().take(2).collect::<String>().to_uppercase();
        }
        "U".to_string()
    }

    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                Some(format!("{first} {last}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub subscriber_count: i64,
    #[serde(default)]
    pub is_nsfw: Option<bool>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub created_utc: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Channel {
    pub fn handle(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else {
            &self.name
        }
    }

    pub fn nsfw(&self) -> bool {
        self.is_nsfw.unwrap_or(false)
    }
}

pub type MediaItem = Channel;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default, rename = "created_utc", deserialize_with = "string_or_number")]
    pub created_utc: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub media_type: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_decodes_camel_case_payload() {
        let channel: Channel = serde_json::from_value(serde_json::json!({
            "name": "t5_abc",
            "displayName": "earthporn",
            "title": "Earth",
            "subscriberCount": 1234,
            "isNsfw": false,
            "createdUtc": 1700000000,
            "type": "subreddit"
        }))
        .unwrap();
        assert_eq!(channel.handle(), "earthporn");
        assert_eq!(channel.subscriber_count, 1234);
        assert_eq!(channel.created_utc.as_deref(), Some("1700000000"));
        assert_eq!(channel.kind.as_deref(), Some("subreddit"));
        assert!(!channel.nsfw());
    }

    #[test]
    fn media_post_accepts_string_timestamps() {
        let post: MediaPost = serde_json::from_value(serde_json::json!({
            "title": "clip",
            "url": "https://v.example/clip.mp4",
            "created_utc": "1700000000",
            "isVideo": true,
            "mediaType": "video"
        }))
        .unwrap();
        assert!(post.is_video);
        assert_eq!(post.created_utc.as_deref(), Some("1700000000"));
    }

    #[test]
    fn initials_prefer_full_name() {
        let user = User {
            user_name: "moviebuff".into(),
            email: "m@example.com".into(),
            first_name: Some("ada".into()),
            last_name: Some("lovelace".into()),
        };
        assert_eq!(user.initials(), "AL");
        let bare = User {
            user_name: "moviebuff".into(),
            ..User::default()
        };
        assert_eq!(bare.initials(), "MO");
        assert_eq!(User::default().initials(), "U");
    }

    #[test]
    fn register_request_omits_missing_names() {
        let req = RegisterRequest {
            username: "neo".into(),
            email: "neo@example.com".into(),
            password: "password1".into(),
            first_name: None,
            last_name: Some("Anderson".into()),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("firstName").is_none());
        assert_eq!(value["lastName"], "Anderson");
    }

    #[test]
    fn endpoints_join_beneath_base_path() {
        let client = Client::new(ClientConfig {
            base_url: "http://localhost:5000/api".into(),
            ..Default::default()
        })
        .unwrap();
        let url = client
            .endpoint(
                SEARCH_CHANNELS_PATH,
                &[("query", "cute cats".into()), ("limit", "25".into())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/reddit/Category/search?query=cute+cats&limit=25"
        );
    }
}
