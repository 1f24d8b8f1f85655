use std::collections::HashSet;
use std::fmt;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{self, MediaPost};
use crate::toast::Toast;

pub const IMAGE_FALLBACK_URL: &str = "https://placehold.co/400x300?text=Image+Not+Available";
pub const LIST_IMAGE_FALLBACK_URL: &str = "https://placehold.co/100x100?text=NA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Hour,
    Day,
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 6] = [
        TimeFrame::Hour,
        TimeFrame::Day,
        TimeFrame::Week,
        TimeFrame::Month,
        TimeFrame::Year,
        TimeFrame::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Hour => "hour",
            TimeFrame::Day => "day",
            TimeFrame::Week => "week",
            TimeFrame::Month => "month",
            TimeFrame::Year => "year",
            TimeFrame::All => "all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeFrame::Hour => "Last Hour",
            TimeFrame::Day => "Today",
            TimeFrame::Week => "This Week",
            TimeFrame::Month => "This Month",
            TimeFrame::Year => "This Year",
            TimeFrame::All => "All Time",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|frame| frame.as_str().eq_ignore_ascii_case(key))
    }

    pub fn cycle(self, delta: i32) -> Self {
        cycle(&Self::ALL, self, delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Limit {
    Ten,
    #[default]
    TwentyFive,
    Fifty,
    Hundred,
}

impl Limit {
    pub const ALL: [Limit; 4] = [Limit::Ten, Limit::TwentyFive, Limit::Fifty, Limit::Hundred];

    pub fn count(&self) -> u32 {
        match self {
            Limit::Ten => 10,
            Limit::TwentyFive => 25,
            Limit::Fifty => 50,
            Limit::Hundred => 100,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|limit| limit.count() == count)
    }

    pub fn cycle(self, delta: i32) -> Self {
        cycle(&Self::ALL, self, delta)
    }
}

impl TryFrom<u32> for Limit {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Limit::from_count(value).ok_or_else(|| format!("limit must be one of 10, 25, 50, 100 (got {value})"))
    }
}

impl From<Limit> for u32 {
    fn from(limit: Limit) -> Self {
        limit.count()
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} posts", self.count())
    }
}

fn cycle<T: Copy + PartialEq>(values: &[T], current: T, delta: i32) -> T {
    let len = values.len() as i32;
    let index = values.iter().position(|v| *v == current).unwrap_or(0) as i32;
    values[(index + delta).rem_euclid(len) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Grid => "Grid",
            ViewMode::List => "List",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Link,
}

impl MediaKind {
    pub fn of(post: &MediaPost) -> Self {
        if post.media_type.eq_ignore_ascii_case("image") {
            MediaKind::Image
        } else if post.is_video {
            MediaKind::Video
        } else {
            MediaKind::Link
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Link => "link",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub request_id: u64,
    pub subreddit: String,
    pub limit: Limit,
    pub time_frame: TimeFrame,
}

#[derive(Debug)]
pub struct MediaBrowser {
    subreddit: String,
    time_frame: TimeFrame,
    limit: Limit,
    view: ViewMode,
    items: Vec<MediaPost>,
    loading: bool,
    error: Option<String>,
    failed_images: HashSet<String>,
    selected: usize,
    next_request_id: u64,
    pending_request: Option<u64>,
}

impl MediaBrowser {
    pub fn new<S: Into<String>>(subreddit: S, time_frame: TimeFrame, limit: Limit) -> Self {
        Self {
            subreddit: subreddit.into(),
            time_frame,
            limit,
            view: ViewMode::Grid,
            items: Vec::new(),
            loading: true,
            error: None,
            failed_images: HashSet::new(),
            selected: 0,
            next_request_id: 1,
            pending_request: None,
        }
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    pub fn time_frame(&self) -> TimeFrame {
        self.time_frame
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn items(&self) -> &[MediaPost] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&MediaPost> {
        self.items.get(self.selected)
    }

    pub fn toggle_view(&mut self) {
        self.view = self.view.toggle();
    }

    pub fn set_time_frame(&mut self, frame: TimeFrame) -> Option<FetchRequest> {
        if frame == self.time_frame {
            return None;
        }
        self.time_frame = frame;
        Some(self.begin_fetch())
    }

    pub fn set_limit(&mut self, limit: Limit) -> Option<FetchRequest> {
        if limit == self.limit {
            return None;
        }
        self.limit = limit;
        Some(self.begin_fetch())
    }

    pub fn begin_fetch(&mut self) -> FetchRequest {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_request = Some(request_id);
        self.loading = true;
        self.error = None;
        FetchRequest {
            request_id,
            subreddit: self.subreddit.clone(),
            limit: self.limit,
            time_frame: self.time_frame,
        }
    }

    /// Applies a fetch outcome. Stale responses are ignored and yield no toast.
    pub fn apply_result(
        &mut self,
        request_id: u64,
        result: anyhow::Result<Vec<MediaPost>>,
    ) -> Option<Toast> {
        if self.pending_request != Some(request_id) {
            return None;
        }
        self.pending_request = None;
        self.loading = false;
        self.selected = 0;

        match result {
            Ok(items) => {
                let description = format!(
                    "Loaded {} items from r/{}",
                    items.len(),
                    self.subreddit
                );
                self.items = items;
                Some(Toast::success("Media loaded", description))
            }
            Err(err) if api::is_unexpected_shape(&err) => {
                self.items.clear();
                Some(Toast::error(
                    "Invalid response format",
                    "The server returned an unexpected response format",
                ))
            }
            Err(err) => {
                let message = api::server_message(&err).unwrap_or_else(|| err.to_string());
                self.items.clear();
                self.error = Some(message.clone());
                Some(Toast::error("Error loading media", message))
            }
        }
    }

    pub fn select_next(&mut self, delta: i32) {
        if self.items.is_empty() {
            self.selected = 0;
            return;
        }
        let max = self.items.len() as i64 - 1;
        let next = (self.selected as i64 + delta as i64).clamp(0, max);
        self.selected = next as usize;
    }

    pub fn mark_image_failed(&mut self, url: &str) {
        self.failed_images.insert(url.to_string());
    }

    pub fn display_url<'a>(&self, post: &'a MediaPost) -> &'a str {
        if MediaKind::of(post) == MediaKind::Image && self.failed_images.contains(&post.url) {
            match self.view {
                ViewMode::Grid => IMAGE_FALLBACK_URL,
                ViewMode::List => LIST_IMAGE_FALLBACK_URL,
            }
        } else {
            &post.url
        }
    }

    pub fn image_failed(&self, post: &MediaPost) -> bool {
        self.failed_images.contains(&post.url)
    }
}

pub fn format_date(created_utc: Option<&str>) -> String {
    created_utc
        .and_then(|raw| raw.trim().split('.').next().map(str::to_string))
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "Invalid date".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn post(url: &str, media_type: &str, is_video: bool) -> MediaPost {
        MediaPost {
            title: "post".into(),
            url: url.into(),
            media_type: media_type.into(),
            is_video,
            ..MediaPost::default()
        }
    }

    #[test]
    fn media_kind_prefers_image_type_over_video_flag() {
        assert_eq!(MediaKind::of(&post("a", "image", true)), MediaKind::Image);
        assert_eq!(MediaKind::of(&post("a", "video", true)), MediaKind::Video);
        assert_eq!(MediaKind::of(&post("a", "link", false)), MediaKind::Link);
    }

    #[test]
    fn filter_change_triggers_refetch_once() {
        let mut browser = MediaBrowser::new("pics", TimeFrame::Week, Limit::TwentyFive);
        assert!(browser.set_time_frame(TimeFrame::Week).is_none());
        let req = browser.set_time_frame(TimeFrame::Day).unwrap();
        assert_eq!(req.time_frame, TimeFrame::Day);
        let req = browser.set_limit(Limit::Hundred).unwrap();
        assert_eq!(req.limit.count(), 100);
        assert!(browser.is_loading());
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut browser = MediaBrowser::new("pics", TimeFrame::Week, Limit::TwentyFive);
        let first = browser.begin_fetch();
        let second = browser.begin_fetch();
        assert!(browser
            .apply_result(first.request_id, Ok(vec![post("x", "image", false)]))
            .is_none());
        assert!(browser.is_loading());
        let toast = browser.apply_result(second.request_id, Ok(vec![])).unwrap();
        assert_eq!(toast.description, "Loaded 0 items from r/pics");
        assert!(!browser.is_loading());
    }

    #[test]
    fn unexpected_shape_clears_items_without_inline_error() {
        let mut browser = MediaBrowser::new("pics", TimeFrame::Week, Limit::TwentyFive);
        let req = browser.begin_fetch();
        let err = anyhow::Error::new(api::ApiError::UnexpectedShape {
            endpoint: "Reddit/media/pics".into(),
        });
        let toast = browser.apply_result(req.request_id, Err(err)).unwrap();
        assert_eq!(toast.title, "Invalid response format");
        assert!(browser.items().is_empty());
        assert!(browser.error().is_none());
    }

    #[test]
    fn transport_failure_surfaces_inline_error() {
        let mut browser = MediaBrowser::new("pics", TimeFrame::Week, Limit::TwentyFive);
        let req = browser.begin_fetch();
        let toast = browser
            .apply_result(req.request_id, Err(anyhow!("connection refused")))
            .unwrap();
        assert_eq!(toast.title, "Error loading media");
        assert_eq!(browser.error(), Some("connection refused"));
    }

    #[test]
    fn failed_images_fall_back_to_placeholder() {
        let mut browser = MediaBrowser::new("pics", TimeFrame::Week, Limit::TwentyFive);
        let image = post("https://i.example/a.jpg", "image", false);
        assert_eq!(browser.display_url(&image), "https://i.example/a.jpg");
        browser.mark_image_failed(&image.url);
        assert_eq!(browser.display_url(&image), IMAGE_FALLBACK_URL);
        browser.toggle_view();
        assert_eq!(browser.view(), ViewMode::List);
        assert_eq!(browser.display_url(&image), LIST_IMAGE_FALLBACK_URL);
    }

    #[test]
    fn format_date_handles_bad_input() {
        assert_eq!(format_date(Some("0")), "Jan 1, 1970");
        assert_eq!(format_date(Some("1700000000.0")), "Nov 14, 2023");
        assert_eq!(format_date(Some("soon")), "Invalid date");
        assert_eq!(format_date(None), "Invalid date");
    }

    #[test]
    fn limits_cycle_and_deserialize() {
        assert_eq!(Limit::Hundred.cycle(1), Limit::Ten);
        assert_eq!(TimeFrame::Hour.cycle(-1), TimeFrame::All);
        let limit: Limit = serde_yaml::from_str("50").unwrap();
        assert_eq!(limit, Limit::Fifty);
        assert!(serde_yaml::from_str::<Limit>("30").is_err());
    }
}
