use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use url::Url;

use super::theme::Palette;
use crate::api::{Channel, MediaItem, MediaPost};
use crate::browser::{self, MediaBrowser, MediaKind};

pub const CARD_WIDTH: u16 = 30;
pub const CARD_GAP: u16 = 2;
pub const CARD_STRIDE: u16 = CARD_WIDTH + CARD_GAP;
pub const CARD_HEIGHT: u16 = 7;

const INNER_WIDTH: usize = CARD_WIDTH as usize - 4;

pub const CHANNEL_FALLBACK_IMAGE: &str =
    "https://www.redditstatic.com/desktop2x/img/favicon/android-icon-192x192.png";

#[derive(Debug, Clone, PartialEq)]
pub struct CardSpec {
    pub title: String,
    pub badge: Option<String>,
    pub alert_badge: bool,
    pub details: [String; 3],
    pub link: String,
}

impl CardSpec {
    fn render(&self, selected: bool, palette: &Palette) -> Vec<Vec<Span<'static>>> {
        let border = if selected {
            Style::default().fg(palette.border_focused)
        } else {
            Style::default().fg(palette.border_idle)
        };
        let body_bg = if selected {
            Style::default().bg(palette.panel_selected_bg)
        } else {
            Style::default().bg(palette.panel_bg)
        };
        let title_style = body_bg
            .fg(palette.text_primary)
            .add_modifier(Modifier::BOLD);
        let detail_style = body_bg.fg(palette.text_secondary);
        let link_style = body_bg.fg(palette.accent);
        let badge_style = if self.alert_badge {
            body_bg.fg(palette.error).add_modifier(Modifier::BOLD)
        } else {
            body_bg.fg(palette.warning)
        };

        let horizontal = "─".repeat(CARD_WIDTH as usize - 2);
        let framed = |content: Vec<Span<'static>>| {
            let mut line = vec![Span::styled("│ ", border)];
            line.extend(content);
            line.push(Span::styled(" │", border));
            line
        };

        let mut lines = Vec::with_capacity(CARD_HEIGHT as usize);
        lines.push(vec![Span::styled(format!("╭{horizontal}╮"), border)]);

        let title_line = match &self.badge {
            Some(badge) => {
                let badge_width = UnicodeWidthStr::width(badge.as_str());
                let title_width = INNER_WIDTH.saturating_sub(badge_width + 1);
                vec![
                    Span::styled(fit(&self.title, title_width), title_style),
                    Span::styled(" ", body_bg),
                    Span::styled(fit(badge, INNER_WIDTH - title_width - 1), badge_style),
                ]
            }
            None => vec![Span::styled(fit(&self.title, INNER_WIDTH), title_style)],
        };
        lines.push(framed(title_line));
        for detail in &self.details {
            lines.push(framed(vec![Span::styled(
                fit(detail, INNER_WIDTH),
                detail_style,
            )]));
        }
        lines.push(framed(vec![Span::styled(
            fit(&format!("▣ {}", self.link), INNER_WIDTH),
            link_style,
        )]));
        lines.push(vec![Span::styled(format!("╰{horizontal}╯"), border)]);
        lines
    }
}

pub fn card_row_lines(
    cards: &[CardSpec],
    selected: Option<usize>,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new(); CARD_HEIGHT as usize];
    for (index, card) in cards.iter().enumerate() {
        let rendered = card.render(selected == Some(index), palette);
        for (row, spans) in rows.iter_mut().zip(rendered) {
            if index > 0 {
                row.push(Span::raw(" ".repeat(CARD_GAP as usize)));
            }
            row.extend(spans);
        }
    }
    rows.into_iter().map(Line::from).collect()
}

pub fn row_width(count: usize) -> u32 {
    if count == 0 {
        0
    } else {
        count as u32 * u32::from(CARD_STRIDE) - u32::from(CARD_GAP)
    }
}

pub fn card_span(index: usize) -> (u32, u32) {
    let start = index as u32 * u32::from(CARD_STRIDE);
    (start, start + u32::from(CARD_WIDTH))
}

pub fn channel_card(channel: &Channel) -> CardSpec {
    CardSpec {
        title: format!("r/{}", channel_name(channel)),
        badge: channel.nsfw().then(|| "NSFW".to_string()),
        alert_badge: true,
        details: [
            channel_summary(channel),
            channel.kind.clone().unwrap_or_else(|| "Subreddit".to_string()),
            grouped_subscribers(channel.subscriber_count),
        ],
        link: url_label(card_image(channel)),
    }
}

pub fn media_card(item: &MediaItem) -> CardSpec {
    CardSpec {
        title: channel_name(item).to_string(),
        badge: item.nsfw().then(|| "NSFW".to_string()),
        alert_badge: true,
        details: [
            channel_summary(item),
            item.kind.clone().unwrap_or_else(|| "Subreddit".to_string()),
            compact_subscribers(item.subscriber_count),
        ],
        link: url_label(card_image(item)),
    }
}

pub fn post_card(post: &MediaPost, media: &MediaBrowser) -> CardSpec {
    let kind = MediaKind::of(post);
    let status = match kind {
        MediaKind::Image if media.image_failed(post) => "Image not available".to_string(),
        MediaKind::Image => "Image".to_string(),
        MediaKind::Video => "Video".to_string(),
        MediaKind::Link => "Link".to_string(),
    };
    CardSpec {
        title: post.title.clone(),
        badge: Some(kind.label().to_uppercase()),
        alert_badge: false,
        details: [
            format!("u/{}", post.author),
            format!(
                "▲ {} · {}",
                post.score,
                browser::format_date(post.created_utc.as_deref())
            ),
            status,
        ],
        link: url_label(media.display_url(post)),
    }
}

fn channel_name(channel: &Channel) -> &str {
    [&channel.display_name, &channel.name, &channel.title]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(String::as_str)
        .unwrap_or("")
}

fn channel_summary(channel: &Channel) -> String {
    channel
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(channel.title.as_str())
        .to_string()
}

pub fn card_image(channel: &Channel) -> &str {
    [channel.banner_url.as_deref(), channel.image_url.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(CHANNEL_FALLBACK_IMAGE)
}

pub fn compact_subscribers(count: i64) -> String {
    if count == 0 {
        "0 subscribers".to_string()
    } else if count >= 1_000_000 {
        format!("{:.1}M subscribers", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K subscribers", count as f64 / 1_000.0)
    } else {
        format!("{count} subscribers")
    }
}

pub fn grouped_subscribers(count: i64) -> String {
    format!("{} subscribers", group_digits(count))
}

fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn url_label(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().trim_start_matches("www.");
            let path = url.path().trim_end_matches('/');
            format!("{host}{path}")
        }
        Err(_) => raw.to_string(),
    }
}

/// Truncates with an ellipsis or pads with spaces to exactly `width` columns.
pub fn fit(text: &str, width: usize) -> String {
    let clean: String = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    let mut out = String::new();
    let mut used = 0;
    if UnicodeWidthStr::width(clean.as_str()) <= width {
        used = UnicodeWidthStr::width(clean.as_str());
        out = clean;
    } else if width > 0 {
        let limit = width - 1;
        for ch in clean.chars() {
            let w = UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + w > limit {
                break;
            }
            out.push(ch);
            used += w;
        }
        out.push('…');
        used += 1;
    }
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Limit, TimeFrame};

    fn line_width(line: &Line<'_>) -> usize {
        line.spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum()
    }

    #[test]
    fn compact_counts() {
        assert_eq!(compact_subscribers(0), "0 subscribers");
        assert_eq!(compact_subscribers(999), "999 subscribers");
        assert_eq!(compact_subscribers(15_300), "15.3K subscribers");
        assert_eq!(compact_subscribers(1_234_567), "1.2M subscribers");
    }

    #[test]
    fn grouped_counts() {
        assert_eq!(grouped_subscribers(0), "0 subscribers");
        assert_eq!(grouped_subscribers(1_234), "1,234 subscribers");
        assert_eq!(grouped_subscribers(31_000_000), "31,000,000 subscribers");
        assert_eq!(grouped_subscribers(123), "123 subscribers");
    }

    #[test]
    fn image_prefers_banner_then_image() {
        let mut channel = Channel::default();
        assert_eq!(card_image(&channel), CHANNEL_FALLBACK_IMAGE);
        channel.image_url = Some("https://i.example/img.png".into());
        assert_eq!(card_image(&channel), "https://i.example/img.png");
        channel.banner_url = Some(String::new());
        assert_eq!(card_image(&channel), "https://i.example/img.png");
        channel.banner_url = Some("https://i.example/banner.png".into());
        assert_eq!(card_image(&channel), "https://i.example/banner.png");
    }

    #[test]
    fn fit_pads_and_truncates_by_display_width() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 4), "abc…");
        assert_eq!(UnicodeWidthStr::width(fit("猫猫猫猫", 5).as_str()), 5);
        assert_eq!(fit("a\nb", 3), "a b");
    }

    #[test]
    fn card_rows_have_uniform_width() {
        let mut channel = Channel {
            display_name: "a_rather_long_channel_name_indeed".into(),
            subscriber_count: 12_345,
            ..Channel::default()
        };
        channel.is_nsfw = Some(true);
        let cards = vec![channel_card(&channel), media_card(&channel)];
        let lines = card_row_lines(&cards, Some(1), &Palette::default());
        assert_eq!(lines.len(), CARD_HEIGHT as usize);
        for line in &lines {
            assert_eq!(line_width(line) as u32, row_width(2));
        }
    }

    #[test]
    fn post_card_reports_failed_image() {
        let mut media = MediaBrowser::new("pics", TimeFrame::Week, Limit::TwentyFive);
        let post = MediaPost {
            title: "sunset".into(),
            url: "https://i.example/sunset.jpg".into(),
            media_type: "image".into(),
            ..MediaPost::default()
        };
        media.mark_image_failed(&post.url);
        let card = post_card(&post, &media);
        assert_eq!(card.details[2], "Image not available");
        assert_eq!(card.link, "placehold.co/400x300");
    }

    #[test]
    fn url_label_strips_scheme() {
        assert_eq!(url_label("https://www.reddit.com/r/pics/"), "reddit.com/r/pics");
        assert_eq!(url_label("not a url"), "not a url");
    }
}
