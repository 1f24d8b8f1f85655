pub const EDGE_TOLERANCE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content<'a> {
    Loading,
    Error(&'a str),
    Items,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Carousel {
    scroll_left: u32,
    target: u32,
    scroll_width: u32,
    client_width: u32,
    loading: bool,
    error: Option<String>,
}

impl Carousel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(loading: bool, error: Option<String>) -> Self {
        Self {
            loading,
            error,
            ..Self::default()
        }
    }

    pub fn scroll_left(&self) -> u32 {
        self.scroll_left
    }

    pub fn client_width(&self) -> u32 {
        self.client_width
    }

    pub fn scroll_width(&self) -> u32 {
        self.scroll_width
    }

    /// Updates the measured widths. Offsets are clamped to the new range.
    pub fn set_dimensions(&mut self, scroll_width: u32, client_width: u32) {
        self.scroll_width = scroll_width;
        self.client_width = client_width;
        let max = self.max_offset();
        self.scroll_left = self.scroll_left.min(max);
        self.target = self.target.min(max);
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn content(&self) -> Content<'_> {
        if self.loading {
            Content::Loading
        } else if let Some(error) = self.error.as_deref() {
            Content::Error(error)
        } else {
            Content::Items
        }
    }

    pub fn show_left(&self) -> bool {
        self.scroll_left > 0
    }

    pub fn show_right(&self) -> bool {
        u64::from(self.scroll_left) + u64::from(self.client_width) + u64::from(EDGE_TOLERANCE)
            < u64::from(self.scroll_width)
    }

    pub fn scroll(&mut self, direction: Direction) {
        let step = (self.client_width.saturating_mul(3) / 4).max(1);
        self.target = match direction {
            Direction::Left => self.target.saturating_sub(step),
            Direction::Right => self.target.saturating_add(step).min(self.max_offset()),
        };
    }

    pub fn reveal(&mut self, start: u32, end: u32) {
        if start < self.target {
            self.target = start;
        } else if end > self.target + self.client_width {
            self.target = end.saturating_sub(self.client_width);
        }
        self.target = self.target.min(self.max_offset());
    }

    pub fn tick(&mut self) -> bool {
        if self.scroll_left == self.target {
            return false;
        }
        let distance = self.scroll_left.abs_diff(self.target);
        let step = (distance / 2).max(1);
        if self.scroll_left < self.target {
            self.scroll_left += step;
        } else {
            self.scroll_left -= step;
        }
        self.scroll_left != self.target
    }

    pub fn is_animating(&self) -> bool {
        self.scroll_left != self.target
    }

    pub fn settle(&mut self) {
        self.scroll_left = self.target;
    }

    fn max_offset(&self) -> u32 {
        self.scroll_width.saturating_sub(self.client_width)
    }
}
