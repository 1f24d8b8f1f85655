use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_TOASTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
    created_at: Instant,
}

impl Toast {
    pub fn new<T: Into<String>, D: Into<String>>(kind: ToastKind, title: T, description: D) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            created_at: Instant::now(),
        }
    }

    pub fn success<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self::new(ToastKind::Success, title, description)
    }

    pub fn error<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self::new(ToastKind::Error, title, description)
    }

    pub fn info<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self::new(ToastKind::Info, title, description)
    }

    fn expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }
}

#[derive(Debug)]
pub struct Toasts {
    queue: VecDeque<Toast>,
    ttl: Duration,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            ttl,
        }
    }

    pub fn push(&mut self, toast: Toast) {
        if self.queue.len() == MAX_TOASTS {
            self.queue.pop_front();
        }
        self.queue.push_back(toast);
    }

    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.queue.len();
        let ttl = self.ttl;
        self.queue.retain(|toast| !toast.expired(ttl, now));
        before != self.queue.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_drops_expired_toasts() {
        let mut toasts = Toasts::new(Duration::from_millis(10));
        toasts.push(Toast::success("Media loaded", "Loaded 3 items"));
        assert!(!toasts.prune(Instant::now()));
        assert!(toasts.prune(Instant::now() + Duration::from_millis(20)));
        assert!(toasts.is_empty());
    }

    #[test]
    fn queue_is_bounded() {
        let mut toasts = Toasts::new(Duration::from_secs(3));
        for i in 0..6 {
            toasts.push(Toast::info(format!("t{i}"), ""));
        }
        let titles: Vec<_> = toasts.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["t2", "t3", "t4", "t5"]);
    }
}
