use std::time::{Duration, Instant};

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl ToastLevel {
    #[must_use]
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub shown_at: Instant,
    pub duration: Duration,
}

impl Toast {
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.duration
    }
}

/// Ephemeral user feedback: toasts plus a single busy flag.
#[derive(Debug, Default)]
pub struct Notifier {
    next_id: u64,
    toasts: Vec<Toast>,
    loading: bool,
    loading_message: String,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        &mut self,
        level: ToastLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> u64 {
        self.show_for(level, title, message, DEFAULT_TOAST_DURATION)
    }

    pub fn show_for(
        &mut self,
        level: ToastLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        duration: Duration,
    ) -> u64 {
        let title = title.into();
        let message = message.into();
        match level {
            ToastLevel::Error => tracing::error!(%title, %message, "notification"),
            ToastLevel::Warning => tracing::warn!(%title, %message, "notification"),
            ToastLevel::Success | ToastLevel::Info => {
                tracing::info!(%title, %message, "notification");
            }
        }

        self.next_id += 1;
        let id = self.next_id;
        self.toasts.push(Toast {
            id,
            level,
            title,
            message,
            shown_at: Instant::now(),
            duration,
        });
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastLevel::Success, ToastLevel::Success.default_title(), message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastLevel::Info, ToastLevel::Info.default_title(), message)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastLevel::Warning, ToastLevel::Warning.default_title(), message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastLevel::Error, ToastLevel::Error.default_title(), message)
    }

    #[must_use]
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.last()
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let original_len = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != original_len
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }

    /// Drops toasts whose display time has elapsed and returns how many.
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let original_len = self.toasts.len();
        self.toasts.retain(|toast| !toast.is_expired(now));
        original_len - self.toasts.len()
    }

    pub fn set_loading(&mut self, loading: bool, message: impl Into<String>) {
        self.loading = loading;
        self.loading_message = if loading { message.into() } else { String::new() };
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn loading_message(&self) -> &str {
        &self.loading_message
    }
}
