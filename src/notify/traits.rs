//! Collaborator traits the notifier drives, and their shared error type.

/// Errors that can occur while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    ExitStatus { program: String, status: String },

    #[error("delivery timed out after {0}s")]
    Timeout(u64),

    #[error("host bus closed")]
    HostClosed,
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

/// System-level notification channel (desktop notification service).
#[async_trait::async_trait]
pub trait SystemChannel: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable name for logs.
    fn channel_name(&self) -> &str;
}

#[async_trait::async_trait]
pub trait Permission: Send + Sync {
    async fn is_granted(&self) -> bool;

    async fn request(&self) -> PermissionState;
}

/// In-app banner shown by the host itself.
#[async_trait::async_trait]
pub trait Banner: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Best-effort restore/focus of the host surface.
#[async_trait::async_trait]
pub trait WindowControl: Send + Sync {
    async fn restore(&self) -> Result<(), NotifyError>;
}
