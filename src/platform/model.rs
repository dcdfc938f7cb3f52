use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("push messaging is not supported")]
    Unsupported,
    #[error("notification permission denied")]
    PermissionDenied,
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("unsubscribe failed: {0}")]
    Unsubscribe(String),
}

/// `Notification.permission` as the page sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationData {
    pub url: String,
}

/// Descriptor handed to the platform when showing a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

/// Inbound push event. `data` is absent when the push carried no payload
/// or the payload could not be read.
#[derive(Debug, Clone)]
pub struct PushEvent {
    pub data: Option<String>,
}

impl PushEvent {
    pub fn text(&self) -> String {
        self.data.clone().unwrap_or_default()
    }
}

/// A currently displayed notification, platform-owned until closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownNotification {
    pub id: u64,
    pub title: String,
    pub options: NotificationOptions,
}

#[derive(Debug, Clone)]
pub struct NotificationClickEvent {
    pub action: String,
    pub notification: ShownNotification,
}
