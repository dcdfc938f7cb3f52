use log::info;

use crate::platform::model::{
    NotificationAction, NotificationClickEvent, NotificationData, NotificationOptions, PushEvent,
    Visibility,
};
use crate::platform::sim::{Clients, WorkerRegistration};

pub const NOTIFICATION_TITLE: &str = "Push Notification";
pub const NOTIFICATION_ICON: &str = "images/icon.png";
pub const NOTIFICATION_BADGE: &str = "images/badge.png";
pub const VIBRATE_PATTERN: [u32; 7] = [200, 100, 200, 100, 200, 100, 400];
pub const ACTION_YES: &str = "yes";
pub const ACTION_NO: &str = "no";
pub const TARGET_URL: &str = "/about.html";

/// Worker-side half: turns push events into notifications and routes
/// the user's response. Lives independently of any open page.
pub struct NotificationHandler {
    registration: WorkerRegistration,
    clients: Clients,
}

impl NotificationHandler {
    pub fn new(registration: WorkerRegistration, clients: Clients) -> Self {
        Self {
            registration,
            clients,
        }
    }

    /// The platform keeps the worker alive until the returned future
    /// resolves, so the display always completes. A push with no
    /// readable payload still shows, with an empty body.
    pub async fn on_push(&self, event: &PushEvent) {
        let body = event.text();
        info!("push received: \"{body}\"");
        let options = NotificationOptions {
            body,
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            actions: vec![
                NotificationAction {
                    action: ACTION_YES.to_string(),
                    title: "Yes".to_string(),
                },
                NotificationAction {
                    action: ACTION_NO.to_string(),
                    title: "No".to_string(),
                },
            ],
            data: NotificationData {
                url: TARGET_URL.to_string(),
            },
        };
        self.registration
            .show_notification(NOTIFICATION_TITLE, options)
            .await;
    }

    pub async fn on_notification_click(&self, event: &NotificationClickEvent) {
        info!("notification click received: {}", event.action);
        self.registration
            .close_notification(event.notification.id)
            .await;
        if event.action == ACTION_YES {
            self.navigate_on_action(&event.notification.options.data.url)
                .await;
        }
        // one active notification at a time: drop everything else we own
        for notification in self.registration.get_notifications().await {
            self.registration.close_notification(notification.id).await;
        }
    }

    /// First visible page wins (enumeration order is platform-defined);
    /// with no visible page, open a new window instead.
    pub async fn navigate_on_action(&self, url: &str) {
        for page in self.clients.match_all().await {
            if page.visibility_state().await == Visibility::Visible {
                page.navigate(url).await;
                page.focus().await;
                return;
            }
        }
        self.clients.open_window(url).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::SimPlatform;

    fn setup() -> (SimPlatform, NotificationHandler) {
        let platform = SimPlatform::new();
        let handler = NotificationHandler::new(platform.registration(), platform.clients());
        (platform, handler)
    }

    async fn shown(platform: &SimPlatform) -> Vec<crate::platform::model::ShownNotification> {
        platform.registration().get_notifications().await
    }

    #[tokio::test]
    async fn empty_payload_still_shows_one_notification() {
        let (platform, handler) = setup();
        handler.on_push(&PushEvent { data: None }).await;

        let notifications = shown(&platform).await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, NOTIFICATION_TITLE);
        assert_eq!(notifications[0].options.body, "");
    }

    #[tokio::test]
    async fn payload_text_becomes_the_body() {
        let (platform, handler) = setup();
        handler
            .on_push(&PushEvent {
                data: Some("Hello".to_string()),
            })
            .await;

        let notifications = shown(&platform).await;
        assert_eq!(notifications[0].options.body, "Hello");
        assert_eq!(notifications[0].options.vibrate, VIBRATE_PATTERN.to_vec());
        assert_eq!(notifications[0].options.data.url, TARGET_URL);
        let actions: Vec<&str> = notifications[0]
            .options
            .actions
            .iter()
            .map(|a| a.action.as_str())
            .collect();
        assert_eq!(actions, vec![ACTION_YES, ACTION_NO]);
    }

    #[tokio::test]
    async fn yes_click_navigates_the_visible_page() {
        let (platform, handler) = setup();
        let page = platform.attach_page("/", Visibility::Visible).await;
        handler.on_push(&PushEvent { data: None }).await;
        let notification = shown(&platform).await.remove(0);

        handler
            .on_notification_click(&NotificationClickEvent {
                action: ACTION_YES.to_string(),
                notification,
            })
            .await;

        assert_eq!(page.url().await, TARGET_URL);
        assert!(page.is_focused().await);
        assert_eq!(platform.windows_opened(), 0);
        assert!(shown(&platform).await.is_empty());
    }

    #[tokio::test]
    async fn yes_click_opens_a_window_when_no_page_is_open() {
        let (platform, handler) = setup();
        handler.on_push(&PushEvent { data: None }).await;
        let notification = shown(&platform).await.remove(0);

        handler
            .on_notification_click(&NotificationClickEvent {
                action: ACTION_YES.to_string(),
                notification,
            })
            .await;

        assert_eq!(platform.windows_opened(), 1);
        let pages = platform.clients().match_all().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url().await, TARGET_URL);
    }

    #[tokio::test]
    async fn hidden_pages_do_not_catch_the_navigation() {
        let (platform, handler) = setup();
        let hidden = platform.attach_page("/", Visibility::Hidden).await;
        handler.on_push(&PushEvent { data: None }).await;
        let notification = shown(&platform).await.remove(0);

        handler
            .on_notification_click(&NotificationClickEvent {
                action: ACTION_YES.to_string(),
                notification,
            })
            .await;

        assert_eq!(hidden.url().await, "/");
        assert_eq!(platform.windows_opened(), 1);
    }

    #[tokio::test]
    async fn first_visible_page_wins_the_tie_break() {
        let (platform, handler) = setup();
        let _hidden = platform.attach_page("/", Visibility::Hidden).await;
        let first = platform.attach_page("/a", Visibility::Visible).await;
        let second = platform.attach_page("/b", Visibility::Visible).await;
        handler.on_push(&PushEvent { data: None }).await;
        let notification = shown(&platform).await.remove(0);

        handler
            .on_notification_click(&NotificationClickEvent {
                action: ACTION_YES.to_string(),
                notification,
            })
            .await;

        assert_eq!(first.url().await, TARGET_URL);
        assert!(first.is_focused().await);
        assert_eq!(second.url().await, "/b");
    }

    #[tokio::test]
    async fn any_click_closes_every_notification() {
        let (platform, handler) = setup();
        handler.on_push(&PushEvent { data: None }).await;
        handler
            .on_push(&PushEvent {
                data: Some("second".to_string()),
            })
            .await;
        assert_eq!(shown(&platform).await.len(), 2);
        let notification = shown(&platform).await.remove(0);

        handler
            .on_notification_click(&NotificationClickEvent {
                action: ACTION_NO.to_string(),
                notification,
            })
            .await;

        assert!(shown(&platform).await.is_empty());
        assert_eq!(platform.windows_opened(), 0);
    }
}
