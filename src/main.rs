use anyhow::Result;
use log::info;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, sleep};

use push_client::api::{HttpApi, ServerApi};
use push_client::cfg::{get_config, init_config};
use push_client::platform::model::{NotificationClickEvent, PushEvent, Visibility};
use push_client::platform::sim::SimPlatform;
use push_client::server::SubscribeServer;
use push_client::subscription::model::PushRequestData;
use push_client::subscription::svc::SubscriptionController;
use push_client::worker::{ACTION_YES, NotificationHandler};

#[tokio::main]
async fn main() -> Result<()> {
    init_config();
    env_logger::init();

    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let server = SubscribeServer::new(get_config().public_vapid_key, push_tx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server_task = tokio::spawn({
        let server = server.clone();
        async move { server.start(get_config().bind_addr, shutdown_rx).await }
    });
    sleep(Duration::from_millis(50)).await;

    // Page context: one open tab driving the subscription.
    let platform = SimPlatform::new();
    let page = platform.attach_page("/", Visibility::Visible).await;
    let mut controller = SubscriptionController::new(
        platform.clone(),
        HttpApi::new(get_config().subscribe_url),
    );

    let affordance = controller.initialize().await;
    info!("button: {}", affordance.label);
    let affordance = controller.subscribe().await;
    info!("button: {}", affordance.label);

    // Worker context: persists independently of the page.
    let handler = NotificationHandler::new(platform.registration(), platform.clients());

    // Ask the server for a test push; it loops back into the simulated
    // push service, which wakes the worker.
    let current = controller.subscription().await;
    let api = HttpApi::new(get_config().subscribe_url);
    api.request_push(
        current.as_ref(),
        PushRequestData {
            title: "Notification".to_string(),
            body: "Hello".to_string(),
        },
    )
    .await?;

    if let Some(payload) = push_rx.recv().await {
        // the platform holds the worker alive until on_push resolves
        let event = PushEvent {
            data: Some(payload),
        };
        handler.on_push(&event).await;
    }

    let notifications = platform.registration().get_notifications().await;
    if let Some(notification) = notifications.first() {
        info!(
            "notification shown: {} / \"{}\"",
            notification.title, notification.options.body
        );
        handler
            .on_notification_click(&NotificationClickEvent {
                action: ACTION_YES.to_string(),
                notification: notification.clone(),
            })
            .await;
    }
    info!(
        "page now at {} (focused: {})",
        page.url().await,
        page.is_focused().await
    );

    let _ = shutdown_tx.send(());
    server_task.await??;
    Ok(())
}
