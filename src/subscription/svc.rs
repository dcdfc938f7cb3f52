use anyhow::{Context, Result};
use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use log::{info, warn};

use super::model::PushSubscription;
use crate::api::ServerApi;
use crate::platform::model::{Permission, PlatformError};
use crate::platform::sim::{SimPlatform, WorkerRegistration};

pub const WORKER_SCRIPT: &str = "sw.js";

pub const LABEL_NOT_SUPPORTED: &str = "Push Not Supported";
pub const LABEL_BLOCKED: &str = "Push Messaging Blocked.";
pub const LABEL_DISABLE: &str = "Disable Push Messaging";
pub const LABEL_ENABLE: &str = "Enable Push Messaging";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Checking,
    Subscribed,
    Unsubscribed,
    /// Terminal: the platform lacks push or worker support.
    Unsupported,
    /// Terminal for the session: the user denied notification permission.
    Blocked,
}

/// What the one push button should look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub enabled: bool,
    pub label: &'static str,
}

/// Pure function of (permission, subscribed).
pub fn affordance(permission: Permission, subscribed: bool) -> Affordance {
    if permission == Permission::Denied {
        return Affordance {
            enabled: false,
            label: LABEL_BLOCKED,
        };
    }
    if subscribed {
        Affordance {
            enabled: true,
            label: LABEL_DISABLE,
        }
    } else {
        Affordance {
            enabled: true,
            label: LABEL_ENABLE,
        }
    }
}

/// Base64url decode with the padding the key servers leave off.
pub fn url_b64_to_bytes(input: &str) -> Result<Vec<u8>> {
    let padding = "=".repeat((4 - input.len() % 4) % 4);
    let padded = format!("{}{}", input, padding);
    URL_SAFE.decode(padded).context("invalid base64url key")
}

pub fn bytes_to_url_b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Page-side owner of the subscribed/unsubscribed state. All failure
/// paths log and fall back to a consistent affordance; none of them
/// surface an error to the caller.
pub struct SubscriptionController<A: ServerApi> {
    platform: SimPlatform,
    api: A,
    registration: Option<WorkerRegistration>,
    state: ControllerState,
}

impl<A: ServerApi> SubscriptionController<A> {
    pub fn new(platform: SimPlatform, api: A) -> Self {
        Self {
            platform,
            api,
            registration: None,
            state: ControllerState::Uninitialized,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub async fn subscription(&self) -> Option<PushSubscription> {
        match &self.registration {
            Some(registration) => registration.get_subscription().await,
            None => None,
        }
    }

    /// Register the worker, pick up any existing subscription, and tell
    /// the server about it.
    pub async fn initialize(&mut self) -> Affordance {
        if !self.platform.supported() {
            warn!("push messaging is not supported");
            self.state = ControllerState::Unsupported;
            return Affordance {
                enabled: false,
                label: LABEL_NOT_SUPPORTED,
            };
        }
        self.state = ControllerState::Checking;
        let registration = match self.platform.register_worker(WORKER_SCRIPT).await {
            Ok(registration) => registration,
            Err(e) => {
                warn!("service worker registration failed: {e}");
                self.state = ControllerState::Unsupported;
                return Affordance {
                    enabled: false,
                    label: LABEL_NOT_SUPPORTED,
                };
            }
        };
        info!("service worker is registered");

        let subscription = registration.get_subscription().await;
        self.state = if subscription.is_some() {
            info!("user IS subscribed");
            ControllerState::Subscribed
        } else {
            info!("user is NOT subscribed");
            ControllerState::Unsubscribed
        };
        self.report_subscription(subscription.as_ref()).await;
        self.registration = Some(registration);
        self.refresh().await
    }

    /// Fetch the application server key, ask the platform for a
    /// user-visible-only subscription, and report it.
    pub async fn subscribe(&mut self) -> Affordance {
        let Some(registration) = self.registration.clone() else {
            warn!("subscribe called before initialize");
            return self.refresh().await;
        };
        let key = match self.fetch_server_key().await {
            Ok(key) => key,
            Err(e) => {
                warn!("failed to obtain application server key: {e}");
                return self.refresh().await;
            }
        };
        match registration.subscribe(&key).await {
            Ok(subscription) => {
                info!("user is subscribed");
                self.report_subscription(Some(&subscription)).await;
                self.state = ControllerState::Subscribed;
            }
            // refresh() sees the denied permission and blocks the session
            Err(PlatformError::PermissionDenied) => {
                warn!("failed to subscribe the user: permission denied");
            }
            Err(e) => warn!("failed to subscribe the user: {e}"),
        }
        self.refresh().await
    }

    /// Revoke the current subscription. A revoke failure is logged but
    /// local state still advances to unsubscribed and the server is
    /// told null; the user can retry.
    pub async fn unsubscribe(&mut self) -> Affordance {
        if let Some(registration) = self.registration.clone() {
            if registration.get_subscription().await.is_some() {
                if let Err(e) = registration.unsubscribe().await {
                    warn!("error unsubscribing: {e}");
                }
            }
        }
        self.report_subscription(None).await;
        info!("user is unsubscribed");
        self.state = ControllerState::Unsubscribed;
        self.refresh().await
    }

    /// Idempotent; a failed report is logged and never fatal.
    pub async fn report_subscription(&self, subscription: Option<&PushSubscription>) {
        if let Err(e) = self.api.report_subscription(subscription).await {
            warn!("failed to update subscription on server: {e}");
        }
    }

    /// Recompute the affordance. Entering here with permission denied
    /// blocks the session and reports a null subscription.
    pub async fn refresh(&mut self) -> Affordance {
        if self.state == ControllerState::Unsupported {
            return Affordance {
                enabled: false,
                label: LABEL_NOT_SUPPORTED,
            };
        }
        if self.platform.permission() == Permission::Denied {
            self.state = ControllerState::Blocked;
            self.report_subscription(None).await;
            return Affordance {
                enabled: false,
                label: LABEL_BLOCKED,
            };
        }
        affordance(
            self.platform.permission(),
            self.state == ControllerState::Subscribed,
        )
    }

    async fn fetch_server_key(&self) -> Result<Vec<u8>> {
        let raw = self.api.get_public_key().await?;
        url_b64_to_bytes(&raw)
    }
}
