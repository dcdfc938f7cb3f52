//! In-memory stand-in for the browser push/service-worker surface.
//!
//! Everything that returns a promise in the real API is an `async fn`
//! here; state lives behind one mutex and no lock is held across an
//! await point.

use std::sync::{Arc, Mutex, MutexGuard};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use super::model::{
    NotificationOptions, Permission, PlatformError, ShownNotification, Visibility,
};
use crate::subscription::model::{PushSubscription, PushSubscriptionKeys};

const SIM_PUSH_ORIGIN: &str = "https://push.sim.invalid/send";

#[derive(Clone)]
pub struct SimPlatform {
    inner: Arc<Mutex<State>>,
}

struct State {
    supported: bool,
    permission: Permission,
    fail_subscribe: bool,
    fail_unsubscribe: bool,
    registered_script: Option<String>,
    subscription: Option<PushSubscription>,
    bound_key: Option<Vec<u8>>,
    notifications: Vec<ShownNotification>,
    pages: Vec<PageState>,
    windows_opened: u64,
    next_id: u64,
}

struct PageState {
    id: u64,
    url: String,
    visibility: Visibility,
    focused: bool,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_subscription(&mut self, application_server_key: &[u8]) -> PushSubscription {
        let id = self.next_id();
        let mut p256dh = vec![0x04u8];
        p256dh.extend(pseudo_bytes(id, 64));
        let auth = pseudo_bytes(id ^ 0xa5a5, 16);
        self.bound_key = Some(application_server_key.to_vec());
        PushSubscription {
            endpoint: format!("{}/{}", SIM_PUSH_ORIGIN, URL_SAFE_NO_PAD.encode(pseudo_bytes(id, 24))),
            expiration_time: None,
            keys: PushSubscriptionKeys {
                p256dh: URL_SAFE_NO_PAD.encode(&p256dh),
                auth: URL_SAFE_NO_PAD.encode(&auth),
            },
        }
    }
}

// Credentials only need to be distinct, not secret.
fn pseudo_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut x = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x >> 24) as u8
        })
        .collect()
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                supported: true,
                permission: Permission::Default,
                fail_subscribe: false,
                fail_unsubscribe: false,
                registered_script: None,
                subscription: None,
                bound_key: None,
                notifications: Vec::new(),
                pages: Vec::new(),
                windows_opened: 0,
                next_id: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().expect("platform state lock")
    }

    pub fn supported(&self) -> bool {
        self.state().supported
    }

    pub fn permission(&self) -> Permission {
        self.state().permission
    }

    pub async fn register_worker(&self, script: &str) -> Result<WorkerRegistration, PlatformError> {
        let mut state = self.state();
        if !state.supported {
            return Err(PlatformError::Unsupported);
        }
        state.registered_script = Some(script.to_string());
        Ok(WorkerRegistration {
            inner: self.inner.clone(),
        })
    }

    /// The registration as the worker's own global scope sees it.
    pub fn registration(&self) -> WorkerRegistration {
        WorkerRegistration {
            inner: self.inner.clone(),
        }
    }

    pub fn clients(&self) -> Clients {
        Clients {
            inner: self.inner.clone(),
        }
    }

    /// Bytes the current subscription was bound to, if any.
    pub fn application_server_key(&self) -> Option<Vec<u8>> {
        self.state().bound_key.clone()
    }

    /// Windows opened through `Clients::open_window` so far.
    pub fn windows_opened(&self) -> u64 {
        self.state().windows_opened
    }

    /// Seed an already-open page, as if the user had a tab on the site.
    pub async fn attach_page(&self, url: &str, visibility: Visibility) -> PageClient {
        let mut state = self.state();
        let id = state.next_id();
        state.pages.push(PageState {
            id,
            url: url.to_string(),
            visibility,
            focused: false,
        });
        PageClient {
            id,
            inner: self.inner.clone(),
        }
    }

    // Failure knobs.

    pub fn set_supported(&self, supported: bool) {
        self.state().supported = supported;
    }

    pub fn set_permission(&self, permission: Permission) {
        self.state().permission = permission;
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state().fail_subscribe = fail;
    }

    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.state().fail_unsubscribe = fail;
    }
}

#[derive(Clone)]
pub struct WorkerRegistration {
    inner: Arc<Mutex<State>>,
}

impl std::fmt::Debug for WorkerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistration").finish_non_exhaustive()
    }
}

impl WorkerRegistration {
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().expect("platform state lock")
    }

    pub async fn get_subscription(&self) -> Option<PushSubscription> {
        self.state().subscription.clone()
    }

    /// Prompts for permission on first use, then asks the push service
    /// for a subscription bound to `application_server_key`.
    pub async fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> Result<PushSubscription, PlatformError> {
        let mut state = self.state();
        if application_server_key.is_empty() {
            return Err(PlatformError::Subscribe(
                "empty application server key".to_string(),
            ));
        }
        match state.permission {
            Permission::Denied => return Err(PlatformError::PermissionDenied),
            Permission::Default => state.permission = Permission::Granted,
            Permission::Granted => {}
        }
        if state.fail_subscribe {
            return Err(PlatformError::Subscribe(
                "push service rejected the subscription".to_string(),
            ));
        }
        let subscription = state.issue_subscription(application_server_key);
        state.subscription = Some(subscription.clone());
        Ok(subscription)
    }

    /// Resolves `true` when a subscription existed and was removed.
    pub async fn unsubscribe(&self) -> Result<bool, PlatformError> {
        let mut state = self.state();
        if state.fail_unsubscribe {
            return Err(PlatformError::Unsubscribe(
                "push service unreachable".to_string(),
            ));
        }
        state.bound_key = None;
        Ok(state.subscription.take().is_some())
    }

    pub async fn show_notification(&self, title: &str, options: NotificationOptions) {
        let mut state = self.state();
        let id = state.next_id();
        state.notifications.push(ShownNotification {
            id,
            title: title.to_string(),
            options,
        });
    }

    pub async fn get_notifications(&self) -> Vec<ShownNotification> {
        self.state().notifications.clone()
    }

    pub async fn close_notification(&self, id: u64) {
        self.state().notifications.retain(|n| n.id != id);
    }
}

#[derive(Clone)]
pub struct Clients {
    inner: Arc<Mutex<State>>,
}

impl Clients {
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().expect("platform state lock")
    }

    /// Pages controlled by this worker, in the platform's enumeration order.
    pub async fn match_all(&self) -> Vec<PageClient> {
        let state = self.state();
        state
            .pages
            .iter()
            .map(|page| PageClient {
                id: page.id,
                inner: self.inner.clone(),
            })
            .collect()
    }

    pub async fn open_window(&self, url: &str) -> PageClient {
        let mut state = self.state();
        let id = state.next_id();
        state.windows_opened += 1;
        state.pages.push(PageState {
            id,
            url: url.to_string(),
            visibility: Visibility::Visible,
            focused: true,
        });
        PageClient {
            id,
            inner: self.inner.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PageClient {
    id: u64,
    inner: Arc<Mutex<State>>,
}

impl PageClient {
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().expect("platform state lock")
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn visibility_state(&self) -> Visibility {
        self.state()
            .pages
            .iter()
            .find(|page| page.id == self.id)
            .map(|page| page.visibility)
            .unwrap_or(Visibility::Hidden)
    }

    pub async fn url(&self) -> String {
        self.state()
            .pages
            .iter()
            .find(|page| page.id == self.id)
            .map(|page| page.url.clone())
            .unwrap_or_default()
    }

    pub async fn is_focused(&self) -> bool {
        self.state()
            .pages
            .iter()
            .find(|page| page.id == self.id)
            .map(|page| page.focused)
            .unwrap_or(false)
    }

    pub async fn navigate(&self, url: &str) {
        let mut state = self.state();
        if let Some(page) = state.pages.iter_mut().find(|page| page.id == self.id) {
            page.url = url.to_string();
        }
    }

    pub async fn focus(&self) {
        let mut state = self.state();
        for page in state.pages.iter_mut() {
            page.focused = page.id == self.id;
        }
    }
}
