use std::{
    env, ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

pub struct Config {
    pub subscribe_url: &'static str,
    pub bind_addr: &'static str,
    pub public_vapid_key: &'static str,
}

/// Uncompressed P-256 point, base64url without padding (65 bytes decoded).
pub const DEFAULT_PUBLIC_VAPID_KEY: &str =
    "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

static CONFIG: AtomicPtr<Config> = AtomicPtr::new(ptr::null_mut());

pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Box::new(Config {
        subscribe_url: leak_var("SUBSCRIBE_URL", "http://127.0.0.1:8080/subscribe"),
        bind_addr: leak_var("BIND_ADDR", "127.0.0.1:8080"),
        public_vapid_key: leak_var("PUBLIC_VAPID_KEY", DEFAULT_PUBLIC_VAPID_KEY),
    });
    CONFIG.store(Box::into_raw(config), Ordering::Release);
}

fn leak_var(name: &str, default: &'static str) -> &'static str {
    match env::var(name) {
        Ok(value) => Box::leak(value.into_boxed_str()),
        Err(_) => default,
    }
}

#[inline]
pub fn get_config() -> &'static Config {
    unsafe { &*CONFIG.load(Ordering::Acquire) }
}
