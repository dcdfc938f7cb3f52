pub mod api;
pub mod cfg;
pub mod http_client;
pub mod platform;
pub mod server;
pub mod subscription;
pub mod worker;
