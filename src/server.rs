use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{error, info, warn};
use request_http_parser::parser::{Method, Request};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::{mpsc::UnboundedSender, oneshot::Receiver},
};

use crate::subscription::model::{PushSubscription, ReportRequest};

pub const BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request\r\n\r\n";
pub const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\n\r\n";
pub const OPTIONS_CORS: &str = "HTTP/1.1 204 No Content\r\n\
            Access-Control-Allow-Origin: *\r\n\
            Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
            Access-Control-Allow-Headers: Content-Type\r\n\
            Access-Control-Max-Age: 86400\r\n\
            \r\n";
pub const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
            Access-Control-Allow-Origin: *\r\n\
            Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
            Access-Control-Allow-Headers: Content-Type\r\n\
            Access-Control-Max-Age: 86400\r\n\
            Content-Type: application/json\r\n\
            \r\n";

/// In-memory implementation of the subscription contract: serves the
/// public application-server key, remembers the latest reported
/// subscription, and hands test-push requests to whoever delivers
/// pushes. Nothing is persisted.
#[derive(Clone)]
pub struct SubscribeServer {
    public_key: String,
    latest: Arc<Mutex<Option<PushSubscription>>>,
    push_tx: UnboundedSender<String>,
}

impl SubscribeServer {
    pub fn new(public_key: impl Into<String>, push_tx: UnboundedSender<String>) -> Self {
        Self {
            public_key: public_key.into(),
            latest: Arc::new(Mutex::new(None)),
            push_tx,
        }
    }

    pub fn latest_subscription(&self) -> Option<PushSubscription> {
        self.latest.lock().expect("server state lock").clone()
    }

    pub async fn start(self, addr: &str, mut shutdown_rx: Receiver<()>) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("server running on http://{addr}");

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    let (mut stream, _) = conn?;
                    let server = self.clone();
                    tokio::spawn(async move {
                        let (reader, writer) = stream.split();
                        if let Err(e) = server.handle_client(reader, writer).await {
                            error!("connection error {e}");
                        }
                    });
                }
                _ = &mut shutdown_rx => {
                    info!("shutting down server");
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn handle_client<Reader, Writer>(
        &self,
        mut reader: Reader,
        mut writer: Writer,
    ) -> Result<()>
    where
        Reader: AsyncRead + Unpin,
        Writer: AsyncWrite + Unpin,
    {
        let mut buffer = [0; 4048];
        let size = reader
            .read(&mut buffer)
            .await
            .context("failed to read stream")?;
        if size >= 4048 {
            writer
                .write_all(format!("{}{}", BAD_REQUEST, "request too large").as_bytes())
                .await
                .context("failed to write")?;
            let _ = writer.flush().await;
            return Ok(());
        }
        let request = String::from_utf8_lossy(&buffer[..size]);
        let request = match Request::new(&request) {
            Ok(request) => request,
            Err(e) => {
                warn!("{e}");
                writer
                    .write_all(format!("{}{}", BAD_REQUEST, e).as_bytes())
                    .await
                    .context("failed to write")?;
                let _ = writer.flush().await;
                return Ok(());
            }
        };

        // Router
        let (status, content) = match (&request.method, request.path.as_str()) {
            (Method::OPTIONS, _) => (OPTIONS_CORS.to_string(), String::new()),
            (Method::GET, "/subscribe") => self.public_key_response(),
            (Method::POST, "/subscribe") => self.register(&request),
            _ => (NOT_FOUND.to_string(), "404 Not Found".to_string()),
        };

        writer
            .write_all(format!("{}{}", status, content).as_bytes())
            .await
            .context("failed to write")?;
        let _ = writer.flush().await;

        Ok(())
    }

    fn public_key_response(&self) -> (String, String) {
        let body = serde_json::json!({ "publicVapidKey": self.public_key }).to_string();
        (OK_RESPONSE.to_string(), body)
    }

    fn register(&self, request: &Request) -> (String, String) {
        let Some(body) = &request.body else {
            return (BAD_REQUEST.to_string(), String::new());
        };
        let report = match serde_json::from_str::<ReportRequest>(body) {
            Ok(report) => report,
            Err(e) => {
                warn!("bad subscription report: {e}");
                return (BAD_REQUEST.to_string(), String::new());
            }
        };

        match &report.subscription {
            Some(subscription) => info!("stored subscription for {}", subscription.endpoint),
            None => info!("cleared stored subscription"),
        }
        *self.latest.lock().expect("server state lock") = report.subscription;

        if let Some(data) = report.data {
            // test-push loopback into the simulated push service
            if self.push_tx.send(data.body).is_err() {
                warn!("no push consumer attached");
            }
        }

        (OK_RESPONSE.to_string(), String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::model::{PushRequestData, PushSubscriptionKeys};
    use tokio::sync::mpsc;

    fn server() -> (SubscribeServer, mpsc::UnboundedReceiver<String>) {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        (SubscribeServer::new("test-key", push_tx), push_rx)
    }

    async fn roundtrip(server: &SubscribeServer, raw: &str) -> String {
        let (client, server_side) = tokio::io::duplex(8192);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(raw.as_bytes()).await.unwrap();

        let (reader, writer) = tokio::io::split(server_side);
        server.handle_client(reader, writer).await.unwrap();

        let mut out = String::new();
        client_read.read_to_string(&mut out).await.unwrap();
        out
    }

    fn post(body: &str) -> String {
        format!(
            "POST /subscribe HTTP/1.1\r\n\
            Host: localhost\r\n\
            Content-Type: application/json\r\n\
            Content-Length: {}\r\n\
            \r\n\
            {}",
            body.len(),
            body
        )
    }

    fn sample_subscription() -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example/send/abc".to_string(),
            expiration_time: None,
            keys: PushSubscriptionKeys {
                p256dh: "BA12".to_string(),
                auth: "xyz".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn get_subscribe_serves_the_public_key() {
        let (server, _push_rx) = server();
        let response = roundtrip(&server, "GET /subscribe HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"publicVapidKey\":\"test-key\""));
    }

    #[tokio::test]
    async fn post_subscribe_stores_the_latest_subscription() {
        let (server, _push_rx) = server();
        let report = ReportRequest {
            subscription: Some(sample_subscription()),
            data: None,
        };
        let response = roundtrip(&server, &post(&serde_json::to_string(&report).unwrap())).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(server.latest_subscription(), Some(sample_subscription()));

        // a null report clears it
        let response = roundtrip(&server, &post("{\"subscription\":null}")).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(server.latest_subscription(), None);
    }

    #[tokio::test]
    async fn post_with_data_loops_a_test_push_back() {
        let (server, mut push_rx) = server();
        let report = ReportRequest {
            subscription: Some(sample_subscription()),
            data: Some(PushRequestData {
                title: "Notification".to_string(),
                body: "Hello".to_string(),
            }),
        };
        roundtrip(&server, &post(&serde_json::to_string(&report).unwrap())).await;
        assert_eq!(push_rx.try_recv().unwrap(), "Hello");
    }

    #[tokio::test]
    async fn preflight_and_unknown_routes() {
        let (server, _push_rx) = server();
        let response = roundtrip(&server, "OPTIONS /subscribe HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 204 No Content"));

        let response = roundtrip(&server, "GET /nope HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
    }

    #[tokio::test]
    async fn malformed_report_is_rejected() {
        let (server, _push_rx) = server();
        let response = roundtrip(&server, &post("{not json")).await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
        assert_eq!(server.latest_subscription(), None);
    }
}
