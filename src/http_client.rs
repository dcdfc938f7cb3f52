use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use url::Url;

pub enum HttpMethod {
    GET,
    POST,
}

pub struct HttpClient {}

impl HttpClient {
    pub async fn fetch<T: Serialize>(
        method: HttpMethod,
        url: &str,
        body: Option<T>,
    ) -> Result<Response> {
        let parsed = Url::parse(url).with_context(|| format!("invalid url {}", url))?;

        let scheme = parsed.scheme().to_string();
        let host = parsed.host_str().context("error url host")?.to_string();
        let port = parsed.port_or_known_default().context("error url port")?;
        let path = parsed.path();
        let full_path = match parsed.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };

        let req = Self::build_request(&method, &full_path, &host, body)?;

        let conn = TcpStream::connect((host.as_str(), port))
            .await
            .with_context(|| format!("failed to connect to {}", url))?;

        if scheme == "https" {
            let tls_connector = native_tls::TlsConnector::new().context("error init tls")?;
            let connector = tokio_native_tls::TlsConnector::from(tls_connector);
            let stream = connector
                .connect(&host, conn)
                .await
                .context("tls handshake failed")?;
            Self::exchange(stream, &req).await
        } else {
            Self::exchange(conn, &req).await
        }
    }

    fn build_request<T: Serialize>(
        method: &HttpMethod,
        full_path: &str,
        host: &str,
        body: Option<T>,
    ) -> Result<String> {
        let req = match method {
            HttpMethod::GET => format!(
                "GET {} HTTP/1.1\r\n\
                Host: {}\r\n\
                Connection: close\r\n\
                \r\n",
                full_path, host
            ),
            HttpMethod::POST => {
                let json = serde_json::to_string(&body).context("error serialize body")?;
                format!(
                    "POST {} HTTP/1.1\r\n\
                    Host: {}\r\n\
                    Content-Type: application/json\r\n\
                    Content-Length: {}\r\n\
                    Connection: close\r\n\
                    \r\n\
                    {}",
                    full_path,
                    host,
                    json.len(),
                    json
                )
            }
        };
        Ok(req)
    }

    async fn exchange<S>(mut stream: S, req: &str) -> Result<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream
            .write_all(req.as_bytes())
            .await
            .context("failed to write request")?;

        let mut response = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.context("read failed")?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
        }

        let res = String::from_utf8_lossy(&response);
        Response::new(&res)
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: i32,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl Response {
    pub fn new(raw: &str) -> Result<Self> {
        let (head, body) = match raw.split_once("\r\n\r\n") {
            Some((head, body)) => (head, (!body.is_empty()).then(|| body.to_string())),
            None => (raw, None),
        };

        let mut head_lines = head.lines();
        let first = head_lines.next().context("empty response")?;
        let mut status_parts = first.split_whitespace();
        let _http = status_parts.next().context("missing http version")?;
        let status = status_parts.next().context("no status code")?;

        let mut headers = HashMap::new();
        for line in head_lines {
            if let Some((k, v)) = line.split_once(':') {
                headers.insert(k.trim().to_lowercase(), v.trim().to_string());
            }
        }

        Ok(Response {
            status: status.parse::<i32>().context("bad status code")?,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_headers_and_body() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"ok\":true}";
        let response = Response::new(raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(response.body.as_deref(), Some("{\"ok\":true}"));
    }

    #[test]
    fn missing_body_is_none() {
        let response = Response::new("HTTP/1.1 204 No Content\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }

    #[test]
    fn garbage_head_is_an_error() {
        assert!(Response::new("HTTP/1.1\r\n\r\n").is_err());
        assert!(Response::new("").is_err());
    }
}
