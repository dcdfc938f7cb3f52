use anyhow::{Context, Result, bail};

use crate::http_client::{HttpClient, HttpMethod};
use crate::subscription::model::{
    PublicKeyResponse, PushRequestData, PushSubscription, ReportRequest,
};

/// The remote subscription server, as the page consumes it.
#[allow(async_fn_in_trait)]
pub trait ServerApi {
    async fn get_public_key(&self) -> Result<String>;
    async fn report_subscription(&self, subscription: Option<&PushSubscription>) -> Result<()>;
    async fn request_push(
        &self,
        subscription: Option<&PushSubscription>,
        data: PushRequestData,
    ) -> Result<()>;
}

pub struct HttpApi {
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    async fn post(&self, report: ReportRequest) -> Result<()> {
        let response = HttpClient::fetch(HttpMethod::POST, &self.base_url, Some(report)).await?;
        if response.status != 200 {
            bail!("server returned status {}", response.status);
        }
        Ok(())
    }
}

impl ServerApi for HttpApi {
    async fn get_public_key(&self) -> Result<String> {
        let response = HttpClient::fetch::<()>(HttpMethod::GET, &self.base_url, None).await?;
        if response.status != 200 {
            bail!("server returned status {}", response.status);
        }
        let body = response.body.context("empty key response")?;
        let parsed: PublicKeyResponse =
            serde_json::from_str(&body).context("error deserialize key response")?;
        Ok(parsed.public_vapid_key)
    }

    async fn report_subscription(&self, subscription: Option<&PushSubscription>) -> Result<()> {
        self.post(ReportRequest {
            subscription: subscription.cloned(),
            data: None,
        })
        .await
    }

    async fn request_push(
        &self,
        subscription: Option<&PushSubscription>,
        data: PushRequestData,
    ) -> Result<()> {
        self.post(ReportRequest {
            subscription: subscription.cloned(),
            data: Some(data),
        })
        .await
    }
}

/// Test double that records every report instead of talking to a server.
#[cfg(test)]
#[derive(Clone)]
pub struct RecordingApi {
    key: String,
    fail_reports: bool,
    reports: std::sync::Arc<std::sync::Mutex<Vec<Option<PushSubscription>>>>,
    pushes: std::sync::Arc<std::sync::Mutex<Vec<PushRequestData>>>,
}

#[cfg(test)]
impl RecordingApi {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            fail_reports: false,
            reports: Default::default(),
            pushes: Default::default(),
        }
    }

    pub fn failing_reports(key: &str) -> Self {
        Self {
            fail_reports: true,
            ..Self::new(key)
        }
    }

    pub fn reports(&self) -> Vec<Option<PushSubscription>> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last_report(&self) -> Option<Option<PushSubscription>> {
        self.reports.lock().unwrap().last().cloned()
    }

    pub fn pushes(&self) -> Vec<PushRequestData> {
        self.pushes.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ServerApi for RecordingApi {
    async fn get_public_key(&self) -> Result<String> {
        Ok(self.key.clone())
    }

    async fn report_subscription(&self, subscription: Option<&PushSubscription>) -> Result<()> {
        self.reports.lock().unwrap().push(subscription.cloned());
        if self.fail_reports {
            bail!("report rejected");
        }
        Ok(())
    }

    async fn request_push(
        &self,
        _subscription: Option<&PushSubscription>,
        data: PushRequestData,
    ) -> Result<()> {
        self.pushes.lock().unwrap().push(data);
        Ok(())
    }
}
