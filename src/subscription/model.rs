use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Wire form matches the browser's `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    pub expiration_time: Option<u64>,
    pub keys: PushSubscriptionKeys,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_vapid_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequestData {
    pub title: String,
    pub body: String,
}

/// Body of `POST /subscribe`: the current subscription (or null), and
/// optionally a request for a test push.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportRequest {
    pub subscription: Option<PushSubscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PushRequestData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_round_trips_in_camel_case() {
        let json = r#"{
            "endpoint": "https://push.example/send/abc",
            "expirationTime": null,
            "keys": { "p256dh": "BA12", "auth": "xyz" }
        }"#;
        let subscription: PushSubscription = serde_json::from_str(json).unwrap();
        assert_eq!(subscription.endpoint, "https://push.example/send/abc");
        assert_eq!(subscription.expiration_time, None);

        let out = serde_json::to_string(&subscription).unwrap();
        assert!(out.contains("\"expirationTime\":null"));
        assert!(out.contains("\"p256dh\":\"BA12\""));
    }

    #[test]
    fn report_without_data_omits_the_field() {
        let report = ReportRequest {
            subscription: None,
            data: None,
        };
        assert_eq!(serde_json::to_string(&report).unwrap(), "{\"subscription\":null}");
    }
}
