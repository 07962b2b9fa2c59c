//! Vendor HTTP transport behind a trait so the retry policy can be tested
//! without calling the real API.

use crate::config::QianfanConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("{0}")]
    Api(String),
}

impl TransportError {
    /// Rate-limit condition: either the typed variant or a "429" marker
    /// embedded in the message.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            TransportError::RateLimited(_) => true,
            TransportError::Api(msg) => msg.contains("429"),
        }
    }
}

/// One generation call: produce the first image URL for the given model,
/// prompt, and reference image.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        reference_url: &str,
    ) -> Result<String, TransportError>;
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GenerationItem>,
}

#[derive(Deserialize)]
struct GenerationItem {
    url: Option<String>,
}

/// Production transport. The HTTP client is built fresh for each call and
/// dropped at the end; nothing is shared or pooled across requests.
pub struct QianfanTransport {
    config: QianfanConfig,
}

impl QianfanTransport {
    pub fn new(config: QianfanConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> Result<url::Url, TransportError> {
        let base = self.config.base_url.trim_end_matches('/');
        url::Url::parse(&format!("{}/images/generations", base))
            .map_err(|e| TransportError::Api(format!("invalid api base url: {}", e)))
    }
}

#[async_trait]
impl ImageTransport for QianfanTransport {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        reference_url: &str,
    ) -> Result<String, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Api(e.to_string()))?;

        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "refer_image": reference_url,
        });

        let response = client
            .post(self.endpoint()?)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Api(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::RateLimited(format!(
                "api returned 429: {}",
                text
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(format!(
                "api returned {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Api(format!("invalid api response: {}", e)))?;
        parsed
            .data
            .into_iter()
            .find_map(|item| item.url)
            .ok_or_else(|| TransportError::Api("response contained no image url".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> QianfanConfig {
        QianfanConfig {
            api_key: "test-key".into(),
            base_url: base_url.into(),
            model: "irag-1.0".into(),
            timeout_secs: 60,
            max_retries: 3,
            retry_base_delay_secs: 2,
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let t = QianfanTransport::new(config("https://qianfan.baidubce.com/v2/"));
        assert_eq!(
            t.endpoint().unwrap().as_str(),
            "https://qianfan.baidubce.com/v2/images/generations"
        );
    }

    #[test]
    fn rate_limit_detection_covers_embedded_marker() {
        assert!(TransportError::RateLimited("x".into()).is_rate_limit());
        assert!(TransportError::Api("upstream said 429".into()).is_rate_limit());
        assert!(!TransportError::Api("connection refused".into()).is_rate_limit());
    }
}
