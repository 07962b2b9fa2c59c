//! Retry policy around the vendor transport.
//!
//! This is the only retry logic in the service: exponential backoff, applied
//! solely to rate-limit failures. Every other error aborts immediately and
//! is surfaced to the caller.

use super::transport::{ImageTransport, QianfanTransport};
use crate::config::QianfanConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug)]
pub struct ImageOutcome {
    pub image_url: String,
    pub model: String,
    /// Number of transport calls consumed, including the successful one.
    pub attempts: u32,
    pub execution_time: f64,
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32, last_error: String },
    #[error("image generation failed: {last_error}")]
    Failed {
        attempts: u32,
        last_error: String,
        execution_time: f64,
    },
}

pub struct ImageGenerator {
    transport: Arc<dyn ImageTransport>,
    default_model: String,
    max_retries: u32,
    base_delay: Duration,
}

impl ImageGenerator {
    pub fn new(config: &QianfanConfig) -> Self {
        Self::with_transport(Arc::new(QianfanTransport::new(config.clone())), config)
    }

    /// Inject a transport; used by tests to exercise the retry policy
    /// without the real API.
    pub fn with_transport(transport: Arc<dyn ImageTransport>, config: &QianfanConfig) -> Self {
        Self {
            transport,
            default_model: config.model.clone(),
            max_retries: config.max_retries,
            base_delay: Duration::from_secs(config.retry_base_delay_secs),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Up to `max_retries` attempts. After a rate-limited attempt with
    /// attempts remaining, sleeps `base_delay * 2^attempt` (2s, 4s, 8s, …)
    /// before retrying. Any other failure aborts without sleeping.
    pub async fn generate(
        &self,
        reference_url: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<ImageOutcome, GenerateError> {
        let model = model.unwrap_or(&self.default_model);
        let started = Instant::now();
        let mut last_error = String::from("no attempts made");

        for attempt in 0..self.max_retries {
            tracing::info!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                model,
                "calling image generation api"
            );
            match self.transport.generate(model, prompt, reference_url).await {
                Ok(image_url) => {
                    let execution_time = started.elapsed().as_secs_f64();
                    tracing::info!(%image_url, execution_time, "image generated");
                    return Ok(ImageOutcome {
                        image_url,
                        model: model.to_string(),
                        attempts: attempt + 1,
                        execution_time,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "generation attempt failed");
                    let rate_limited = e.is_rate_limit();
                    last_error = e.to_string();
                    if !rate_limited {
                        return Err(GenerateError::Failed {
                            attempts: attempt + 1,
                            last_error,
                            execution_time: started.elapsed().as_secs_f64(),
                        });
                    }
                    if attempt + 1 == self.max_retries {
                        return Err(GenerateError::RateLimitExceeded {
                            attempts: self.max_retries,
                            last_error,
                        });
                    }
                    let delay = self.base_delay * 2u32.pow(attempt);
                    tracing::info!(delay_secs = delay.as_secs(), "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Only reachable with max_retries == 0.
        Err(GenerateError::Failed {
            attempts: 0,
            last_error,
            execution_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Static model listing for the models endpoint.
    pub fn available_models(&self) -> Value {
        json!({
            "models": [{
                "name": self.default_model,
                "description": "Qianfan image generation model",
                "is_default": true,
                "provider": "Baidu Qianfan",
            }],
            "default_model": self.default_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::transport::TransportError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Transport returning a scripted sequence of outcomes.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageTransport for ScriptedTransport {
        async fn generate(
            &self,
            _model: &str,
            _prompt: &str,
            _reference_url: &str,
        ) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Api("script exhausted".into())))
        }
    }

    fn config() -> QianfanConfig {
        QianfanConfig {
            api_key: "k".into(),
            base_url: "https://example.invalid/v2".into(),
            model: "irag-1.0".into(),
            timeout_secs: 60,
            max_retries: 3,
            retry_base_delay_secs: 2,
        }
    }

    fn rate_limited() -> Result<String, TransportError> {
        Err(TransportError::RateLimited("api returned 429".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_then_success_sleeps_base_delay() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(),
            Ok("https://img.example/1.png".into()),
        ]);
        let generator = ImageGenerator::with_transport(transport.clone(), &config());

        let before = tokio::time::Instant::now();
        let outcome = generator.generate("https://ref/x", "a cat", None).await.unwrap();
        let slept = tokio::time::Instant::now() - before;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.image_url, "https://img.example/1.png");
        assert_eq!(outcome.model, "irag-1.0");
        assert_eq!(transport.calls(), 2);
        assert_eq!(slept, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_until_attempts_exhausted() {
        let transport = ScriptedTransport::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let generator = ImageGenerator::with_transport(transport.clone(), &config());

        let before = tokio::time::Instant::now();
        let err = generator
            .generate("https://ref/x", "a cat", None)
            .await
            .unwrap_err();
        let slept = tokio::time::Instant::now() - before;

        match err {
            GenerateError::RateLimitExceeded { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("429"));
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other),
        }
        assert_eq!(transport.calls(), 3);
        // 2s after attempt 0, 4s after attempt 1, nothing after the last.
        assert_eq!(slept, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_failure_never_sleeps_or_retries() {
        let transport =
            ScriptedTransport::new(vec![Err(TransportError::Api("invalid api key".into()))]);
        let generator = ImageGenerator::with_transport(transport.clone(), &config());

        let before = tokio::time::Instant::now();
        let err = generator
            .generate("https://ref/x", "a cat", None)
            .await
            .unwrap_err();
        let slept = tokio::time::Instant::now() - before;

        match err {
            GenerateError::Failed { attempts, last_error, .. } => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("invalid api key"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(transport.calls(), 1);
        assert_eq!(slept, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_model_overrides_default() {
        let transport = ScriptedTransport::new(vec![Ok("https://img.example/2.png".into())]);
        let generator = ImageGenerator::with_transport(transport, &config());

        let outcome = generator
            .generate("https://ref/x", "a dog", Some("irag-2.0"))
            .await
            .unwrap();
        assert_eq!(outcome.model, "irag-2.0");
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn model_listing_marks_default() {
        let transport = ScriptedTransport::new(vec![]);
        let generator = ImageGenerator::with_transport(transport, &config());
        let models = generator.available_models();
        assert_eq!(models["default_model"], "irag-1.0");
        assert_eq!(models["models"][0]["is_default"], true);
    }
}
