//! Provider adapter abstraction
//!
//! The orchestrator only sees [`ProviderAdapter`]: one name in, one raw
//! classification or typed error out. Both shipped adapters share the same
//! request sequence and differ only in their [`CompletionBackend`].

use super::gemini_client::GeminiClient;
use super::openai_client::OpenAiClient;
use super::prompts;
use crate::error::{EnrichError, EnrichResult, ProviderError};
use crate::models::{NameKey, Provider, RawClassification};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Classification capability of one AI backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    /// Classify one name; the result is validated by the caller
    async fn classify(&self, key: &NameKey) -> Result<RawClassification, ProviderError>;
}

/// Output shape requested for a single completion
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// JSON object; backends that support it constrain output to `schema`
    Json { schema: Value },
}

/// Single prompt -> text completion against one backend
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str, format: &ResponseFormat)
        -> Result<String, ProviderError>;
}

/// Adapter issuing the origin request first, then description and
/// pronunciation concurrently, both conditioned on the origin
pub struct PromptedClassifier<B> {
    backend: B,
}

impl<B: CompletionBackend> PromptedClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
struct OriginPayload {
    #[serde(default)]
    origin: String,
}

#[derive(Debug, Deserialize)]
struct PronunciationPayload {
    #[serde(default)]
    spanish: String,
    #[serde(default)]
    foreign: String,
    #[serde(default)]
    explanation: String,
}

#[async_trait]
impl<B: CompletionBackend> ProviderAdapter for PromptedClassifier<B> {
    fn provider(&self) -> Provider {
        self.backend.provider()
    }

    fn model(&self) -> &str {
        self.backend.model()
    }

    async fn classify(&self, key: &NameKey) -> Result<RawClassification, ProviderError> {
        let origin_format = ResponseFormat::Json {
            schema: prompts::origin_schema(),
        };
        let origin_text = self
            .backend
            .complete(&prompts::origin_prompt(&key.name), &origin_format)
            .await?;
        let origin: OriginPayload = parse_json_object(&origin_text)?;
        debug!(name = %key, origin = %origin.origin, "Origin received");

        let description_prompt = prompts::description_prompt(&key.name, &origin.origin);
        let pronunciation_prompt = prompts::pronunciation_prompt(&key.name, &origin.origin);
        let pronunciation_format = ResponseFormat::Json {
            schema: prompts::pronunciation_schema(),
        };
        let (description, pronunciation) = tokio::join!(
            self.backend
                .complete(&description_prompt, &ResponseFormat::Text),
            self.backend
                .complete(&pronunciation_prompt, &pronunciation_format),
        );
        let description = description?;
        let pronunciation: PronunciationPayload = parse_json_object(&pronunciation?)?;

        Ok(RawClassification {
            origin: origin.origin,
            description,
            pronunciation_native: pronunciation.spanish,
            pronunciation_foreign: pronunciation.foreign,
            pronunciation_explanation: pronunciation.explanation,
        })
    }
}

/// Parse the JSON object in a model reply, tolerating code fences and
/// surrounding prose
pub fn parse_json_object<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, ProviderError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(ProviderError::InvalidResponse(format!(
                "no JSON object in reply: {}",
                truncate(text, 120)
            )))
        }
    };
    serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Map a non-success HTTP status to the failure taxonomy
pub fn error_for_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    let message = truncate(body, 300);
    match status.as_u16() {
        401 | 403 => ProviderError::AuthError(format!("HTTP {}: {}", status.as_u16(), message)),
        429 => ProviderError::RateLimited {
            retry_after: parse_retry_after(headers),
        },
        400 | 404 | 422 => {
            ProviderError::InvalidInput(format!("HTTP {}: {}", status.as_u16(), message))
        }
        408 => ProviderError::Timeout,
        code => ProviderError::Server {
            status: code,
            message,
        },
    }
}

/// Map a transport-level reqwest failure
pub fn error_for_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

/// `Retry-After` in delay-seconds form; HTTP dates are ignored
///
/// Values too large for a `Duration` saturate; the backoff cap bounds the
/// actual wait.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let seconds: f64 = value.parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
    } else {
        None
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}

/// Build the adapter for `provider`
pub fn build_adapter(
    provider: Provider,
    model: &str,
    api_key: String,
    request_timeout: Duration,
) -> EnrichResult<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match provider {
        Provider::Gemini => Arc::new(PromptedClassifier::new(
            GeminiClient::new(api_key, model, request_timeout)
                .map_err(|e| EnrichError::Configuration(e.to_string()))?,
        )),
        Provider::OpenAi => Arc::new(PromptedClassifier::new(
            OpenAiClient::new(api_key, model, request_timeout)
                .map_err(|e| EnrichError::Configuration(e.to_string()))?,
        )),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::Mutex;

    /// Backend answering by prompt kind and recording call order
    struct ScriptedBackend {
        calls: Mutex<Vec<&'static str>>,
        origin_reply: String,
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            prompt: &str,
            format: &ResponseFormat,
        ) -> Result<String, ProviderError> {
            let kind = if prompt.contains("\"origin\"") {
                "origin"
            } else if matches!(format, ResponseFormat::Json { .. }) {
                "pronunciation"
            } else {
                "description"
            };
            self.calls.lock().unwrap().push(kind);
            Ok(match kind {
                "origin" => self.origin_reply.clone(),
                "pronunciation" => {
                    r#"{"spanish": "fácil", "foreign": "difícil", "explanation": "La j."}"#
                        .to_string()
                }
                _ => "Nombre de origen hebreo.".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_origin_requested_first() {
        let backend = ScriptedBackend {
            calls: Mutex::new(Vec::new()),
            origin_reply: "```json\n{\"origin\": \"Arameo\"}\n```".to_string(),
        };
        let classifier = PromptedClassifier::new(backend);

        let raw = classifier.classify(&NameKey::ungendered("Ana")).await.unwrap();
        assert_eq!(raw.origin, "Arameo");
        assert_eq!(raw.pronunciation_foreign, "difícil");
        assert_eq!(raw.description, "Nombre de origen hebreo.");

        let calls = classifier.backend.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "origin");
    }

    #[tokio::test]
    async fn test_unparseable_origin_is_invalid_response() {
        let backend = ScriptedBackend {
            calls: Mutex::new(Vec::new()),
            origin_reply: "Arameo".to_string(),
        };
        let classifier = PromptedClassifier::new(backend);

        let err = classifier.classify(&NameKey::ungendered("Ana")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
        assert_eq!(classifier.backend.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_status_mapping() {
        let headers = HeaderMap::new();
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, &headers, "bad key"),
            ProviderError::AuthError(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, &headers, ""),
            ProviderError::AuthError(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, &headers, ""),
            ProviderError::InvalidInput(_)
        ));
        assert_eq!(
            error_for_status(StatusCode::SERVICE_UNAVAILABLE, &headers, "busy"),
            ProviderError::Server {
                status: 503,
                message: "busy".to_string()
            }
        );
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_huge_retry_after_saturates() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e30"));
        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            ProviderError::RateLimited {
                retry_after: Some(Duration::MAX)
            }
        );

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("99999999999999999999999999999999"),
        );
        assert_eq!(parse_retry_after(&headers), Some(Duration::MAX));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("-3"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_json_object_rejects_prose() {
        let err = parse_json_object::<Value>("no tengo respuesta").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));

        let value: Value = parse_json_object("Aquí está: {\"a\": 1} ¡listo!").unwrap();
        assert_eq!(value["a"], 1);
    }
}
