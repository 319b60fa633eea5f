use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::metadata::{extract_metadata, ReasoningMetadata};
use super::prompt::build_prompt;
use crate::config::{ReasoningSettings, Settings};
use crate::error::{Error, Result, Service};
use crate::fallback::fallback_reasoning;
use crate::retry::{retry_with_hooks, RetryEvent, RetryPolicy};
use crate::session::{Stage, StageRecord};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Where a stage's reasoning text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasoningSource {
    /// The generative-text service answered.
    Model,
    /// No key was configured; the fallback synthesizer wrote the text.
    FallbackNoKey,
    /// Every attempt failed; the fallback synthesizer wrote the text.
    FallbackAfterFailure,
}

impl ReasoningSource {
    /// True for synthesized text.
    pub fn is_fallback(self) -> bool {
        !matches!(self, ReasoningSource::Model)
    }
}

/// Result of one narration: always usable text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningOutcome {
    /// Reasoning text.
    pub text: String,
    /// Signals extracted from `text`.
    pub metadata: ReasoningMetadata,
    /// Where `text` came from.
    pub source: ReasoningSource,
    /// Attempts that failed during this call.
    pub failed_attempts: u32,
    /// Last error seen, when the text is a fallback after failure.
    pub last_error: Option<Error>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Client for the generative-text endpoint.
///
/// [`narrate`](Self::narrate) never fails: missing keys and exhausted retries
/// both resolve to fallback text.
#[derive(Clone)]
pub struct ReasoningClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    settings: ReasoningSettings,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningClient")
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ReasoningClient {
    /// Create a client from the shared settings.
    pub fn new(transport: Arc<dyn Transport>, settings: &Settings) -> Self {
        Self {
            transport,
            base_url: settings.endpoints.reasoning.trim_end_matches('/').to_string(),
            settings: settings.reasoning.clone(),
            policy: settings.retry.reasoning.clone(),
        }
    }

    /// Retry budget for a call that follows `prior_failures` failed attempts.
    ///
    /// Failures accumulate across calls for the same stage until one
    /// succeeds, so a stage that already used its budget gets a single
    /// attempt.
    pub fn budget_after(&self, prior_failures: u32) -> RetryPolicy {
        self.policy.with_budget_spent(prior_failures)
    }

    /// Produce reasoning text for `query` at `stage`.
    pub async fn narrate(
        &self,
        query: &str,
        stage: Stage,
        api_key: Option<&str>,
        prior_failures: u32,
    ) -> ReasoningOutcome {
        let Some(key) = api_key else {
            info!(stage = stage.index(), "no reasoning key configured, using fallback");
            return Self::fallback(query, stage, ReasoningSource::FallbackNoKey, 0, None);
        };

        let prompt = build_prompt(query, stage);
        debug!(stage = stage.index(), prompt_len = prompt.len(), "requesting reasoning");

        let policy = self.budget_after(prior_failures);
        let result = retry_with_hooks(
            &policy,
            |attempt| {
                debug!(stage = stage.index(), attempt = attempt + 1, "reasoning attempt");
                self.generate(&prompt, key)
            },
            |event: &RetryEvent<'_, Error>| {
                warn!(
                    stage = stage.index(),
                    attempt = event.attempt,
                    delay_ms = event.next_delay.map(|d| d.as_millis() as u64),
                    error = %event.error,
                    "reasoning attempt failed"
                );
            },
        )
        .await;

        match result {
            Ok(text) => {
                let metadata = extract_metadata(&text);
                info!(
                    stage = stage.index(),
                    reasoning_types = ?metadata.reasoning_types,
                    errors = %metadata.errors,
                    uncertainties = %metadata.uncertainties,
                    "reasoning received"
                );
                ReasoningOutcome {
                    text,
                    metadata,
                    source: ReasoningSource::Model,
                    failed_attempts: 0,
                    last_error: None,
                }
            }
            Err(failure) => {
                warn!(
                    stage = stage.index(),
                    attempts = failure.attempts,
                    reason = ?failure.reason,
                    "reasoning unavailable, using fallback"
                );
                let attempts = failure.attempts;
                Self::fallback(
                    query,
                    stage,
                    ReasoningSource::FallbackAfterFailure,
                    attempts,
                    Some(failure.into_error()),
                )
            }
        }
    }

    /// Narrate `query` and store the outcome in `record`.
    ///
    /// The record's failure counter is reset on success and grows by the
    /// failed attempts otherwise, capped one past the retry budget.
    pub async fn narrate_into(
        &self,
        record: &mut StageRecord,
        query: String,
        stage: Stage,
        api_key: Option<&str>,
    ) -> ReasoningOutcome {
        let outcome = self.narrate(&query, stage, api_key, record.retry_count).await;

        record.retry_count = match outcome.source {
            ReasoningSource::Model => 0,
            ReasoningSource::FallbackNoKey => record.retry_count,
            ReasoningSource::FallbackAfterFailure => record
                .retry_count
                .saturating_add(outcome.failed_attempts)
                .min(self.policy.max_retries() + 1),
        };
        record.query = query;
        record.reasoning = outcome.text.clone();
        record.metadata = outcome.metadata.clone();
        record.source = Some(outcome.source);
        outcome
    }

    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
            },
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.settings.model
        );
        let request = HttpRequest::post(url)
            .query("key", api_key)
            .json(&body)
            .map_err(|e| Error::malformed(Service::Reasoning, e.to_string()))?;

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| Error::network(Service::Reasoning, e.message()))?;

        classify(&response)?;
        extract_text(&response)
    }

    fn fallback(
        query: &str,
        stage: Stage,
        source: ReasoningSource,
        failed_attempts: u32,
        last_error: Option<Error>,
    ) -> ReasoningOutcome {
        let text = fallback_reasoning(query, stage);
        let metadata = extract_metadata(&text);
        ReasoningOutcome {
            text,
            metadata,
            source,
            failed_attempts,
            last_error,
        }
    }
}

fn classify(response: &HttpResponse) -> Result<()> {
    let status = response.status;
    if response.is_success() {
        return Ok(());
    }

    let detail = response
        .json_body::<ErrorBody>()
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {status}"));

    Err(match status {
        429 => Error::RateLimited {
            service: Service::Reasoning,
            retry_after: response.retry_after(),
        },
        401 | 403 => Error::AuthRejected {
            service: Service::Reasoning,
            status,
        },
        500..=599 => Error::network(Service::Reasoning, format!("{status}: {detail}")),
        _ => Error::RemoteFailure {
            service: Service::Reasoning,
            status,
            detail,
        },
    })
}

fn extract_text(response: &HttpResponse) -> Result<String> {
    let data: GenerateResponse = response
        .json_body()
        .map_err(|e| Error::malformed(Service::Reasoning, e.to_string()))?;

    let Some(candidate) = data.candidates.into_iter().next() else {
        let detail = match data.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => format!("request blocked due to prompt: {reason}"),
            None => "response missing candidates".to_string(),
        };
        return Err(Error::malformed(Service::Reasoning, detail));
    };

    let text = candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty());

    match (text, candidate.finish_reason) {
        (Some(text), _) => Ok(text),
        (None, Some(reason)) if reason != "STOP" => Err(Error::malformed(
            Service::Reasoning,
            format!("generation stopped due to: {reason}"),
        )),
        (None, _) => Err(Error::malformed(
            Service::Reasoning,
            "empty response structure",
        )),
    }
}
