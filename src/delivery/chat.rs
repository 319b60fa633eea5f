//! Chat bot delivery (`sendMessage`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeliveryRejection, Error, Result, Service};
use crate::transport::{HttpRequest, HttpResponse};

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ChatError {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ChatErrorParameters>,
}

#[derive(Debug, Deserialize)]
struct ChatErrorParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

pub(super) fn request(base_url: &str, token: &str, chat_id: &str, text: &str) -> Result<HttpRequest> {
    HttpRequest::post(format!("{base_url}/bot{token}/sendMessage"))
        .json(&SendMessage { chat_id, text })
        .map_err(|e| Error::malformed(Service::Chat, e.to_string()))
}

/// Classify a `sendMessage` response; success is any 2xx.
pub(super) fn classify(response: &HttpResponse, padding: Duration) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let status = response.status;
    let body: ChatError = response.json_body().unwrap_or_default();
    let description = body
        .description
        .unwrap_or_else(|| format!("Status {status}"));

    match status {
        429 => {
            let declared = body
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs)
                .or_else(|| response.retry_after());
            Err(Error::RateLimited {
                service: Service::Chat,
                retry_after: declared.map(|d| d + padding),
            })
        }
        400 if description.contains("chat not found") => {
            Err(Error::DeliveryRejected(DeliveryRejection::ChatNotFound))
        }
        403 if description.contains("bot was blocked") => {
            Err(Error::DeliveryRejected(DeliveryRejection::BotBlocked))
        }
        401 | 403 => Err(Error::AuthRejected {
            service: Service::Chat,
            status,
        }),
        _ => Err(Error::RemoteFailure {
            service: Service::Chat,
            status,
            detail: description,
        }),
    }
}
