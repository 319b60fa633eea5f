//! Transactional email delivery (`/v3/mail/send`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EmailSender;
use crate::error::{DeliveryRejection, Error, Result, Service};
use crate::transport::{HttpRequest, HttpResponse};

#[derive(Serialize)]
struct Mail<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: String,
    content: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct MailErrors {
    #[serde(default)]
    errors: Vec<MailError>,
}

#[derive(Debug, Deserialize)]
struct MailError {
    #[serde(default)]
    message: Option<String>,
}

pub(super) fn request(
    base_url: &str,
    api_key: &str,
    sender: &EmailSender,
    recipient: &str,
    subject: String,
    text: &str,
) -> Result<HttpRequest> {
    let mail = Mail {
        personalizations: [Personalization {
            to: [Address {
                email: recipient,
                name: None,
            }],
        }],
        from: Address {
            email: &sender.address,
            name: Some(&sender.name),
        },
        subject,
        content: [Content {
            kind: "text/plain",
            value: text,
        }],
    };
    HttpRequest::post(format!("{base_url}/v3/mail/send"))
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&mail)
        .map_err(|e| Error::malformed(Service::Email, e.to_string()))
}

/// Classify a mail-send response; only 202 is success.
///
/// Recipient and sender problems named in the body take precedence over the
/// generic 401/403 mapping, since the service reports both with those codes.
pub(super) fn classify(response: &HttpResponse, padding: Duration) -> Result<()> {
    let status = response.status;
    if status == 202 {
        return Ok(());
    }

    let messages: Vec<String> = response
        .json_body::<MailErrors>()
        .unwrap_or_default()
        .errors
        .into_iter()
        .filter_map(|e| e.message)
        .collect();
    let joined = messages.join("; ");

    if status == 429 {
        return Err(Error::RateLimited {
            service: Service::Email,
            retry_after: response.retry_after().map(|d| d + padding),
        });
    }
    if joined.contains("valid email address") {
        return Err(Error::DeliveryRejected(DeliveryRejection::InvalidRecipient));
    }
    if joined.contains("verified sender") || joined.contains("authenticate") {
        return Err(Error::DeliveryRejected(DeliveryRejection::SenderNotVerified));
    }
    if status == 401 || status == 403 {
        return Err(Error::AuthRejected {
            service: Service::Email,
            status,
        });
    }

    Err(Error::RemoteFailure {
        service: Service::Email,
        status,
        detail: if joined.is_empty() {
            format!("Status {status}")
        } else {
            joined
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PADDING: Duration = Duration::from_millis(500);

    fn errors(status: u16, message: &str) -> HttpResponse {
        HttpResponse::json(
            status,
            &json!({"errors": [{"message": message, "field": null, "help": null}]}),
        )
    }

    #[test]
    fn test_request_shape() {
        let request = request(
            "https://mail.example",
            "sg-key",
            &EmailSender::default(),
            "user@example.com",
            "Shopping List for Soup".to_string(),
            "body",
        )
        .unwrap();

        assert_eq!(request.url, "https://mail.example/v3/mail/send");
        assert_eq!(request.header_value("authorization"), Some("Bearer sg-key"));
        assert_eq!(
            request.body,
            Some(json!({
                "personalizations": [{"to": [{"email": "user@example.com"}]}],
                "from": {"email": "recipe-suggester-bot@example.com", "name": "Recipe Suggester"},
                "subject": "Shopping List for Soup",
                "content": [{"type": "text/plain", "value": "body"}]
            }))
        );
    }

    #[test]
    fn test_only_accepted_counts_as_success() {
        assert!(classify(&HttpResponse::new(202, ""), PADDING).is_ok());
        assert_eq!(
            classify(&HttpResponse::new(200, ""), PADDING),
            Err(Error::RemoteFailure {
                service: Service::Email,
                status: 200,
                detail: "Status 200".to_string(),
            })
        );
    }

    #[test]
    fn test_rejections_are_read_from_body() {
        assert_eq!(
            classify(
                &errors(400, "Does not contain a valid email address."),
                PADDING
            ),
            Err(Error::DeliveryRejected(DeliveryRejection::InvalidRecipient))
        );
        assert_eq!(
            classify(
                &errors(401, "The provided authorization grant is invalid, expired, or revoked"),
                PADDING
            ),
            Err(Error::AuthRejected {
                service: Service::Email,
                status: 401,
            })
        );
        assert_eq!(
            classify(&errors(403, "Please use a verified sender."), PADDING),
            Err(Error::DeliveryRejected(DeliveryRejection::SenderNotVerified))
        );
    }

    #[test]
    fn test_rate_limit_without_header_has_no_declared_delay() {
        assert_eq!(
            classify(&HttpResponse::new(429, ""), PADDING),
            Err(Error::RateLimited {
                service: Service::Email,
                retry_after: None,
            })
        );
    }
}
