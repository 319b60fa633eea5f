//! Error taxonomy for the workflow and its remote services.
//!
//! Every failure is an [`Error`] variant, and every variant belongs to exactly
//! one [`ErrorKind`]. The kind decides three things:
//!
//! - whether the retry driver may try again ([`Retryable`])
//! - whether a fallback absorbs it (reasoning text and recipe detail only)
//! - which blocking message the presentation layer shows ([`Error::user_message`])

use std::fmt;
use std::time::Duration;

use crate::config::Credential;
use crate::retry::{RetryHint, Retryable};
use crate::session::Stage;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown when a credential is missing from the configuration store.
pub const NO_API_KEY: &str =
    "API key not found. Please add your API key in the configuration panel.";
/// Message shown when ingredients text has no usable term.
pub const INVALID_INGREDIENTS: &str = "Please enter valid ingredients, separated by commas.";
/// Message shown when a service keeps answering 429.
pub const API_RATE_LIMIT: &str = "API rate limit exceeded. Please try again later.";
/// Message shown for connection-level failures.
pub const NETWORK_ERROR: &str = "Network error. Please check your internet connection.";
/// Message shown when a recipe card without an id or title is chosen.
pub const INVALID_RECIPE_SELECTION: &str =
    "Invalid recipe selection. Please click on a recipe from the list.";
/// Prefix for malformed destinations.
pub const INVALID_DELIVERY_DETAILS: &str =
    "Invalid delivery details provided. Please check your input.";

/// The closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The user must correct their input.
    InvalidInput,
    /// A credential is not configured.
    MissingCredential,
    /// The service asked us to slow down.
    RateLimited,
    /// The service rejected the credential.
    AuthRejected,
    /// The requested recipe does not exist.
    NotFound,
    /// The request never got a usable HTTP answer.
    NetworkTransient,
    /// The service answered with a payload we cannot use.
    RemoteMalformed,
    /// A non-success status no specific rule covers.
    RemoteFailure,
    /// The delivery service refused the destination or sender.
    DeliveryRejected,
    /// The generative-text response flagged a problem with the request.
    ModelFlaggedIssue,
    /// The configuration store could not be read or written.
    Storage,
}

impl ErrorKind {
    /// True for kinds the retry driver absorbs up to its budget.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::NetworkTransient)
    }
}

/// A remote service the workflow talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Generative-text endpoint.
    Reasoning,
    /// Recipe-by-ingredients search.
    RecipeSearch,
    /// Recipe detail lookup.
    RecipeDetail,
    /// Chat-message delivery.
    Chat,
    /// Transactional email delivery.
    Email,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Reasoning => write!(f, "Gemini"),
            Service::RecipeSearch | Service::RecipeDetail => write!(f, "Spoonacular"),
            Service::Chat => write!(f, "Telegram"),
            Service::Email => write!(f, "SendGrid"),
        }
    }
}

/// Specific refusals from the delivery services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryRejection {
    /// The chat id does not name a chat the bot can reach.
    ChatNotFound,
    /// The recipient blocked the bot.
    BotBlocked,
    /// The email service rejected the recipient address.
    InvalidRecipient,
    /// The email sender identity is not verified.
    SenderNotVerified,
}

impl fmt::Display for DeliveryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryRejection::ChatNotFound => {
                write!(f, "Telegram Error: Chat ID not found or invalid.")
            }
            DeliveryRejection::BotBlocked => write!(f, "Telegram Error: Bot blocked by user."),
            DeliveryRejection::InvalidRecipient => {
                write!(f, "SendGrid Error: Invalid recipient email format.")
            }
            DeliveryRejection::SenderNotVerified => write!(
                f,
                "SendGrid Error: Sender email not verified. Check SendGrid setup."
            ),
        }
    }
}

/// Errors produced by the workflow and its clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Input the user must correct.
    #[error("{0}")]
    InvalidInput(String),

    /// A credential is missing from the configuration store.
    #[error("{} API key missing", .0.label())]
    MissingCredential(Credential),

    /// The service answered 429.
    #[error("{service} API rate limit exceeded")]
    RateLimited {
        /// Service that throttled us.
        service: Service,
        /// Delay the server asked for, if it declared one.
        retry_after: Option<Duration>,
    },

    /// The service rejected the credential.
    #[error("{service} API key invalid or unauthorized (Status {status})")]
    AuthRejected {
        /// Service that rejected the credential.
        service: Service,
        /// HTTP status received.
        status: u16,
    },

    /// The recipe id does not exist.
    #[error("Recipe with ID {recipe_id} not found (404)")]
    NotFound {
        /// Recipe id that was looked up.
        recipe_id: i64,
    },

    /// Connection-level failure.
    #[error("Network error talking to {service}: {message}")]
    Network {
        /// Service being called.
        service: Service,
        /// Transport error description.
        message: String,
    },

    /// Unusable payload: undecodable body, blocked prompt, empty generation.
    #[error("Malformed {service} response: {detail}")]
    RemoteMalformed {
        /// Service that answered.
        service: Service,
        /// What was wrong with the payload.
        detail: String,
    },

    /// Non-success status not covered by a specific rule.
    #[error("{service} API error: {status} {detail}")]
    RemoteFailure {
        /// Service that answered.
        service: Service,
        /// HTTP status received.
        status: u16,
        /// Error text from the body, if any.
        detail: String,
    },

    /// A delivery service refused the destination or sender.
    #[error("{0}")]
    DeliveryRejected(DeliveryRejection),

    /// The generative-text response flagged the request as invalid.
    #[error("AI flagged issue: {issue}")]
    ModelFlaggedIssue {
        /// Stage whose response raised the flag.
        stage: Stage,
        /// Joined error tags from the response.
        issue: String,
    },

    /// Configuration store failure.
    #[error("Configuration store error: {0}")]
    Storage(String),
}

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a network error.
    pub fn network(service: Service, message: impl Into<String>) -> Self {
        Self::Network {
            service,
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(service: Service, detail: impl Into<String>) -> Self {
        Self::RemoteMalformed {
            service,
            detail: detail.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// The kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::MissingCredential(_) => ErrorKind::MissingCredential,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::AuthRejected { .. } => ErrorKind::AuthRejected,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Network { .. } => ErrorKind::NetworkTransient,
            Error::RemoteMalformed { .. } => ErrorKind::RemoteMalformed,
            Error::RemoteFailure { .. } => ErrorKind::RemoteFailure,
            Error::DeliveryRejected(_) => ErrorKind::DeliveryRejected,
            Error::ModelFlaggedIssue { .. } => ErrorKind::ModelFlaggedIssue,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The single blocking message shown when this error halts `stage`.
    pub fn user_message(&self, stage: Stage) -> String {
        match self {
            Error::RateLimited { .. } => API_RATE_LIMIT.to_string(),
            Error::Network { .. } => NETWORK_ERROR.to_string(),
            Error::InvalidInput(message) => message.clone(),
            Error::MissingCredential(credential) => {
                format!("{} API key missing. {}", credential.label(), NO_API_KEY)
            }
            Error::AuthRejected { service, .. } => match stage {
                Stage::SendList => format!(
                    "{} API key seems invalid or unauthorized. Check configuration.",
                    service
                ),
                _ => format!("{} API key seems invalid. Please check configuration.", service),
            },
            Error::NotFound { .. } => {
                "Recipe details not found. It might have been removed. Try another recipe."
                    .to_string()
            }
            Error::DeliveryRejected(rejection) => rejection.to_string(),
            Error::ModelFlaggedIssue { issue, .. } => {
                format!("AI flagged issue: {}. Please check your input.", issue)
            }
            other => format!("{}: {}", stage.failure_prefix(), other),
        }
    }
}

impl Retryable for Error {
    fn retry_hint(&self) -> RetryHint {
        match self {
            Error::RateLimited {
                retry_after: Some(delay),
                ..
            } => RetryHint::After(*delay),
            // Delivery services without a hint back off at twice the REST base.
            Error::RateLimited {
                service: Service::Chat | Service::Email,
                retry_after: None,
            } => RetryHint::ScaledBackoff(2),
            other if other.kind().is_retryable() => RetryHint::Backoff,
            _ => RetryHint::Never,
        }
    }
}
