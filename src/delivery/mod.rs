//! Shopping-list delivery over chat or email.
//!
//! Destinations are validated before anything is sent. Both services run
//! under the REST retry budget; a rate limit with a server-declared delay
//! waits that long (padded), otherwise delivery backs off at twice the REST
//! base delay.

mod chat;
mod email;
mod render;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use render::{render_line, render_shopping_list, subject, NOTHING_MISSING};

use crate::config::{Credential, EmailSender, Settings};
use crate::error::{Error, Result, Service, INVALID_DELIVERY_DETAILS};
use crate::recipes::Ingredient;
use crate::retry::{retry, RetryPolicy};
use crate::transport::{HttpRequest, Transport};

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
// ASCII digits only; `\d` would also accept other scripts.
static CHAT_ID_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("chat id pattern"));

/// Where the shopping list goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMethod {
    /// Chat bot message to a numeric chat id.
    Chat,
    /// Email to an address.
    Email,
}

impl DeliveryMethod {
    /// Lower-case name used in queries and logs.
    pub fn label(self) -> &'static str {
        match self {
            DeliveryMethod::Chat => "telegram",
            DeliveryMethod::Email => "email",
        }
    }

    /// Credential the method needs.
    pub fn credential(self) -> Credential {
        match self {
            DeliveryMethod::Chat => Credential::ChatBot,
            DeliveryMethod::Email => Credential::Email,
        }
    }

    /// Remote service the method talks to.
    pub fn service(self) -> Service {
        match self {
            DeliveryMethod::Chat => Service::Chat,
            DeliveryMethod::Email => Service::Email,
        }
    }

    /// Confirmation returned after a successful send.
    pub fn success_message(self) -> &'static str {
        match self {
            DeliveryMethod::Chat => "Shopping list sent successfully via Telegram!",
            DeliveryMethod::Email => "Shopping list sent successfully via Email!",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeliveryMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" | "telegram" => Ok(DeliveryMethod::Chat),
            "email" => Ok(DeliveryMethod::Email),
            _ => Err(Error::invalid_input("Invalid delivery method")),
        }
    }
}

/// Check `destination` against `method`'s shape; returns it trimmed.
pub fn validate_destination(method: DeliveryMethod, destination: &str) -> Result<&str> {
    let destination = destination.trim();
    if destination.is_empty() {
        return Err(Error::invalid_input(format!(
            "Missing destination {} details",
            method.label()
        )));
    }

    match method {
        DeliveryMethod::Email if !EMAIL_SHAPE.is_match(destination) => Err(Error::invalid_input(
            format!("{INVALID_DELIVERY_DETAILS} (Bad email format)"),
        )),
        DeliveryMethod::Chat if !CHAT_ID_SHAPE.is_match(destination) => Err(Error::invalid_input(
            format!("{INVALID_DELIVERY_DETAILS} (Chat ID must be numeric)"),
        )),
        _ => Ok(destination),
    }
}

/// Client for both delivery services.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn Transport>,
    chat_url: String,
    email_url: String,
    sender: EmailSender,
    policy: RetryPolicy,
    padding: Duration,
}

impl fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("chat_url", &self.chat_url)
            .field("email_url", &self.email_url)
            .field("sender", &self.sender)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DeliveryClient {
    /// Create a client from the shared settings.
    pub fn new(transport: Arc<dyn Transport>, settings: &Settings) -> Self {
        Self {
            transport,
            chat_url: settings.endpoints.chat.trim_end_matches('/').to_string(),
            email_url: settings.endpoints.email.trim_end_matches('/').to_string(),
            sender: settings.sender.clone(),
            policy: settings.retry.rest.clone(),
            padding: settings.retry.retry_after_padding,
        }
    }

    /// Send the shopping list for `title` and return the confirmation text.
    pub async fn send(
        &self,
        method: DeliveryMethod,
        destination: &str,
        title: &str,
        ingredients: &[Ingredient],
        api_key: &str,
    ) -> Result<String> {
        let destination = validate_destination(method, destination)?;
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredential(method.credential()));
        }

        let text = render_shopping_list(title, ingredients);
        let request = match method {
            DeliveryMethod::Chat => chat::request(&self.chat_url, api_key, destination, &text)?,
            DeliveryMethod::Email => email::request(
                &self.email_url,
                api_key,
                &self.sender,
                destination,
                subject(title),
                &text,
            )?,
        };

        retry(&self.policy, |attempt| {
            debug!(method = %method, attempt = attempt + 1, "sending shopping list");
            self.attempt(method, request.clone())
        })
        .await
        .map_err(|failure| failure.into_error())?;

        info!(method = %method, items = ingredients.len(), "shopping list sent");
        Ok(method.success_message().to_string())
    }

    async fn attempt(&self, method: DeliveryMethod, request: HttpRequest) -> Result<()> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| Error::network(method.service(), e.message()))?;

        debug!(method = %method, status = response.status, "delivery response");
        match method {
            DeliveryMethod::Chat => chat::classify(&response, self.padding),
            DeliveryMethod::Email => email::classify(&response, self.padding),
        }
    }
}
