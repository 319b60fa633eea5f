//! Credentials, service endpoints and retry budgets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// One of the four credentials the workflow needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Credential {
    /// Generative-text API key.
    Reasoning,
    /// Recipe service API key.
    Recipes,
    /// Chat bot token.
    ChatBot,
    /// Email service API key.
    Email,
}

impl Credential {
    /// All credentials, in configuration-panel order.
    pub const ALL: [Credential; 4] = [
        Credential::Recipes,
        Credential::ChatBot,
        Credential::Email,
        Credential::Reasoning,
    ];

    /// Key under which the credential is stored.
    pub fn storage_key(self) -> &'static str {
        match self {
            Credential::Reasoning => "geminiKey",
            Credential::Recipes => "spoonacularKey",
            Credential::ChatBot => "telegramBotKey",
            Credential::Email => "sendgridKey",
        }
    }

    /// Environment variable consulted by [`CredentialSet::from_env`].
    pub fn env_var(self) -> &'static str {
        match self {
            Credential::Reasoning => "LARDER_GEMINI_KEY",
            Credential::Recipes => "LARDER_SPOONACULAR_KEY",
            Credential::ChatBot => "LARDER_TELEGRAM_BOT_KEY",
            Credential::Email => "LARDER_SENDGRID_KEY",
        }
    }

    /// Human-readable service name.
    pub fn label(self) -> &'static str {
        match self {
            Credential::Reasoning => "Gemini",
            Credential::Recipes => "Spoonacular",
            Credential::ChatBot => "Telegram Bot",
            Credential::Email => "SendGrid",
        }
    }
}

/// The four optional credentials, trimmed.
///
/// Blank values are stored as `None`, so "present" always means "non-empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    #[serde(rename = "geminiKey", default, skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
    #[serde(rename = "spoonacularKey", default, skip_serializing_if = "Option::is_none")]
    recipes: Option<String>,
    #[serde(rename = "telegramBotKey", default, skip_serializing_if = "Option::is_none")]
    chat_bot: Option<String>,
    #[serde(rename = "sendgridKey", default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl CredentialSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all four credentials from their environment variables.
    pub fn from_env() -> Self {
        let mut set = Self::new();
        for credential in Credential::ALL {
            if let Ok(value) = std::env::var(credential.env_var()) {
                set.set(credential, value);
            }
        }
        set
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, credential: Credential, value: impl Into<String>) -> Self {
        self.set(credential, value);
        self
    }

    /// Store a credential, trimming it; blank values clear the slot.
    pub fn set(&mut self, credential: Credential, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        *self.slot_mut(credential) = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Look up a credential.
    pub fn get(&self, credential: Credential) -> Option<&str> {
        match credential {
            Credential::Reasoning => self.reasoning.as_deref(),
            Credential::Recipes => self.recipes.as_deref(),
            Credential::ChatBot => self.chat_bot.as_deref(),
            Credential::Email => self.email.as_deref(),
        }
    }

    /// Look up a credential, failing with `MissingCredential` when absent.
    pub fn require(&self, credential: Credential) -> crate::Result<&str> {
        self.get(credential)
            .ok_or(crate::Error::MissingCredential(credential))
    }

    /// Re-trim every value; used on sets that came from deserialization.
    pub fn normalized(self) -> Self {
        let mut out = Self::new();
        for credential in Credential::ALL {
            if let Some(value) = self.get(credential) {
                out.set(credential, value);
            }
        }
        out
    }

    fn slot_mut(&mut self, credential: Credential) -> &mut Option<String> {
        match credential {
            Credential::Reasoning => &mut self.reasoning,
            Credential::Recipes => &mut self.recipes,
            Credential::ChatBot => &mut self.chat_bot,
            Credential::Email => &mut self.email,
        }
    }
}

/// Base URLs of the four remote services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Generative-text API, up to and excluding `/models`.
    pub reasoning: String,
    /// Recipe API root.
    pub recipes: String,
    /// Chat bot API root.
    pub chat: String,
    /// Email API root.
    pub email: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            reasoning: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            recipes: "https://api.spoonacular.com".to_string(),
            chat: "https://api.telegram.org".to_string(),
            email: "https://api.sendgrid.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at the same root; handy for local stubs.
    pub fn all_at(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            reasoning: root.clone(),
            recipes: root.clone(),
            chat: root.clone(),
            email: root,
        }
    }
}

/// Generation parameters for the generative-text endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningSettings {
    /// Model name used in the request path.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_output_tokens: u32,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash-latest".to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}

/// Sender identity for email delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSender {
    /// Sender address; must be verified with the email service.
    pub address: String,
    /// Display name.
    pub name: String,
}

impl Default for EmailSender {
    fn default() -> Self {
        Self {
            address: "recipe-suggester-bot@example.com".to_string(),
            name: "Recipe Suggester".to_string(),
        }
    }
}

/// Retry budgets for the two families of remote calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryBudgets {
    /// Generative-text calls: 3 retries, 4 attempts in total.
    pub reasoning: RetryPolicy,
    /// Recipe and delivery calls: 2 retries, 3 attempts in total.
    pub rest: RetryPolicy,
    /// Padding added to a server-declared retry-after.
    pub retry_after_padding: Duration,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            reasoning: RetryPolicy::exponential(Duration::from_millis(1000))
                .with_additive_jitter(Duration::from_millis(500))
                .with_max_retries(3),
            rest: RetryPolicy::exponential(Duration::from_millis(1000))
                .with_additive_jitter(Duration::from_millis(1000))
                .with_max_retries(2)
                .with_max_delay(Duration::from_secs(60)),
            retry_after_padding: Duration::from_millis(500),
        }
    }
}

/// Everything the workflow needs besides credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Service base URLs.
    pub endpoints: Endpoints,
    /// Generative-text parameters.
    pub reasoning: ReasoningSettings,
    /// Email sender identity.
    pub sender: EmailSender,
    /// Retry budgets.
    pub retry: RetryBudgets,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            reasoning: ReasoningSettings::default(),
            sender: EmailSender::default(),
            retry: RetryBudgets::default(),
            timeout_seconds: 30,
        }
    }
}

impl Settings {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON document; missing fields take defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::storage(format!("invalid settings: {e}")))
    }

    /// Set endpoints.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set retry budgets.
    pub fn with_retry(mut self, retry: RetryBudgets) -> Self {
        self.retry = retry;
        self
    }

    /// Set the email sender.
    pub fn with_sender(mut self, sender: EmailSender) -> Self {
        self.sender = sender;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}
