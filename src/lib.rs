//! # Larder
//!
//! Turn "what's in the fridge" into a shopping list.
//!
//! A run has three steps, driven by [`Coordinator`] over a caller-owned
//! [`SessionState`]:
//!
//! 1. search recipes for the entered ingredients
//! 2. diff the chosen recipe against what the user has
//! 3. send the missing items by chat or email
//!
//! Each step is also narrated by a generative-text service. Every remote call
//! runs under the bounded backoff driver in [`retry`], and the two calls that
//! have a sensible substitute (narration and recipe detail) fall back to the
//! deterministic content in [`fallback`] instead of failing.
//!
//! ## Quick Example
//!
//! ```rust
//! use std::sync::Arc;
//! use larder::prelude::*;
//! use larder::testing::ScriptedTransport;
//! use larder::transport::HttpResponse;
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(ScriptedTransport::new().push(
//!     "findByIngredients",
//!     HttpResponse::new(200, r#"[{"id": 7, "title": "Omelette"}]"#),
//! ));
//! let store = Arc::new(MemoryStore::with_credentials(
//!     CredentialSet::new().with(Credential::Recipes, "key"),
//! ));
//! let coordinator = Coordinator::new(Settings::default(), transport, store);
//!
//! let mut session = SessionState::new();
//! let report = coordinator.find_recipes(&mut session, "eggs, cheese").await.unwrap();
//! assert_eq!(report.value[0].title, "Omelette");
//! # });
//! ```
//!
//! Terminal errors carry the message to show for the step that failed:
//!
//! ```rust
//! use larder::{Error, Stage};
//!
//! let error = Error::invalid_input("Please enter valid ingredients, separated by commas.");
//! assert_eq!(
//!     error.user_message(Stage::FindRecipes),
//!     "Please enter valid ingredients, separated by commas."
//! );
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod delivery;
pub mod error;
pub mod fallback;
pub mod reasoning;
pub mod recipes;
pub mod retry;
pub mod session;
pub mod store;
pub mod testing;
pub mod transport;
pub mod workflow;

// Re-exports
pub use config::{Credential, CredentialSet, Settings};
pub use delivery::{DeliveryClient, DeliveryMethod};
pub use error::{DeliveryRejection, Error, ErrorKind, Result, Service};
pub use reasoning::{ReasoningClient, ReasoningMetadata, ReasoningSource};
pub use recipes::{Ingredient, RecipeClient, RecipeSummary, SelectedRecipe};
pub use retry::{retry, RetryFailure, RetryHint, RetryPolicy, Retryable};
pub use session::{SessionState, Stage};
pub use store::{ConfigStore, JsonFileStore, MemoryStore};
pub use workflow::{Advisory, Coordinator, StepReport};

#[cfg(feature = "http")]
pub use transport::ReqwestTransport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Credential, CredentialSet, Settings};
    pub use crate::delivery::DeliveryMethod;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::session::{SessionState, Stage};
    pub use crate::store::{ConfigStore, MemoryStore};
    pub use crate::transport::Transport;
    pub use crate::workflow::{Advisory, Coordinator, StepReport};
}
