//! Recipe search, recipe detail, and the missing-ingredient diff.
//!
//! Both remote calls run under the shared REST retry budget. Search failures
//! always propagate; detail failures other than rate limiting, rejected keys
//! and unknown recipes are absorbed by the estimated ingredient list.

mod detail;
mod diff;
mod search;
mod types;

use std::sync::Arc;

pub use diff::{covers, missing_ingredients, RequiredIngredient};
pub use search::{ingredient_terms, validate_ingredients};
pub use types::{Ingredient, MissingIngredients, RecipeSummary, SelectedRecipe, ESTIMATE_PREFIX};

use crate::config::Settings;
use crate::error::{Error, Result, Service};
use crate::retry::RetryPolicy;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Client for the recipe service.
#[derive(Clone)]
pub struct RecipeClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RecipeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RecipeClient {
    /// Create a client from the shared settings.
    pub fn new(transport: Arc<dyn Transport>, settings: &Settings) -> Self {
        Self {
            transport,
            base_url: settings.endpoints.recipes.trim_end_matches('/').to_string(),
            policy: settings.retry.rest.clone(),
        }
    }

    async fn get(&self, service: Service, request: HttpRequest) -> Result<HttpResponse> {
        self.transport
            .send(request)
            .await
            .map_err(|e| Error::network(service, e.message()))
    }
}

/// Map a recipe service status to an error; `None` for success.
fn status_error(service: Service, response: &HttpResponse, recipe_id: Option<i64>) -> Option<Error> {
    let status = response.status;
    match (status, recipe_id) {
        (200..=299, _) => None,
        (429, _) => Some(Error::RateLimited {
            service,
            retry_after: None,
        }),
        (401 | 403, _) => Some(Error::AuthRejected { service, status }),
        (404, Some(recipe_id)) => Some(Error::NotFound { recipe_id }),
        _ => Some(Error::RemoteFailure {
            service,
            status,
            detail: response.body.chars().take(200).collect(),
        }),
    }
}
