use serde::Deserialize;
use tracing::{debug, info, warn};

use super::types::RecipeSummary;
use super::{status_error, RecipeClient};
use crate::error::{Error, Result, Service, INVALID_INGREDIENTS};
use crate::retry::retry;
use crate::transport::HttpRequest;

const RESULT_LIMIT: u32 = 5;
const PLACEHOLDER_IMAGE: &str = "images/placeholder-recipe.png";

/// Split ingredients text on commas, keeping the non-empty trimmed terms.
pub fn ingredient_terms(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// [`ingredient_terms`], failing with `InvalidInput` when none remain.
pub fn validate_ingredients(text: &str) -> Result<Vec<String>> {
    let terms = ingredient_terms(text);
    if terms.is_empty() {
        Err(Error::invalid_input(INVALID_INGREDIENTS))
    } else {
        Ok(terms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntry {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    used_ingredient_count: Option<u32>,
    #[serde(default)]
    missed_ingredient_count: Option<u32>,
}

impl From<SearchEntry> for RecipeSummary {
    fn from(entry: SearchEntry) -> Self {
        RecipeSummary {
            id: entry.id.unwrap_or(0),
            title: entry
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled Recipe".to_string()),
            image_ref: entry
                .image
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            used_ingredient_count: entry.used_ingredient_count.unwrap_or(0),
            missing_ingredient_count: entry.missed_ingredient_count.unwrap_or(0),
        }
    }
}

impl RecipeClient {
    /// Search up to five recipes using `text`'s ingredient terms.
    ///
    /// Text without any usable term yields an empty list without a request.
    /// A body that is not an array is treated as no results.
    pub async fn search(&self, text: &str, api_key: &str) -> Result<Vec<RecipeSummary>> {
        let terms = ingredient_terms(text);
        if terms.is_empty() {
            warn!("no usable ingredient terms, skipping search");
            return Ok(Vec::new());
        }
        let joined = terms.join(",");

        let response = retry(&self.policy, |attempt| {
            let request = HttpRequest::get(format!("{}/recipes/findByIngredients", self.base_url))
                .query("ingredients", joined.as_str())
                .query("number", RESULT_LIMIT.to_string())
                .query("ranking", "1")
                .query("apiKey", api_key);
            debug!(url = %request.redacted(), attempt = attempt + 1, "searching recipes");
            async move {
                let response = self.get(Service::RecipeSearch, request).await?;
                match status_error(Service::RecipeSearch, &response, None) {
                    Some(error) => Err(error),
                    None => Ok(response),
                }
            }
        })
        .await
        .map_err(|failure| failure.into_error())?;

        let data: serde_json::Value = response
            .json_body()
            .map_err(|e| Error::malformed(Service::RecipeSearch, e.to_string()))?;
        let serde_json::Value::Array(entries) = data else {
            warn!("recipe search returned a non-array body, treating as empty");
            return Ok(Vec::new());
        };

        let recipes: Vec<RecipeSummary> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<SearchEntry>(entry).ok())
            .map(RecipeSummary::from)
            .collect();
        info!(count = recipes.len(), "recipe search complete");
        Ok(recipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::ErrorKind;
    use crate::testing::ScriptedTransport;
    use crate::transport::HttpResponse;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: Arc<ScriptedTransport>) -> RecipeClient {
        RecipeClient::new(transport, &Settings::default())
    }

    #[tokio::test]
    async fn test_search_builds_query_and_decodes() {
        let transport = Arc::new(ScriptedTransport::new().push(
            "findByIngredients",
            HttpResponse::json(
                200,
                &json!([
                    {"id": 55, "title": "Garlic Chicken", "image": "https://img/55.jpg",
                     "usedIngredientCount": 3, "missedIngredientCount": 2},
                    {"id": 56}
                ]),
            ),
        ));

        let recipes = client(transport.clone())
            .search(" chicken, ,onion , garlic", "s-key")
            .await
            .unwrap();

        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].title, "Garlic Chicken");
        assert_eq!(recipes[0].missing_ingredient_count, 2);
        assert_eq!(recipes[1].title, "Untitled Recipe");
        assert_eq!(recipes[1].image_ref, PLACEHOLDER_IMAGE);

        let request = &transport.requests()[0];
        assert_eq!(request.query_value("ingredients"), Some("chicken,onion,garlic"));
        assert_eq!(request.query_value("number"), Some("5"));
        assert_eq!(request.query_value("ranking"), Some("1"));
        assert_eq!(request.query_value("apiKey"), Some("s-key"));
    }

    #[tokio::test]
    async fn test_empty_terms_skip_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let recipes = client(transport.clone()).search(" , ,", "k").await.unwrap();
        assert!(recipes.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_non_array_body_is_empty_result() {
        let transport = Arc::new(ScriptedTransport::new().push(
            "findByIngredients",
            HttpResponse::json(200, &json!({"status": "failure"})),
        ));
        let recipes = client(transport).search("eggs", "k").await.unwrap();
        assert!(recipes.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_entries_are_skipped() {
        let transport = Arc::new(ScriptedTransport::new().push(
            "findByIngredients",
            HttpResponse::json(200, &json!([{"id": "not-a-number"}, {"id": 7, "title": "Eggs"}])),
        ));
        let recipes = client(transport).search("eggs", "k").await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert!(recipes[0].is_selectable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_then_surfaces() {
        let transport = Arc::new(
            ScriptedTransport::new().always("findByIngredients", HttpResponse::new(429, "")),
        );
        let result = client(transport.clone()).search("eggs", "k").await;

        crate::assert_error_kind!(result, ErrorKind::RateLimited);
        assert_eq!(transport.request_count("findByIngredients"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_recovers_within_budget() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .push_failure("findByIngredients", "connection reset")
                .push("findByIngredients", HttpResponse::json(200, &json!([]))),
        );
        let recipes = client(transport.clone()).search("eggs", "k").await.unwrap();
        assert!(recipes.is_empty());
        assert_eq!(transport.request_count("findByIngredients"), 2);
    }

    #[tokio::test]
    async fn test_auth_rejection_is_not_retried() {
        let transport = Arc::new(
            ScriptedTransport::new().always("findByIngredients", HttpResponse::new(401, "")),
        );
        let result = client(transport.clone()).search("eggs", "k").await;

        crate::assert_error_kind!(result, ErrorKind::AuthRejected);
        assert_eq!(transport.request_count("findByIngredients"), 1);
    }

    #[tokio::test]
    async fn test_other_status_is_remote_failure() {
        let transport = Arc::new(
            ScriptedTransport::new().push("findByIngredients", HttpResponse::new(500, "oops")),
        );
        let result = client(transport.clone()).search("eggs", "k").await;
        crate::assert_error_kind!(result, ErrorKind::RemoteFailure);
        assert_eq!(transport.request_count("findByIngredients"), 1);
    }

    proptest! {
        #[test]
        fn prop_any_nonempty_term_validates(
            before in "[ ,]{0,5}",
            term in "[a-z][a-z ]{0,10}",
            after in "[ ,]{0,5}",
        ) {
            let text = format!("{before}{term}{after}");
            prop_assert!(validate_ingredients(&text).is_ok());
        }

        #[test]
        fn prop_blank_terms_never_validate(text in "[ ,\t]{0,12}") {
            prop_assert_eq!(
                validate_ingredients(&text),
                Err(Error::invalid_input(INVALID_INGREDIENTS))
            );
        }
    }
}
