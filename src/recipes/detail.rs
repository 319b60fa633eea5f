use serde::Deserialize;
use tracing::{debug, info, warn};

use super::diff::{missing_ingredients, RequiredIngredient};
use super::types::{MissingIngredients, SelectedRecipe};
use super::{status_error, RecipeClient};
use crate::error::{Error, ErrorKind, Result, Service};
use crate::fallback::fallback_ingredients;
use crate::retry::retry;
use crate::transport::HttpRequest;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeDetail {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extended_ingredients: Option<Vec<serde_json::Value>>,
}

fn best_title(candidates: &[Option<&str>], recipe_id: i64) -> String {
    candidates
        .iter()
        .flatten()
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Recipe ID {recipe_id}"))
}

// Only these kinds reach the caller; the rest fall back to an estimate.
fn propagates(error: &Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::RateLimited | ErrorKind::AuthRejected | ErrorKind::NotFound
    )
}

impl RecipeClient {
    /// Ingredients `recipe` needs that `have` does not cover.
    ///
    /// Fetches the recipe detail and diffs its ingredient list. When
    /// the detail has no ingredient list, or the lookup fails for any reason
    /// other than rate limiting, a rejected key or an unknown recipe, the
    /// estimated list for the recipe's title is returned instead.
    pub async fn missing_ingredients(
        &self,
        recipe: &SelectedRecipe,
        have: &[String],
        api_key: &str,
    ) -> Result<MissingIngredients> {
        if recipe.id <= 0 {
            return Err(Error::invalid_input("Invalid recipe ID provided"));
        }

        let detail = match self.fetch_detail(recipe.id, api_key).await {
            Ok(detail) => detail,
            Err(error) if propagates(&error) => return Err(error),
            Err(error) => {
                warn!(recipe_id = recipe.id, error = %error, "recipe detail unavailable, using estimate");
                let title = best_title(&[Some(recipe.title.as_str())], recipe.id);
                return Ok(MissingIngredients {
                    ingredients: fallback_ingredients(&title),
                    estimated: true,
                });
            }
        };

        let Some(entries) = detail.extended_ingredients else {
            warn!(recipe_id = recipe.id, "recipe detail lacks ingredients, using estimate");
            let title = best_title(&[detail.title.as_deref(), Some(recipe.title.as_str())], recipe.id);
            return Ok(MissingIngredients {
                ingredients: fallback_ingredients(&title),
                estimated: true,
            });
        };

        let required: Vec<RequiredIngredient> = entries
            .into_iter()
            .map(|entry| serde_json::from_value(entry).unwrap_or_default())
            .collect();
        let ingredients = missing_ingredients(&required, have);
        info!(
            recipe_id = recipe.id,
            required = required.len(),
            missing = ingredients.len(),
            "computed missing ingredients"
        );
        Ok(MissingIngredients {
            ingredients,
            estimated: false,
        })
    }

    async fn fetch_detail(&self, recipe_id: i64, api_key: &str) -> Result<RecipeDetail> {
        let url = format!("{}/recipes/{}/information", self.base_url, recipe_id);

        let response = retry(&self.policy, |attempt| {
            let request = HttpRequest::get(url.as_str())
                .query("includeNutrition", "false")
                .query("apiKey", api_key);
            debug!(url = %request.redacted(), attempt = attempt + 1, "fetching recipe detail");
            async move {
                let response = self.get(Service::RecipeDetail, request).await?;
                match status_error(Service::RecipeDetail, &response, Some(recipe_id)) {
                    Some(error) => Err(error),
                    None => Ok(response),
                }
            }
        })
        .await
        .map_err(|failure| failure.into_error())?;

        // A body that is not an object decodes to an empty detail.
        let value: serde_json::Value = response
            .json_body()
            .map_err(|e| Error::malformed(Service::RecipeDetail, e.to_string()))?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}
