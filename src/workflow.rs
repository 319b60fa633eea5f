//! The workflow coordinator: three steps, each one reasoning narration plus
//! one remote call.
//!
//! A step either returns a [`StepReport`] (its value plus any non-blocking
//! advisories) or a terminal [`Error`] whose
//! [`user_message`](Error::user_message) is the single blocking message for
//! that step. State written before the failure stays in the session, so the
//! step can be retried without repeating earlier ones.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Credential, CredentialSet, Settings};
use crate::delivery::{validate_destination, DeliveryClient, DeliveryMethod};
use crate::error::{Error, Result, INVALID_RECIPE_SELECTION};
use crate::reasoning::{ReasoningClient, ReasoningOutcome, ReasoningSource};
use crate::recipes::{validate_ingredients, Ingredient, RecipeClient, RecipeSummary, SelectedRecipe};
use crate::session::{SessionState, Stage};
use crate::store::ConfigStore;
use crate::transport::Transport;

/// Message for [`Advisory::NoRecipesFound`].
pub const NO_RECIPES_FOUND: &str =
    "No recipes found with these ingredients. Try adding more common ingredients or check spelling.";
/// Message for [`Advisory::ReasoningFallback`].
pub const REASONING_FALLBACK: &str =
    "Unable to process your request via AI at this time. Using fallback logic.";
/// Prefix of [`Advisory::ModelUncertainty`] messages.
pub const UNCERTAIN_RESPONSE: &str =
    "AI Analysis Note: I'm not entirely certain about this information.";
/// Message for [`Advisory::EstimatedIngredients`].
pub const ESTIMATED_INGREDIENTS: &str = "Could not get exact ingredients, using estimate.";

/// A non-blocking message attached to a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The search returned nothing.
    NoRecipesFound,
    /// The reasoning service failed and synthesized text was used.
    ReasoningFallback,
    /// The model reported errors that do not block the step.
    ModelWarning(String),
    /// The model reported uncertainty.
    ModelUncertainty(String),
    /// The ingredient list is an estimate.
    EstimatedIngredients,
}

impl Advisory {
    /// Text shown to the user.
    pub fn message(&self) -> String {
        match self {
            Advisory::NoRecipesFound => NO_RECIPES_FOUND.to_string(),
            Advisory::ReasoningFallback => REASONING_FALLBACK.to_string(),
            Advisory::ModelWarning(errors) => format!("AI Analysis Warning: {errors}"),
            Advisory::ModelUncertainty(uncertainties) => {
                format!("{UNCERTAIN_RESPONSE} {uncertainties}")
            }
            Advisory::EstimatedIngredients => ESTIMATED_INGREDIENTS.to_string(),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Value of a completed step plus its advisories.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport<T> {
    /// What the step produced.
    pub value: T,
    /// Non-blocking messages, in the order they arose.
    pub advisories: Vec<Advisory>,
}

impl<T> StepReport<T> {
    /// Report with no advisories.
    pub fn new(value: T) -> Self {
        Self {
            value,
            advisories: Vec::new(),
        }
    }

    /// Append an advisory.
    pub fn with_advisory(mut self, advisory: Advisory) -> Self {
        self.advisories.push(advisory);
        self
    }

    fn with_advisories(mut self, advisories: Vec<Advisory>) -> Self {
        self.advisories.extend(advisories);
        self
    }
}

/// Error-tag phrase that halts each stage.
fn blocking_phrase(stage: Stage) -> &'static str {
    match stage {
        Stage::FindRecipes => "invalid ingredients",
        Stage::MissingIngredients => "invalid recipe id",
        Stage::SendList => "invalid delivery details",
    }
}

/// Turn a narration into advisories, or the blocking error its tags call for.
fn review_narration(stage: Stage, outcome: &ReasoningOutcome) -> Result<Vec<Advisory>> {
    let metadata = &outcome.metadata;
    if metadata.flags(blocking_phrase(stage)) {
        warn!(stage = stage.index(), errors = %metadata.errors, "model flagged blocking issue");
        return Err(Error::ModelFlaggedIssue {
            stage,
            issue: metadata.errors.clone(),
        });
    }

    let advisories = match outcome.source {
        ReasoningSource::Model => {
            let mut advisories = Vec::new();
            if !metadata.errors.is_empty() {
                advisories.push(Advisory::ModelWarning(metadata.errors.clone()));
            }
            if !metadata.uncertainties.is_empty() {
                debug!(stage = stage.index(), uncertainties = %metadata.uncertainties, "model uncertainty");
                advisories.push(Advisory::ModelUncertainty(metadata.uncertainties.clone()));
            }
            advisories
        }
        ReasoningSource::FallbackAfterFailure => vec![Advisory::ReasoningFallback],
        ReasoningSource::FallbackNoKey => Vec::new(),
    };
    Ok(advisories)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Sequences the workflow steps over a caller-owned [`SessionState`].
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn ConfigStore>,
    reasoning: ReasoningClient,
    recipes: RecipeClient,
    delivery: DeliveryClient,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("reasoning", &self.reasoning)
            .field("recipes", &self.recipes)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build the coordinator and its clients over one transport.
    pub fn new(settings: Settings, transport: Arc<dyn Transport>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            reasoning: ReasoningClient::new(transport.clone(), &settings),
            recipes: RecipeClient::new(transport.clone(), &settings),
            delivery: DeliveryClient::new(transport, &settings),
        }
    }

    /// Step 1: search recipes for the entered ingredients.
    pub async fn find_recipes(
        &self,
        session: &mut SessionState,
        text: &str,
    ) -> Result<StepReport<Vec<RecipeSummary>>> {
        let terms = validate_ingredients(text)?;
        let stage = Stage::FindRecipes;
        info!(session = session.id(), stage = stage.index(), terms = terms.len(), "finding recipes");

        session.raw_ingredients = text.to_string();
        session.ingredient_terms = terms;
        let query = SessionState::find_query(text);

        let credentials = self.store.credentials()?;
        let api_key = credentials.require(Credential::Recipes)?;

        let outcome = self
            .reasoning
            .narrate_into(session.stage_mut(stage), query, stage, credentials.get(Credential::Reasoning))
            .await;
        let advisories = review_narration(stage, &outcome)?;

        session.stage_mut(stage).tool_call =
            format!("Calling Spoonacular API (findByIngredients) with: {text}");
        let recipes = self.recipes.search(text, api_key).await?;
        session.stage_mut(stage).tool_result = to_json(&recipes);

        info!(session = session.id(), found = recipes.len(), "recipes found");
        let mut report = StepReport::new(recipes).with_advisories(advisories);
        if report.value.is_empty() {
            report = report.with_advisory(Advisory::NoRecipesFound);
        }
        Ok(report)
    }

    /// Step 2: pick a recipe and work out what is missing for it.
    pub async fn select_recipe(
        &self,
        session: &mut SessionState,
        recipe_id: i64,
        title: &str,
    ) -> Result<StepReport<Vec<Ingredient>>> {
        if recipe_id <= 0 || title.trim().is_empty() {
            return Err(Error::invalid_input(INVALID_RECIPE_SELECTION));
        }
        let stage = Stage::MissingIngredients;
        let recipe = SelectedRecipe {
            id: recipe_id,
            title: title.trim().to_string(),
        };
        info!(session = session.id(), stage = stage.index(), recipe_id, "recipe selected");

        let query = session.selection_query(&recipe);

        let credentials = self.store.credentials()?;
        let api_key = credentials.require(Credential::Recipes)?;

        let outcome = self
            .reasoning
            .narrate_into(session.stage_mut(stage), query, stage, credentials.get(Credential::Reasoning))
            .await;
        let advisories = review_narration(stage, &outcome)?;

        session.stage_mut(stage).tool_call =
            format!("Calling Spoonacular API (getRecipeInformation) for ID: {recipe_id}");
        let missing = self
            .recipes
            .missing_ingredients(&recipe, &session.ingredient_terms, api_key)
            .await?;
        session.stage_mut(stage).tool_result = to_json(&missing.ingredients);
        // Selection and list change together; a failed lookup keeps both.
        session.selected_recipe = Some(recipe);
        session.missing_ingredients = missing.ingredients.clone();

        info!(
            session = session.id(),
            missing = missing.ingredients.len(),
            estimated = missing.estimated,
            "missing ingredients computed"
        );
        let mut report = StepReport::new(missing.ingredients).with_advisories(advisories);
        if missing.estimated {
            report = report.with_advisory(Advisory::EstimatedIngredients);
        }
        Ok(report)
    }

    /// Step 3: deliver the missing-ingredient list.
    ///
    /// Failures after the destination and credential checks are recorded in
    /// the stage's tool result and the session's final result.
    pub async fn send_list(
        &self,
        session: &mut SessionState,
        method: DeliveryMethod,
        destination: &str,
    ) -> Result<StepReport<String>> {
        let destination = validate_destination(method, destination)?;
        let recipe = session
            .selected_recipe
            .clone()
            .ok_or_else(|| Error::invalid_input(INVALID_RECIPE_SELECTION))?;
        let stage = Stage::SendList;
        info!(session = session.id(), stage = stage.index(), method = %method, "sending list");

        let query = session.delivery_query(&recipe, method.label(), destination);
        let credentials = self.store.credentials()?;
        let api_key = credentials.require(method.credential())?;

        match self
            .deliver(session, &recipe, method, destination, query, &credentials, api_key)
            .await
        {
            Ok(report) => {
                session.stage_mut(stage).tool_result = report.value.clone();
                session.final_result = report.value.clone();
                if let Err(error) = self.store.save_last_conversation(session) {
                    warn!(session = session.id(), error = %error, "could not archive conversation");
                }
                info!(session = session.id(), "workflow complete");
                Ok(report)
            }
            Err(error) => {
                warn!(session = session.id(), error = %error, "sending list failed");
                session.stage_mut(stage).tool_result = format!("Error: {error}");
                session.final_result = format!("Failed: {error}");
                Err(error)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn deliver(
        &self,
        session: &mut SessionState,
        recipe: &SelectedRecipe,
        method: DeliveryMethod,
        destination: &str,
        query: String,
        credentials: &CredentialSet,
        api_key: &str,
    ) -> Result<StepReport<String>> {
        let stage = Stage::SendList;
        let outcome = self
            .reasoning
            .narrate_into(session.stage_mut(stage), query, stage, credentials.get(Credential::Reasoning))
            .await;
        let advisories = review_narration(stage, &outcome)?;

        let service = match method {
            DeliveryMethod::Chat => "Telegram API",
            DeliveryMethod::Email => "SendGrid API",
        };
        session.stage_mut(stage).tool_call = format!(
            "Calling {service} to send list for \"{}\" to {destination}",
            recipe.title
        );

        let confirmation = self
            .delivery
            .send(method, destination, &recipe.title, &session.missing_ingredients, api_key)
            .await?;
        Ok(StepReport::new(confirmation).with_advisories(advisories))
    }

    /// Abandon `session` and return a fresh one.
    pub fn start_over(&self, session: &SessionState) -> SessionState {
        let fresh = session.start_over();
        info!(previous = session.id(), session = fresh.id(), "starting over");
        fresh
    }

    /// Trim and store credentials.
    pub fn save_credentials(&self, credentials: CredentialSet) -> Result<()> {
        self.store.save_credentials(&credentials.normalized())?;
        info!("credentials saved");
        Ok(())
    }

    /// The archived conversation from the last completed run.
    pub fn last_conversation(&self) -> Result<Option<SessionState>> {
        self.store.last_conversation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedTransport;
    use crate::transport::HttpResponse;
    use serde_json::json;
    use tracing_test::traced_test;

    fn keys() -> CredentialSet {
        CredentialSet::new()
            .with(Credential::Recipes, "sp")
            .with(Credential::ChatBot, "123:abc")
            .with(Credential::Email, "sg")
    }

    fn coordinator(transport: Arc<ScriptedTransport>, store: Arc<MemoryStore>) -> Coordinator {
        Coordinator::new(Settings::default(), transport, store)
    }

    fn model_says(text: &str) -> HttpResponse {
        HttpResponse::json(
            200,
            &json!({"candidates": [{"content": {"parts": [{"text": text}]}, "finishReason": "STOP"}]}),
        )
    }

    #[tokio::test]
    async fn test_invalid_ingredients_block_before_any_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::with_credentials(keys()));
        let mut session = SessionState::new();

        let result = coordinator(transport.clone(), store)
            .find_recipes(&mut session, " , ,")
            .await;

        crate::assert_error_kind!(result, ErrorKind::InvalidInput);
        assert!(transport.requests().is_empty());
        assert_eq!(session.raw_ingredients, "");
    }

    #[tokio::test]
    async fn test_missing_recipe_key_blocks_step() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::new());
        let mut session = SessionState::new();

        let result = coordinator(transport, store)
            .find_recipes(&mut session, "eggs")
            .await;
        assert_eq!(result, Err(Error::MissingCredential(Credential::Recipes)));
    }

    #[tokio::test]
    async fn test_empty_search_adds_advisory() {
        let transport = Arc::new(
            ScriptedTransport::new().push("findByIngredients", HttpResponse::json(200, &json!([]))),
        );
        let store = Arc::new(MemoryStore::with_credentials(keys()));
        let mut session = SessionState::new();

        let report = coordinator(transport, store)
            .find_recipes(&mut session, "saffron")
            .await
            .unwrap();

        assert!(report.value.is_empty());
        crate::assert_advisory!(report, Advisory::NoRecipesFound);
        assert_eq!(
            session.stage(Stage::FindRecipes).tool_call,
            "Calling Spoonacular API (findByIngredients) with: saffron"
        );
        assert_eq!(session.stage(Stage::FindRecipes).tool_result, "[]");
        assert_eq!(
            session.stage(Stage::FindRecipes).source,
            Some(ReasoningSource::FallbackNoKey)
        );
    }

    #[tokio::test]
    async fn test_model_flag_blocks_search() {
        let transport = Arc::new(ScriptedTransport::new().push(
            "generateContent",
            model_says("SELF-CHECK: looked.\n\n[ERROR: Invalid ingredients: 'xyzzy' is not food]"),
        ));
        let store = Arc::new(MemoryStore::with_credentials(
            keys().with(Credential::Reasoning, "gm"),
        ));
        let mut session = SessionState::new();

        let result = coordinator(transport.clone(), store)
            .find_recipes(&mut session, "xyzzy")
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ModelFlaggedIssue);
        assert_eq!(
            error.user_message(Stage::FindRecipes),
            "AI flagged issue: Invalid ingredients: 'xyzzy' is not food. Please check your input."
        );
        assert_eq!(transport.request_count("findByIngredients"), 0);
    }

    #[tokio::test]
    async fn test_model_warnings_do_not_block() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .push(
                    "generateContent",
                    model_says("[UNCERTAINTY: low confidence on 'ramps'] [ERROR: spelling of tomatos]"),
                )
                .push(
                    "findByIngredients",
                    HttpResponse::json(200, &json!([{"id": 9, "title": "Salsa"}])),
                ),
        );
        let store = Arc::new(MemoryStore::with_credentials(
            keys().with(Credential::Reasoning, "gm"),
        ));
        let mut session = SessionState::new();

        let report = coordinator(transport, store)
            .find_recipes(&mut session, "tomatos, ramps")
            .await
            .unwrap();

        assert_eq!(report.value.len(), 1);
        assert_eq!(
            report.advisories,
            vec![
                Advisory::ModelWarning("spelling of tomatos".to_string()),
                Advisory::ModelUncertainty("low confidence on 'ramps'".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_selection_is_validated() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::with_credentials(keys()));
        let coordinator = coordinator(transport, store);
        let mut session = SessionState::new();

        for (id, title) in [(0, "Soup"), (-3, "Soup"), (4, "  ")] {
            assert_eq!(
                coordinator.select_recipe(&mut session, id, title).await,
                Err(Error::invalid_input(INVALID_RECIPE_SELECTION))
            );
        }
        assert_eq!(session.selected_recipe, None);
    }

    #[tokio::test]
    async fn test_send_without_selection_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::with_credentials(keys()));
        let mut session = SessionState::new();

        let result = coordinator(transport, store)
            .send_list(&mut session, DeliveryMethod::Chat, "42")
            .await;
        crate::assert_error_kind!(result, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_recorded() {
        let transport = Arc::new(ScriptedTransport::new().push(
            "sendMessage",
            HttpResponse::json(403, &json!({"description": "Forbidden: bot was blocked by the user"})),
        ));
        let store = Arc::new(MemoryStore::with_credentials(keys()));
        let mut session = SessionState::new();
        session.selected_recipe = Some(SelectedRecipe {
            id: 5,
            title: "Soup".to_string(),
        });

        let error = coordinator(transport, store.clone())
            .send_list(&mut session, DeliveryMethod::Chat, "42")
            .await
            .unwrap_err();

        assert_eq!(
            error.user_message(Stage::SendList),
            "Telegram Error: Bot blocked by user."
        );
        let record = session.stage(Stage::SendList);
        assert_eq!(record.tool_call, "Calling Telegram API to send list for \"Soup\" to 42");
        assert_eq!(record.tool_result, "Error: Telegram Error: Bot blocked by user.");
        assert_eq!(session.final_result, "Failed: Telegram Error: Bot blocked by user.");
        assert_eq!(store.last_conversation().unwrap(), None);
    }

    #[tokio::test]
    async fn test_successful_send_archives_session() {
        let transport = Arc::new(
            ScriptedTransport::new().push("sendMessage", HttpResponse::json(200, &json!({"ok": true}))),
        );
        let store = Arc::new(MemoryStore::with_credentials(keys()));
        let mut session = SessionState::new();
        session.selected_recipe = Some(SelectedRecipe {
            id: 5,
            title: "Soup".to_string(),
        });

        let report = coordinator(transport, store.clone())
            .send_list(&mut session, DeliveryMethod::Chat, " -100123 ")
            .await
            .unwrap();

        assert_eq!(report.value, "Shopping list sent successfully via Telegram!");
        assert_eq!(session.final_result, report.value);
        assert_eq!(store.last_conversation().unwrap(), Some(session));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_rejected_reasoning_key_falls_back_and_logs() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .push("generateContent", HttpResponse::new(401, "{}"))
                .push("findByIngredients", HttpResponse::json(200, &json!([]))),
        );
        let store = Arc::new(MemoryStore::with_credentials(
            keys().with(Credential::Reasoning, "bad"),
        ));
        let mut session = SessionState::new();

        let report = coordinator(transport.clone(), store)
            .find_recipes(&mut session, "eggs")
            .await
            .unwrap();

        crate::assert_advisory!(report, Advisory::ReasoningFallback);
        assert_eq!(transport.request_count("generateContent"), 1);
        assert_eq!(session.stage(Stage::FindRecipes).retry_count, 1);
        assert!(logs_contain("reasoning unavailable, using fallback"));
        assert!(logs_contain("recipes found"));
        assert!(!logs_contain("key=bad"));
    }

    #[test]
    fn test_saved_credentials_are_read_by_next_step() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(transport, store.clone());

        coordinator
            .save_credentials(CredentialSet::new().with(Credential::Email, " sg "))
            .unwrap();
        assert_eq!(store.credentials().unwrap().get(Credential::Email), Some("sg"));
    }

    #[test]
    fn test_start_over_changes_id() {
        let coordinator = coordinator(Arc::new(ScriptedTransport::new()), Arc::new(MemoryStore::new()));
        let mut session = SessionState::new();
        session.raw_ingredients = "eggs".to_string();

        let fresh = coordinator.start_over(&session);
        assert_ne!(fresh.id(), session.id());
        assert_eq!(fresh.raw_ingredients, "");
    }
}
