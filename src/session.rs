//! Per-run conversation state threaded through the workflow steps.
//!
//! A [`SessionState`] is owned by whoever drives the workflow and passed by
//! `&mut` into each step. Starting over builds a new value with a new id
//! instead of clearing the old one, so a caller holding a stale session can
//! tell its results apart from the fresh run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reasoning::{ReasoningMetadata, ReasoningSource};
use crate::recipes::{Ingredient, SelectedRecipe};

/// One of the three narrated round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Stage 1: search recipes for the user's ingredients.
    FindRecipes,
    /// Stage 2: work out which ingredients the chosen recipe still needs.
    MissingIngredients,
    /// Stage 3: send the shopping list.
    SendList,
}

impl Stage {
    /// All stages in workflow order.
    pub const ALL: [Stage; 3] = [Stage::FindRecipes, Stage::MissingIngredients, Stage::SendList];

    /// 1-based stage number.
    pub fn index(self) -> u8 {
        match self {
            Stage::FindRecipes => 1,
            Stage::MissingIngredients => 2,
            Stage::SendList => 3,
        }
    }

    /// Stage for a 1-based number.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Stage::FindRecipes),
            2 => Some(Stage::MissingIngredients),
            3 => Some(Stage::SendList),
            _ => None,
        }
    }

    /// Prefix for blocking messages that have no dedicated text.
    pub fn failure_prefix(self) -> &'static str {
        match self {
            Stage::FindRecipes => "Error finding recipes",
            Stage::MissingIngredients => "Error getting recipe details",
            Stage::SendList => "Error sending list",
        }
    }

    fn slot(self) -> usize {
        usize::from(self.index() - 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.index())
    }
}

/// Everything recorded about one stage's round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Query text handed to the reasoning client.
    pub query: String,
    /// Reasoning text received (or synthesized).
    pub reasoning: String,
    /// Tags and self-check extracted from `reasoning`.
    pub metadata: ReasoningMetadata,
    /// Where `reasoning` came from; `None` until the stage has run.
    pub source: Option<ReasoningSource>,
    /// Failed reasoning attempts since the last success.
    pub retry_count: u32,
    /// Description of the remote call the stage made.
    pub tool_call: String,
    /// Result of that call, serialized for the next stage's context.
    pub tool_result: String,
}

/// State of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    id: u64,
    /// Ingredients text exactly as entered.
    pub raw_ingredients: String,
    /// Cleaned, non-empty ingredient terms from `raw_ingredients`.
    pub ingredient_terms: Vec<String>,
    /// Recipe chosen in step 2.
    pub selected_recipe: Option<SelectedRecipe>,
    /// Ingredients the selected recipe needs beyond the user's.
    pub missing_ingredients: Vec<Ingredient>,
    stages: [StageRecord; 3],
    /// Outcome of the last delivery attempt.
    pub final_result: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Fresh session with a random id.
    pub fn new() -> Self {
        Self {
            id: rand::random(),
            raw_ingredients: String::new(),
            ingredient_terms: Vec::new(),
            selected_recipe: None,
            missing_ingredients: Vec::new(),
            stages: Default::default(),
            final_result: String::new(),
        }
    }

    /// Session identifier; differs between a session and its restart.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Discard this run and begin a new one.
    pub fn start_over(&self) -> Self {
        let mut fresh = Self::new();
        while fresh.id == self.id {
            fresh.id = rand::random();
        }
        fresh
    }

    /// Record of `stage`.
    pub fn stage(&self, stage: Stage) -> &StageRecord {
        &self.stages[stage.slot()]
    }

    /// Mutable record of `stage`.
    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageRecord {
        &mut self.stages[stage.slot()]
    }

    /// Stage 1 query.
    pub fn find_query(text: &str) -> String {
        format!("I have {text}. What can I make?")
    }

    /// Stage 2 query, embedding stage 1's full context.
    pub fn selection_query(&self, recipe: &SelectedRecipe) -> String {
        let first = self.stage(Stage::FindRecipes);
        let found = if first.tool_result.chars().count() > 2 {
            format!("{}...", truncate_chars(&first.tool_result, 100))
        } else {
            first.tool_result.clone()
        };

        format!(
            "Previous context:\n\
             Query1: {}\n\
             LLM Response1: {}\n\
             Self-Check1: {}\n\
             Errors1: {}\n\
             Uncertainty1: {}\n\
             Tool Call1: {}\n\
             Tool Result1: (Recipes found: {})\n\n\
             Current Action: User selected recipe: {} (ID: {}). Determine missing ingredients.",
            first.query,
            first.reasoning,
            first.metadata.self_check,
            first.metadata.errors,
            first.metadata.uncertainties,
            first.tool_call,
            found,
            recipe.title,
            recipe.id,
        )
    }

    /// Stage 3 query, embedding a summary of stages 1 and 2.
    pub fn delivery_query(
        &self,
        recipe: &SelectedRecipe,
        method_label: &str,
        destination: &str,
    ) -> String {
        let first = self.stage(Stage::FindRecipes);
        let second = self.stage(Stage::MissingIngredients);

        format!(
            "Previous context:\n\
             Query1: {}\n\
             LLM1: {}...\n\
             Tool1: {}\n\
             Query2: User selected recipe: {} (ID: {})\n\
             LLM2: {}...\n\
             Tool2 (Missing Ingredients): {}\n\
             Self-Check2: {}\n\
             Errors2: {}\n\
             Uncertainty2: {}\n\n\
             Current Action: Send the missing ingredients list for {} via {} to {}.",
            first.query,
            truncate_chars(&first.reasoning, 100),
            summarize(&first.tool_result, 200),
            recipe.title,
            recipe.id,
            truncate_chars(&second.reasoning, 100),
            summarize(&second.tool_result, 200),
            second.metadata.self_check,
            second.metadata.errors,
            second.metadata.uncertainties,
            recipe.title,
            method_label,
            destination,
        )
    }
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn summarize(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", truncate_chars(text, max))
    } else {
        text.to_string()
    }
}
