use serde::{Deserialize, Serialize};

/// Name prefix carried by every ingredient the fallback synthesizer invents.
pub const ESTIMATE_PREFIX: &str = "(Estimate) ";

/// One line of a recipe's ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Remote id; 0 for synthetic entries.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Quantity, possibly fractional.
    pub amount: f64,
    /// Unit, possibly empty.
    pub unit: String,
}

impl Ingredient {
    /// Create an ingredient from a remote lookup.
    pub fn new(id: i64, name: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            amount,
            unit: unit.into(),
        }
    }

    /// Create an estimated ingredient; the name gets the estimate prefix.
    pub fn estimate(name: &str, amount: f64, unit: &str) -> Self {
        Self::new(0, format!("{ESTIMATE_PREFIX}{name}"), amount, unit)
    }

    /// True when this entry was synthesized rather than looked up.
    pub fn is_estimate(&self) -> bool {
        self.name.starts_with(ESTIMATE_PREFIX)
    }
}

/// A search hit, as rendered on a selectable card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    /// Remote id; only positive ids can be selected.
    pub id: i64,
    /// Recipe title.
    pub title: String,
    /// Image URL or placeholder path.
    #[serde(rename = "image")]
    pub image_ref: String,
    /// How many of the user's ingredients the recipe uses.
    #[serde(rename = "usedIngredientCount")]
    pub used_ingredient_count: u32,
    /// How many ingredients the recipe needs beyond the user's.
    #[serde(rename = "missedIngredientCount")]
    pub missing_ingredient_count: u32,
}

impl RecipeSummary {
    /// True when the card carries a usable id and title.
    pub fn is_selectable(&self) -> bool {
        self.id > 0 && !self.title.trim().is_empty()
    }

    /// The selection this card produces.
    pub fn selection(&self) -> SelectedRecipe {
        SelectedRecipe {
            id: self.id,
            title: self.title.clone(),
        }
    }
}

/// The recipe the user picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedRecipe {
    /// Remote id.
    pub id: i64,
    /// Title shown to the user.
    pub title: String,
}

/// What the detail-and-diff client produced, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingIngredients {
    /// Ingredients still to buy, in recipe order.
    pub ingredients: Vec<Ingredient>,
    /// True when the list is a fallback estimate.
    pub estimated: bool,
}
