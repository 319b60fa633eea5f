//! Fuzzy comparison of a recipe's ingredients against the user's.

use serde::Deserialize;

use super::types::Ingredient;

/// Ingredient entry as the detail endpoint returns it; every field may be
/// missing or null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequiredIngredient {
    /// Remote id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Quantity.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Unit.
    #[serde(default)]
    pub unit: Option<String>,
}

impl RequiredIngredient {
    /// Normalize to an [`Ingredient`], filling in defaults.
    pub fn normalize(&self) -> Ingredient {
        Ingredient {
            id: self.id.unwrap_or(0),
            name: self
                .name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or("unknown ingredient")
                .to_string(),
            amount: self.amount.unwrap_or(1.0),
            unit: self.unit.clone().unwrap_or_default(),
        }
    }
}

/// True when the user's `have` term covers the recipe's `need` name.
///
/// Both sides are compared lower-cased and trimmed. A term covers a name when
/// either contains the other, when they differ only by a trailing `s`, or when
/// they share a word longer than two characters.
pub fn covers(need: &str, have: &str) -> bool {
    let need = need.trim().to_lowercase();
    let have = have.trim().to_lowercase();
    if need.is_empty() || have.is_empty() {
        return false;
    }

    if need.contains(&have) || have.contains(&need) {
        return true;
    }
    if need.strip_suffix('s') == Some(have.as_str()) || have.strip_suffix('s') == Some(need.as_str())
    {
        return true;
    }

    // Short words like "oil" can match across unrelated items; kept as is.
    let have_words: Vec<&str> = long_words(&have).collect();
    let shared = long_words(&need).any(|word| have_words.contains(&word));
    shared
}

fn long_words(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace().filter(|w| w.chars().count() > 2)
}

/// Required ingredients none of the user's terms cover, normalized.
///
/// Entries with a blank name are never reported as missing.
pub fn missing_ingredients(required: &[RequiredIngredient], have: &[String]) -> Vec<Ingredient> {
    let have: Vec<&str> = have
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .collect();

    required
        .iter()
        .filter(|req| {
            let Some(name) = req.name.as_deref() else {
                return false;
            };
            if name.trim().is_empty() {
                return false;
            }
            !have.iter().any(|term| covers(name, term))
        })
        .map(RequiredIngredient::normalize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn req(name: &str) -> RequiredIngredient {
        RequiredIngredient {
            id: Some(1),
            name: Some(name.to_string()),
            amount: Some(2.0),
            unit: Some("cups".to_string()),
        }
    }

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substring_matches_either_way() {
        assert!(covers("chicken breast", "chicken"));
        assert!(covers("egg", "eggs, beaten"));
    }

    #[test]
    fn test_plural_matches() {
        assert!(covers("tomatoes", "tomatoe"));
        assert!(covers("carrot", "carrots"));
    }

    #[test]
    fn test_shared_long_word_matches() {
        assert!(covers("red onion", "green onion"));
        assert!(!covers("soy sauce", "fish oil"));
    }

    #[test]
    fn test_short_words_do_not_count() {
        assert!(!covers("ox tail", "ox cheek"));
    }

    #[test]
    fn test_missing_keeps_recipe_order_and_normalizes() {
        let required = vec![
            req("flour"),
            req("Chicken Thighs"),
            RequiredIngredient {
                name: Some("saffron".to_string()),
                ..Default::default()
            },
        ];

        let missing = missing_ingredients(&required, &terms(&["chicken", "  "]));

        assert_eq!(
            missing,
            vec![
                Ingredient::new(1, "flour", 2.0, "cups"),
                Ingredient::new(0, "saffron", 1.0, ""),
            ]
        );
    }

    #[test]
    fn test_blank_names_are_skipped() {
        let required = vec![
            RequiredIngredient::default(),
            RequiredIngredient {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        ];
        assert!(missing_ingredients(&required, &[]).is_empty());
    }

    #[test]
    fn test_no_user_terms_means_everything_missing() {
        let required = vec![req("salt"), req("pepper")];
        assert_eq!(missing_ingredients(&required, &[]).len(), 2);
    }

    proptest! {
        #[test]
        fn prop_matching_ignores_case(
            need in "[a-zA-Z]{1,8}( [a-zA-Z]{1,8}){0,2}",
            have in "[a-zA-Z]{1,8}( [a-zA-Z]{1,8}){0,2}",
        ) {
            let expected = covers(&need, &have);
            prop_assert_eq!(covers(&need.to_uppercase(), &have), expected);
            prop_assert_eq!(covers(&need, &have.to_lowercase()), expected);
            prop_assert_eq!(covers(&need.to_lowercase(), &have.to_uppercase()), expected);
        }

        #[test]
        fn prop_diff_ignores_case(
            names in prop::collection::vec("[a-zA-Z]{1,8}( [a-zA-Z]{1,8})?", 0..6),
            have in prop::collection::vec("[a-zA-Z]{1,8}", 0..4),
        ) {
            let required: Vec<_> = names.iter().map(|n| req(n)).collect();
            let shouted: Vec<_> = names.iter().map(|n| req(&n.to_uppercase())).collect();
            let lowered: Vec<String> = have.iter().map(|h| h.to_lowercase()).collect();

            let plain = missing_ingredients(&required, &have).len();
            prop_assert_eq!(missing_ingredients(&shouted, &lowered).len(), plain);
        }
    }
}
