use crate::recipes::Ingredient;

/// Body line used when nothing is missing.
pub const NOTHING_MISSING: &str = "(You seem to have all the ingredients!)";

const DEFAULT_TITLE: &str = "Your Recipe";

fn title_or_default(title: &str) -> &str {
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_TITLE
    } else {
        title
    }
}

/// One list line: `- amount unit name`, empty parts dropped.
pub fn render_line(ingredient: &Ingredient) -> String {
    let amount = ingredient.amount.to_string();
    let line = format!("- {} {} {}", amount, ingredient.unit, ingredient.name);
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain-text shopping list: a header naming the recipe, a blank line, then
/// one line per ingredient.
pub fn render_shopping_list(title: &str, ingredients: &[Ingredient]) -> String {
    let body = if ingredients.is_empty() {
        NOTHING_MISSING.to_string()
    } else {
        ingredients
            .iter()
            .map(render_line)
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("Shopping List for: {}\n\n{}", title_or_default(title), body)
}

/// Email subject for `title`.
pub fn subject(title: &str) -> String {
    format!("Shopping List for {}", title_or_default(title))
}
