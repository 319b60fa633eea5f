//! Stage-tailored instruction prompts.

use crate::session::Stage;

const PREAMBLE: &str = "\
I want you to think step-by-step about this request. First, understand what is being asked. Then, analyze the information available to you. Consider what additional information or API calls might be needed. Explain your thinking process as you go.

When responding to this query, break down the problem into components that require different types of reasoning, and for each component:
1. Identify the type of reasoning required using [REASONING TYPE: X] tags, where X can be one of:
   - ARITHMETIC: For calculations, numerical operations, unit conversions
   - RETRIEVAL: For looking up or recalling specific facts or data points
   - COMPARISON: For comparing multiple options or features
   - LOGICAL: For deductive or inductive reasoning, if-then statements
   - CAUSAL: For cause-and-effect analysis
   - ANALOGICAL: For drawing parallels or applying knowledge from similar situations
   - CREATIVE: For generating new ideas or solutions
   - SOCIAL: For understanding user intentions, preferences, or communication
2. Apply that reasoning type explicitly
3. Explain your conclusion from that reasoning step

Explicitly use these tags throughout your analysis to make your reasoning transparent.

IMPORTANT: When you are uncertain about something, explicitly state your uncertainty using [UNCERTAINTY: X] tags, where X describes what you're uncertain about and your confidence level (low/medium/high). For example: [UNCERTAINTY: I'm moderately confident these are common cooking ingredients, but 'szechuan peppercorns' might be specialized].

If you encounter information that's critical but missing, or if you can't determine something with confidence, use [ERROR: X] tags to flag this, where X describes the issue. For example: [ERROR: Cannot determine ingredient quantities from the provided information].";

const SELF_CHECK_INTRO: &str =
    "IMPORTANT: After your initial analysis, please perform a SELF-CHECK with these verification steps:";

const SELF_CHECK_OUTRO: &str = "Explicitly mark this section as \"SELF-CHECK\" and highlight any errors or adjustments needed before proceeding.";

const FIND_CHECKS: &str = "\
1. Verify that you've correctly identified all the ingredients provided. Are they plausible cooking ingredients?
2. Check if there are ambiguous ingredient names that might need clarification (e.g., 'apple' - what kind?).
3. Confirm that searching for recipes with these ingredients is an appropriate action.
4. Validate that the Spoonacular API (recipe search by ingredients) is the right tool for this query.";

const FIND_ERRORS: &str = "\
- If ingredients appear invalid or unclear (e.g., non-food items, gibberish), flag this with [ERROR: Invalid ingredients provided: X] and suggest clarifications.
- If you believe some ingredients might not be found in standard recipe databases, mark with [UNCERTAINTY: Ingredient X might be too niche].
- If the intended tool (Spoonacular API) is known to be unavailable/failing, state this [ERROR: Spoonacular tool unavailable]. If tool access fails during execution, be prepared to provide general recipe suggestions based on common combinations of the ingredients provided.
- If the tool call succeeds but returns no results, suggest adding more common ingredients to the list or checking spelling.";

const DETAIL_CHECKS: &str = "\
1. Verify you have correctly identified the selected recipe title and ID from the previous step/context.
2. Confirm you have the list of user's available ingredients from the previous step/context.
3. Validate that the next logical step is to get the selected recipe's *required* ingredients.
4. Check that comparing required and available ingredients is the appropriate action for determining missing items.
5. Verify the Spoonacular API (get recipe information by ID) is the right tool for retrieving recipe details.";

const DETAIL_ERRORS: &str = "\
- If the recipe ID seems invalid or missing from context, flag with [ERROR: Recipe ID missing or invalid] and suggest reselecting a recipe.
- If the user's available ingredients list is missing, flag with [ERROR: User ingredients list missing].
- If unable to retrieve full recipe details via the tool, mark with [ERROR: Failed to retrieve recipe details for ID X] and fall back to using whatever partial information is available or generating fallback ingredients based on title.
- If uncertain about ingredient matching logic (e.g., \"onion\" vs \"red onion\"), mark with [UNCERTAINTY: Matching X vs Y might be imprecise] and use your best judgment.
- If the API call fails entirely after retries, provide general guidance on common ingredients needed for this type of recipe (use ANALOGICAL reasoning).";

const SEND_CHECKS: &str = "\
1. Verify you have correctly identified the intended delivery method (email or Telegram) from context.
2. Confirm you have valid-looking delivery details (email address format or numeric chat ID) from context.
3. Check that you have the list of missing ingredients (or confirmation of none missing) from the previous step/context.
4. Validate that the selected recipe title is correctly carried over for context in the message.
5. Verify the appropriate API tool (SendGrid or Telegram) is being selected based on the delivery method.";

const SEND_ERRORS: &str = "\
- If delivery details appear invalid (malformed email, non-numeric chat ID), flag with [ERROR: Invalid delivery details: X].
- If the missing ingredients list is missing from context, flag with [ERROR: Missing ingredients list unavailable].
- If the missing ingredients list is empty, confirm this is okay and the message should reflect that.
- If the delivery API tool call fails after retries, mark with [ERROR: Failed to send via X API] and inform the user the list could not be sent.
- If uncertain about ingredient measurements or details in the list, mark with [UNCERTAINTY: Details for ingredient X are estimates] and provide your best estimate.";

const CLOSING: &str = "Please structure your response with clearly labeled reasoning types using [REASONING TYPE: X] tags, include your SELF-CHECK section, flag any uncertainties with [UNCERTAINTY: X] tags, mark any errors with [ERROR: X] tags, and then conclude with the most helpful answer or action plan.";

/// Build the full prompt sent to the model for `query` at `stage`.
///
/// Layout: the tag grammar, stage-specific self-check steps and error
/// handling rules, the query itself, then a reminder of the response shape.
pub fn build_prompt(query: &str, stage: Stage) -> String {
    let (checks, errors) = match stage {
        Stage::FindRecipes => (FIND_CHECKS, FIND_ERRORS),
        Stage::MissingIngredients => (DETAIL_CHECKS, DETAIL_ERRORS),
        Stage::SendList => (SEND_CHECKS, SEND_ERRORS),
    };

    format!(
        "{PREAMBLE}\n\n\
         {SELF_CHECK_INTRO}\n{checks}\n\n\
         {SELF_CHECK_OUTRO}\n\n\
         ERROR HANDLING:\n{errors}\n\n\
         Here is the query/context to respond to:\n{query}\n\n\
         {CLOSING}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_query_before_closing() {
        let prompt = build_prompt("I have eggs. What can I make?", Stage::FindRecipes);
        let query_at = prompt.find("I have eggs.").unwrap();
        let closing_at = prompt.find("Please structure your response").unwrap();
        assert!(query_at < closing_at);
        assert!(prompt.starts_with("I want you to think step-by-step"));
    }

    #[test]
    fn test_each_stage_names_its_blocking_tag() {
        assert!(build_prompt("q", Stage::FindRecipes)
            .contains("[ERROR: Invalid ingredients provided: X]"));
        assert!(build_prompt("q", Stage::MissingIngredients)
            .contains("[ERROR: Recipe ID missing or invalid]"));
        assert!(build_prompt("q", Stage::SendList)
            .contains("[ERROR: Invalid delivery details: X]"));
    }

    #[test]
    fn test_stage_sections_do_not_leak() {
        let prompt = build_prompt("q", Stage::SendList);
        assert!(!prompt.contains("Spoonacular API (recipe search by ingredients)"));
    }
}
