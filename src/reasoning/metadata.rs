//! Tag extraction from reasoning text.
//!
//! The grammar is small:
//!
//! - `SELF-CHECK` (optionally followed by `:`) opens a narrative block that
//!   runs to the next blank line or to a known prompt marker
//! - `[REASONING TYPE: NAME]` where `NAME` is upper-case letters and `_`
//! - `[UNCERTAINTY: text]` and `[ERROR: text]`, text running to the first `]`
//!
//! Anything that does not match is simply absent; extraction never fails.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Self-check value when the text has no self-check block.
pub const NO_SELF_CHECK: &str = "No explicit self-check section found.";

static SELF_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)SELF-CHECK(?::|)\s*([\s\S]*?)(?:\n\n|ERROR HANDLING:|Here is the query|Please structure|\z)",
    )
    .expect("self-check pattern")
});
static REASONING_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[REASONING TYPE:\s*([A-Z_]+)\]").expect("reasoning type pattern")
});
static UNCERTAINTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[UNCERTAINTY:\s*(.*?)\]").expect("uncertainty pattern"));
static ERROR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ERROR:\s*(.*?)\]").expect("error tag pattern"));

/// Signals pulled out of one reasoning response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningMetadata {
    /// Self-check narrative, or [`NO_SELF_CHECK`].
    pub self_check: String,
    /// Distinct reasoning-type tags.
    pub reasoning_types: BTreeSet<String>,
    /// Distinct uncertainty tags joined with `"; "`; empty when none.
    pub uncertainties: String,
    /// Distinct error tags joined with `"; "`; empty when none.
    pub errors: String,
}

impl Default for ReasoningMetadata {
    fn default() -> Self {
        Self {
            self_check: NO_SELF_CHECK.to_string(),
            reasoning_types: BTreeSet::new(),
            uncertainties: String::new(),
            errors: String::new(),
        }
    }
}

impl ReasoningMetadata {
    /// True when the error tags mention `phrase`, ignoring case.
    pub fn flags(&self, phrase: &str) -> bool {
        self.errors.to_lowercase().contains(&phrase.to_lowercase())
    }
}

/// Extract all four signals from `text`.
pub fn extract_metadata(text: &str) -> ReasoningMetadata {
    let self_check = SELF_CHECK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| NO_SELF_CHECK.to_string());

    let reasoning_types = captures(&REASONING_TYPE, text)
        .map(str::to_string)
        .collect();

    ReasoningMetadata {
        self_check,
        reasoning_types,
        uncertainties: join_distinct(captures(&UNCERTAINTY, text)),
        errors: join_distinct(captures(&ERROR_TAG, text)),
    }
}

fn captures<'t>(pattern: &'static Regex, text: &'t str) -> impl Iterator<Item = &'t str> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

// Keeps first-seen order, unlike the reasoning-type set.
fn join_distinct<'t>(values: impl Iterator<Item = &'t str>) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for value in values.map(str::trim) {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "\
[REASONING TYPE: RETRIEVAL] Eggs and flour.
[REASONING TYPE: LOGICAL] Search next.
[REASONING TYPE: RETRIEVAL] Again.

SELF-CHECK:
1. Ingredients are plausible.
2. No ambiguity.

[UNCERTAINTY: Medium - flour type unknown]
[UNCERTAINTY:  Medium - flour type unknown ]
[UNCERTAINTY: Low - eggs]
[ERROR: None]";

    #[test]
    fn test_tag_patterns_compile() {
        LazyLock::force(&SELF_CHECK);
        LazyLock::force(&REASONING_TYPE);
        LazyLock::force(&UNCERTAINTY);
        LazyLock::force(&ERROR_TAG);
    }

    #[test]
    fn test_extracts_all_four_signals() {
        let meta = extract_metadata(RESPONSE);

        assert_eq!(meta.self_check, "1. Ingredients are plausible.\n2. No ambiguity.");
        assert_eq!(
            meta.reasoning_types.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["LOGICAL", "RETRIEVAL"]
        );
        assert_eq!(meta.uncertainties, "Medium - flour type unknown; Low - eggs");
        assert_eq!(meta.errors, "None");
    }

    #[test]
    fn test_absent_sections_use_defaults() {
        let meta = extract_metadata("Just make an omelette.");
        assert_eq!(meta, ReasoningMetadata::default());
        assert_eq!(meta.self_check, NO_SELF_CHECK);
    }

    #[test]
    fn test_self_check_without_colon_runs_to_end() {
        let meta = extract_metadata("self-check all good");
        assert_eq!(meta.self_check, "all good");
    }

    #[test]
    fn test_self_check_stops_at_prompt_markers() {
        let meta = extract_metadata("SELF-CHECK: fine ERROR HANDLING: ignored");
        assert_eq!(meta.self_check, "fine");
    }

    #[test]
    fn test_lowercase_reasoning_types_are_ignored() {
        let meta = extract_metadata("[REASONING TYPE: logical]");
        assert!(meta.reasoning_types.is_empty());
    }

    #[test]
    fn test_flags_ignores_case() {
        let meta = extract_metadata("[ERROR: Invalid ingredients provided: rocks]");
        assert!(meta.flags("invalid ingredients"));
        assert!(!meta.flags("invalid delivery details"));
    }
}
