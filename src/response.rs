//! Template substitution and response normalization helpers.
//!
//! Every answer path funnels through [`StructuredResponse`] constructors in
//! `types`; this module owns the `{var}` substitution applied to response
//! templates, either from a pattern's static `template_variables` or from
//! values an intent handler computed.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("placeholder regex is valid")
});

/// Substitute `{var}` placeholders in a single pass.
///
/// Placeholders without a matching variable are left intact rather than
/// erroring, and because values are never re-scanned the operation is
/// idempotent: filling an already-filled template changes nothing as long as
/// the variable names no longer appear.
pub fn fill_template(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match vars.get(key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
