//! Placeholder substitution for subject and body templates.
//!
//! Templates use `{{name}}` tokens. Substitution is a single pass:
//! a substituted value is never rescanned for further placeholders, so
//! recipient data cannot inject tokens. Names are matched case-sensitively.

use std::collections::HashMap;

/// The result of rendering one template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The rendered text. Tokens without a binding are left verbatim.
    pub text: String,
    /// Placeholder names that had no binding, deduplicated, in order of
    /// first appearance.
    pub missing: Vec<String>,
}

/// Replace every `{{name}}` token in `template` with its bound value.
///
/// A token whose name has no binding is left verbatim in the output and
/// reported in [`Rendered::missing`] so the caller can downgrade the
/// record's validation verdict rather than fail the whole render.
/// An opening `{{` with no closing `}}` is copied through unchanged.
pub fn resolve(template: &str, bindings: &HashMap<String, String>) -> Rendered {
    let mut text = String::with_capacity(template.len());
    let mut missing: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        text.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find("}}") {
            Some(end) => {
                let name = &after_open[..end];
                match bindings.get(name) {
                    Some(value) => text.push_str(value),
                    None => {
                        text.push_str(&rest[start..start + 2 + end + 2]);
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.to_string());
                        }
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                // Unterminated token: keep the tail as-is.
                text.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    text.push_str(rest);
    Rendered { text, missing }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_all_bound_tokens() {
        let out = resolve(
            "Hi {{Name}}, welcome to {{City}}!",
            &bindings(&[("Name", "Ann"), ("City", "Oslo")]),
        );
        assert_eq!(out.text, "Hi Ann, welcome to Oslo!");
        assert!(out.missing.is_empty());
        assert!(!out.text.contains("{{"));
    }

    #[test]
    fn missing_binding_left_verbatim_and_reported() {
        let out = resolve("Hi {{Name}} from {{City}}", &bindings(&[("Name", "Bo")]));
        assert_eq!(out.text, "Hi Bo from {{City}}");
        assert_eq!(out.missing, vec!["City"]);
    }

    #[test]
    fn missing_reported_once() {
        let out = resolve("{{x}} and {{x}} and {{y}}", &bindings(&[]));
        assert_eq!(out.missing, vec!["x", "y"]);
    }

    #[test]
    fn names_are_case_sensitive() {
        let out = resolve("{{name}}", &bindings(&[("Name", "Ann")]));
        assert_eq!(out.text, "{{name}}");
        assert_eq!(out.missing, vec!["name"]);
    }

    #[test]
    fn substitution_is_not_recursive() {
        let out = resolve(
            "{{a}}",
            &bindings(&[("a", "{{b}}"), ("b", "nope")]),
        );
        assert_eq!(out.text, "{{b}}");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn unterminated_token_copied_through() {
        let out = resolve("Hello {{Name", &bindings(&[("Name", "Ann")]));
        assert_eq!(out.text, "Hello {{Name");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn empty_value_substitutes_empty() {
        let out = resolve("[{{gone}}]", &bindings(&[("gone", "")]));
        assert_eq!(out.text, "[]");
    }
}
