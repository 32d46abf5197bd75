//! Body filters
//!
//! Body filters work on the body text together with the message's
//! `Content-Type`. Filters for a specific format leave other bodies alone, so
//! a JSON filter never rewrites a form or plain text body.

use super::{is_form, is_json, rewrite_pairs, FilterChain, REDACTED};
use serde_json::Value;
use std::sync::Arc;

/// Rewrites the body text of a message
pub trait BodyFilter: Send + Sync + 'static {
    /// Return the filtered body
    fn filter(&self, content_type: Option<&str>, body: &str) -> String;

    /// Combine with `next`, which sees this filter's output
    fn merge<N: BodyFilter>(self, next: N) -> FilterChain<dyn BodyFilter>
    where
        Self: Sized,
    {
        FilterChain::<dyn BodyFilter>::new().then(self).then(next)
    }
}

impl<F> BodyFilter for F
where
    F: Fn(Option<&str>, &str) -> String + Send + Sync + 'static,
{
    fn filter(&self, content_type: Option<&str>, body: &str) -> String {
        self(content_type, body)
    }
}

impl FilterChain<dyn BodyFilter> {
    /// Append a filter to the chain
    pub fn then(self, filter: impl BodyFilter) -> Self {
        self.then_shared(Arc::new(filter))
    }
}

impl BodyFilter for FilterChain<dyn BodyFilter> {
    fn filter(&self, content_type: Option<&str>, body: &str) -> String {
        self.iter().fold(body.to_string(), |body, filter| {
            filter.filter(content_type, &body)
        })
    }
}

/// Leaves the body unchanged
pub fn none() -> impl BodyFilter {
    |_: Option<&str>, body: &str| body.to_string()
}

/// The built-in body filters: [`access_token`] then [`oauth_request`]
pub fn default_value() -> FilterChain<dyn BodyFilter> {
    access_token().merge(oauth_request())
}

/// Masks OAuth tokens in JSON bodies
pub fn access_token() -> impl BodyFilter {
    replace_json_string_property(
        ["access_token", "refresh_token", "open_id", "id_token"],
        REDACTED,
    )
}

/// Masks OAuth credentials in form bodies
pub fn oauth_request() -> impl BodyFilter {
    replace_form_url_encoded_property(["client_secret", "password", "refresh_token"], REDACTED)
}

/// Replace the string values of the named properties in JSON bodies.
///
/// Properties are matched at any depth. A body that contains no such
/// property, or that does not parse, is returned unchanged.
pub fn replace_json_string_property<I, S>(
    names: I,
    replacement: impl Into<String>,
) -> impl BodyFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
    let replacement = replacement.into();
    move |content_type: Option<&str>, body: &str| {
        if !is_json(content_type) {
            return body.to_string();
        }
        let mut value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return body.to_string(),
        };
        if replace_strings(&mut value, &names, &replacement) {
            serde_json::to_string(&value).unwrap_or_else(|_| body.to_string())
        } else {
            body.to_string()
        }
    }
}

fn replace_strings(value: &mut Value, names: &[String], replacement: &str) -> bool {
    match value {
        Value::Object(map) => {
            let mut changed = false;
            for (key, child) in map.iter_mut() {
                match child {
                    Value::String(s) if names.contains(key) => {
                        if s.as_str() != replacement {
                            *s = replacement.to_string();
                            changed = true;
                        }
                    }
                    _ => changed |= replace_strings(child, names, replacement),
                }
            }
            changed
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| replace_strings(item, names, replacement) | changed),
        _ => false,
    }
}

/// Replace the values of the named fields in form url-encoded bodies
pub fn replace_form_url_encoded_property<I, S>(
    names: I,
    replacement: impl Into<String>,
) -> impl BodyFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
    let replacement = replacement.into();
    move |content_type: Option<&str>, body: &str| {
        if !is_form(content_type) {
            return body.to_string();
        }
        rewrite_pairs(body, |name, value| {
            Some(match value {
                Some(_) if names.iter().any(|n| n == name) => {
                    format!("{}={}", name, replacement)
                }
                Some(value) => format!("{}={}", name, value),
                None => name.to_string(),
            })
        })
    }
}

/// Cut bodies longer than `max` characters, appending `...`
pub fn truncate(max: usize) -> impl BodyFilter {
    move |_: Option<&str>, body: &str| match body.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

/// Remove insignificant whitespace from JSON bodies
pub fn compact_json() -> impl BodyFilter {
    move |content_type: Option<&str>, body: &str| {
        if !is_json(content_type) {
            return body.to_string();
        }
        serde_json::from_str::<Value>(body)
            .and_then(|value| serde_json::to_string(&value))
            .unwrap_or_else(|_| body.to_string())
    }
}

/// Indent JSON bodies for human readers
pub fn pretty_print_json() -> impl BodyFilter {
    move |content_type: Option<&str>, body: &str| {
        if !is_json(content_type) {
            return body.to_string();
        }
        serde_json::from_str::<Value>(body)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or_else(|_| body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const JSON: Option<&str> = Some("application/json");
    const FORM: Option<&str> = Some("application/x-www-form-urlencoded");

    #[test]
    fn test_access_token_in_json() {
        let body = r#"{"access_token":"s3cr3t","user":{"refresh_token":"r"},"n":1}"#;
        let filtered = access_token().filter(JSON, body);
        assert_eq!(
            filtered,
            r#"{"access_token":"XXX","user":{"refresh_token":"XXX"},"n":1}"#
        );
    }

    #[test]
    fn test_json_filter_ignores_other_content_types() {
        let body = r#"{"access_token":"s3cr3t"}"#;
        assert_eq!(access_token().filter(Some("text/plain"), body), body);
        assert_eq!(access_token().filter(None, body), body);
    }

    #[test]
    fn test_json_without_match_is_untouched() {
        let body = "{ \"name\" : \"alice\" }";
        assert_eq!(access_token().filter(JSON, body), body);
    }

    #[test]
    fn test_invalid_json_is_untouched() {
        assert_eq!(access_token().filter(JSON, "{not json"), "{not json");
    }

    #[test]
    fn test_non_string_property_is_kept() {
        let body = r#"{"access_token":42}"#;
        assert_eq!(access_token().filter(JSON, body), body);
    }

    #[test]
    fn test_oauth_form() {
        let body = "grant_type=password&username=a&password=b&client_secret=c";
        assert_eq!(
            oauth_request().filter(FORM, body),
            "grant_type=password&username=a&password=XXX&client_secret=XXX"
        );
        assert_eq!(oauth_request().filter(JSON, "password=b"), "password=b");
    }

    #[test]
    fn test_default_value_covers_both() {
        let filter = default_value();
        assert_eq!(filter.filter(FORM, "refresh_token=x"), "refresh_token=XXX");
        assert_eq!(
            filter.filter(JSON, r#"{"id_token":"x"}"#),
            r#"{"id_token":"XXX"}"#
        );
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate(3).filter(None, "héllo"), "hél...");
        assert_eq!(truncate(10).filter(None, "short"), "short");
    }

    #[test]
    fn test_compact_and_pretty_json() {
        assert_eq!(compact_json().filter(JSON, "{ \"a\" : [1, 2] }"), r#"{"a":[1,2]}"#);
        assert_eq!(pretty_print_json().filter(JSON, r#"{"a":1}"#), "{\n  \"a\": 1\n}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_json_masking_is_idempotent(
            token in "[ -~]{0,20}",
            other in "[a-z]{0,10}",
        ) {
            let body = serde_json::json!({
                "access_token": token,
                "nested": [{"refresh_token": other.clone()}],
                "other": other,
            })
            .to_string();
            let filter = default_value();
            let once = filter.filter(JSON, &body);
            prop_assert_eq!(filter.filter(JSON, &once), once);
        }
    }
}
