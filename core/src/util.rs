//! Attribute normalization shared by every entity.
//!
//! # Design
//! Payloads arrive from two directions: server JSON (camelCase) and
//! caller-built literals (which may use snake_case or kebab-case keys).
//! Both are normalized at the boundary so entity code only ever looks up the
//! canonical camelCase key. Maps under `env` and `labels` are user data and
//! keep their keys verbatim.

use serde_json::{Map, Value};

use crate::connection::QueryParams;
use crate::error::{MarathonError, Result};

/// Normalized backing store of every entity.
pub type Attributes = Map<String, Value>;

/// Keys whose map values are user data and are never rewritten.
pub const OPAQUE_KEYS: &[&str] = &["env", "labels"];

/// Rewrite a snake_case or kebab-case key to camelCase.
///
/// A separator only counts as a word boundary when it sits between two
/// alphanumeric characters, so leading, trailing and doubled separators are
/// kept and the rewrite is idempotent.
pub fn canonical_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for (i, &c) in chars.iter().enumerate() {
        let is_sep = c == '_' || c == '-';
        let boundary = is_sep
            && i > 0
            && chars[i - 1].is_alphanumeric()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
        if boundary {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize keys recursively, leaving `env` and `labels` maps untouched.
pub fn normalize(value: &Value) -> Value {
    normalize_with(value, OPAQUE_KEYS)
}

/// Normalize keys recursively; a map stored under a key in `ignore` is
/// copied as-is.
pub fn normalize_with(value: &Value, ignore: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map_with(map, ignore)),
        Value::Array(items) => Value::Array(items.iter().map(|v| normalize_with(v, ignore)).collect()),
        other => other.clone(),
    }
}

pub fn normalize_map(map: &Attributes) -> Attributes {
    normalize_map_with(map, OPAQUE_KEYS)
}

/// When two spellings of one key are present (`health_checks` and
/// `healthChecks`), the canonical spelling wins and the other is dropped.
fn normalize_map_with(map: &Attributes, ignore: &[&str]) -> Attributes {
    map.iter()
        .filter_map(|(k, v)| {
            let key = canonical_key(k);
            if key != *k && map.contains_key(&key) {
                return None;
            }
            let value = if v.is_object() && ignore.contains(&key.as_str()) {
                v.clone()
            } else {
                normalize_with(v, ignore)
            };
            Some((key, value))
        })
        .collect()
}

/// Require `value` to be a JSON object and return its normalized map.
pub fn to_attributes(value: &Value, what: &str) -> Result<Attributes> {
    match value {
        Value::Object(map) => Ok(normalize_map(map)),
        _ => Err(MarathonError::Argument(format!("{what} must be a JSON object"))),
    }
}

/// Overlay `overrides` onto `defaults`. Both sides are normalized first; the
/// merge is shallow, so an override replaces a default sub-map wholesale.
pub fn merge_with_defaults(defaults: &Value, overrides: &Value) -> Result<Attributes> {
    let mut merged = to_attributes(defaults, "defaults")?;
    for (key, value) in to_attributes(overrides, "hash")? {
        merged.insert(key, value);
    }
    Ok(merged)
}

/// Return a copy of `value` without any of `keys`, at any depth.
pub fn remove_keys(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), remove_keys(v, keys)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| remove_keys(v, keys)).collect()),
        other => other.clone(),
    }
}

/// Check that `value` is one of `allowed`. A missing or null value passes
/// only when `nil_allowed`.
pub fn validate_choice(name: &str, value: Option<&Value>, allowed: &[&str], nil_allowed: bool) -> Result<()> {
    match value.filter(|v| !v.is_null()) {
        None if nil_allowed => Ok(()),
        None => Err(MarathonError::Argument(format!("{name} must not be nil"))),
        Some(v) if v.as_str().is_some_and(|s| allowed.contains(&s)) => Ok(()),
        Some(_) => {
            let mut msg = format!("{name} must be one of {allowed:?}");
            if nil_allowed {
                msg.push_str(", or nil");
            }
            Err(MarathonError::Argument(msg))
        }
    }
}

/// [`validate_choice`] applied to the field `name` of `map`.
pub fn validate_field_choice(map: &Attributes, name: &str, allowed: &[&str], nil_allowed: bool) -> Result<()> {
    validate_choice(name, map.get(name), allowed, nil_allowed)
}

/// Validate a query choice and append it when present.
pub fn add_choice(
    query: &mut QueryParams,
    name: &'static str,
    value: Option<&str>,
    allowed: &[&str],
    nil_allowed: bool,
) -> Result<()> {
    let as_value = value.map(Value::from);
    validate_choice(name, as_value.as_ref(), allowed, nil_allowed)?;
    if let Some(v) = value {
        query.push((name, Some(v.to_string())));
    }
    Ok(())
}

/// Render a value the way listings show it: strings unquoted, null empty.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn get_str<'a>(info: &'a Attributes, key: &str) -> Option<&'a str> {
    info.get(key).and_then(Value::as_str)
}

pub(crate) fn get_u64(info: &Attributes, key: &str) -> Option<u64> {
    info.get(key).and_then(Value::as_u64)
}

pub(crate) fn get_f64(info: &Attributes, key: &str) -> Option<f64> {
    info.get(key).and_then(Value::as_f64)
}

pub(crate) fn get_bool(info: &Attributes, key: &str) -> Option<bool> {
    info.get(key).and_then(Value::as_bool)
}

pub(crate) fn get_array<'a>(info: &'a Attributes, key: &str) -> &'a [Value] {
    info.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(crate) fn get_strings(info: &Attributes, key: &str) -> Vec<String> {
    get_array(info, key)
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// One-line rendering used when entities are listed.
pub trait Pretty {
    fn to_pretty_string(&self) -> String;
}

impl<T: Pretty> Pretty for Option<T> {
    fn to_pretty_string(&self) -> String {
        self.as_ref().map(Pretty::to_pretty_string).unwrap_or_default()
    }
}

/// Join the pretty renderings of `items` with `,`.
pub fn items_to_pretty<T: Pretty>(items: &[T]) -> String {
    items
        .iter()
        .map(Pretty::to_pretty_string)
        .collect::<Vec<_>>()
        .join(",")
}
