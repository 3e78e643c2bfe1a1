//! Pieces shared by all entity types.

use serde_json::Value;

use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;

/// Implements `Serialize` and `to_json` for entities whose backing store is
/// the `info` field, so serializing an entity yields exactly its normalized
/// attributes.
macro_rules! serialize_info {
    ($($ty:ty),+ $(,)?) => {$(
        impl $ty {
            /// Backing attributes as a JSON string.
            pub fn to_json(&self) -> String {
                serde_json::to_string(&self.info).unwrap_or_default()
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serde::Serialize::serialize(&self.info, serializer)
            }
        }
    )+};
}

pub(crate) use serialize_info;

/// The bound handle, or an error for entities built without one.
pub(crate) fn bound<'a>(marathon: &'a Option<Marathon>, what: &str) -> Result<&'a Marathon> {
    marathon
        .as_ref()
        .ok_or_else(|| MarathonError::Argument(format!("{what} is not bound to a Marathon instance")))
}

/// Look up an envelope key in a response body.
pub(crate) fn field<'a>(json: &'a Value, key: &str) -> Result<&'a Value> {
    json.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| MarathonError::unexpected(format!("expected '{key}' in response")))
}

/// Look up an envelope key holding an array.
pub(crate) fn list<'a>(json: &'a Value, key: &str) -> Result<&'a [Value]> {
    as_list(field(json, key)?, key)
}

pub(crate) fn as_list<'a>(json: &'a Value, what: &str) -> Result<&'a [Value]> {
    json.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| MarathonError::unexpected(format!("expected '{what}' to be an array")))
}
