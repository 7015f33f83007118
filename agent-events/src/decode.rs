//! Lenient decoding helpers for payloads produced by the host.
//!
//! The host encodes absent strings, lists and maps as JSON `null`. Fields
//! using these helpers decode `null` the same way as a missing key.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Deserializer};

/// Decode `null` as `T::default()`.
///
/// Use together with `#[serde(default)]` so a missing key behaves the same.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a map whose values may be `null`, replacing them with defaults.
///
/// A `null` map decodes as an empty map.
pub fn null_values_as_default<'de, D, K, V>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Eq + Hash + Deserialize<'de>,
    V: Default + Deserialize<'de>,
{
    let map: Option<HashMap<K, Option<V>>> = Option::deserialize(deserializer)?;
    Ok(map
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.unwrap_or_default()))
        .collect())
}
