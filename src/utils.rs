use std::collections::HashMap;

use zbus::zvariant::{self, OwnedValue, Str, Value};

/// Cached `a{sv}` property snapshot of one interface
pub type PropertyMap = HashMap<String, OwnedValue>;

#[must_use]
/// Converts a [`Value`] into [`Str`], or return [`None`] if it's not `str`.
pub const fn extract_str<'a, 'b>(v: &'a Value<'b>) -> Option<&'a Str<'b>> {
    if let Value::Str(v) = v {
        Some(v)
    } else {
        None
    }
}

#[must_use]
/// Converts a [`Value`] into [`i64`], or return [`None`] if it's not `x`.
pub const fn extract_i64(v: &Value<'_>) -> Option<i64> {
    if let Value::I64(v) = v {
        Some(*v)
    } else {
        None
    }
}

/// Borrow a snapshot in the shape a `PropertiesChanged` body expects.
pub fn property_refs(properties: &PropertyMap) -> HashMap<&str, &Value<'_>> {
    properties
        .iter()
        .map(|(k, v)| (k.as_str(), &**v))
        .collect()
}

/// Deep-copy a snapshot. Only values carrying file descriptors can fail to copy.
pub fn try_clone_properties(properties: &PropertyMap) -> zvariant::Result<PropertyMap> {
    properties
        .iter()
        .map(|(k, v)| Ok((k.clone(), v.try_clone()?)))
        .collect()
}
