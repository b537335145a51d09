use serde_json::Value;

/// One child of a store collection read.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    /// The child's key in the store: the object key, or the raw array index
    /// (holes included) when the store answered with an array.
    pub key: String,
    pub value: Value,
}

/// Flattens a collection read into its children.
///
/// The store answers collection reads with a map keyed by child id, with an
/// array (sparse integer keys come back with `null` holes), or with `null`
/// when the path is empty. Holes and `null` children are dropped.
pub fn entries(raw: Value) -> Vec<CollectionEntry> {
    match raw {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(index, value)| CollectionEntry {
                key: index.to_string(),
                value,
            })
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(key, value)| CollectionEntry { key, value })
            .collect(),
        _ => Vec::new(),
    }
}

/// Children only, in order.
pub fn values(raw: Value) -> Vec<Value> {
    entries(raw).into_iter().map(|e| e.value).collect()
}
