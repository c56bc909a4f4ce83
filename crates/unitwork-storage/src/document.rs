//! JSON document — a ready-made work item for every storage backend.

use serde::{Deserialize, Serialize};

/// A JSON document addressed by `collection` + `id`.
///
/// As a work item: create fails if the document exists, update and delete
/// fail if it does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub id: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Document {
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            body,
        }
    }

    /// Storage key: `(collection, id)`.
    pub fn key(&self) -> (String, String) {
        (self.collection.clone(), self.id.clone())
    }

    /// `collection/id`, used in error messages and logs.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_defaults_to_null() {
        let doc: Document =
            serde_json::from_str(r#"{ "collection": "users", "id": "42" }"#).unwrap();
        assert_eq!(doc.body, serde_json::Value::Null);
        assert_eq!(doc.path(), "users/42");
    }
}
