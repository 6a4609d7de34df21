//! The unit of data moved between the cluster and a snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One document: its id within the collection and its source body.
///
/// The serde names match a search hit (`_id`, `_source`), so hits deserialize
/// straight into documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}
