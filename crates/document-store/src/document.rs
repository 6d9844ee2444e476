use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::DocumentId;

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A document that has never been written is at version 0. The first insert
/// stores version 1 and every later update increments it by exactly 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a document not yet stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) assigned by the first insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored document together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// Document id, unique within its collection.
    pub id: DocumentId,

    /// Collection the document belongs to (e.g. "orders", "pharmacies").
    pub collection: String,

    /// Version after the last committed write.
    pub version: Version,

    /// When the document was first inserted.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// The document body.
    pub body: serde_json::Value,
}

impl DocumentEnvelope {
    /// Creates an unsaved envelope around a raw JSON body.
    pub fn new(collection: impl Into<String>, id: DocumentId, body: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            collection: collection.into(),
            version: Version::initial(),
            created_at: now,
            updated_at: now,
            body,
        }
    }

    /// Creates an unsaved envelope by serializing a value.
    pub fn from_value<T: Serialize>(
        collection: impl Into<String>,
        id: DocumentId,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(value)?))
    }

    /// Sets the version the envelope is known to be at.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Deserializes the body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }

    /// Returns the value at a dotted body path (e.g. `"customer"` or `"items.0.medicine"`).
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.')
            .try_fold(&self.body, |value, segment| match value {
                serde_json::Value::Object(map) => map.get(segment),
                serde_json::Value::Array(items) => {
                    segment.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                _ => None,
            })
    }
}
