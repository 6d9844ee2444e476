use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when an identifier string is not a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for IdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} id: {}", self.kind, self.value)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Internal identifier of a stored document (order, pharmacy, medicine).
    DocumentId,
    "document"
);

uuid_id!(
    /// Identity of an authenticated actor (customer, pharmacy, driver or admin).
    ActorId,
    "actor"
);

uuid_id!(
    /// Identifier of a pharmacy. A pharmacy actor's `ActorId` carries the same UUID.
    PharmacyId,
    "pharmacy"
);

uuid_id!(
    /// Identifier of a catalog medicine.
    MedicineId,
    "medicine"
);

impl PharmacyId {
    /// Returns true if the given actor is the account that owns this pharmacy.
    pub fn is_owned_by(&self, actor: ActorId) -> bool {
        self.0 == actor.as_uuid()
    }

    /// Returns the document id this pharmacy is stored under.
    pub fn document_id(&self) -> DocumentId {
        DocumentId::from_uuid(self.0)
    }
}

impl MedicineId {
    /// Returns the document id this medicine is stored under.
    pub fn document_id(&self) -> DocumentId {
        DocumentId::from_uuid(self.0)
    }
}
