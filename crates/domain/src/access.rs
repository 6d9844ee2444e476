//! Access Gate: resolves credentials to actors.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ActorId, PharmacyId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// The role an actor acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Customer,
    Pharmacy,
    Driver,
    Admin,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Customer => "customer",
            ActorType::Pharmacy => "pharmacy",
            ActorType::Driver => "driver",
            ActorType::Admin => "admin",
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActorType {
    type Err = AccessConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(ActorType::Customer),
            "pharmacy" => Ok(ActorType::Pharmacy),
            "driver" => Ok(ActorType::Driver),
            "admin" => Ok(ActorType::Admin),
            other => Err(AccessConfigError::UnknownActorType(other.to_string())),
        }
    }
}

/// An authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub actor_type: ActorType,
    pub active: bool,
}

impl Actor {
    pub fn new(id: ActorId, actor_type: ActorType) -> Self {
        Self {
            id,
            actor_type,
            active: true,
        }
    }

    pub fn customer(id: ActorId) -> Self {
        Self::new(id, ActorType::Customer)
    }

    /// A pharmacy account. Its actor id is the id of the pharmacy it owns.
    pub fn pharmacy(id: PharmacyId) -> Self {
        Self::new(ActorId::from_uuid(id.as_uuid()), ActorType::Pharmacy)
    }

    pub fn driver(id: ActorId) -> Self {
        Self::new(id, ActorType::Driver)
    }

    pub fn admin(id: ActorId) -> Self {
        Self::new(id, ActorType::Admin)
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is(&self, actor_type: ActorType) -> bool {
        self.actor_type == actor_type
    }

    pub fn is_admin(&self) -> bool {
        self.is(ActorType::Admin)
    }

    /// Returns true if this actor is the account owning `pharmacy`.
    pub fn owns_pharmacy(&self, pharmacy: PharmacyId) -> bool {
        self.is(ActorType::Pharmacy) && pharmacy.is_owned_by(self.id)
    }
}

/// Why a credential did not resolve to a usable actor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("No credential provided")]
    MissingCredential,

    #[error("Invalid credential")]
    InvalidCredential,

    /// Inactive accounts are rejected the same way as unknown ones.
    #[error("Account is inactive")]
    Inactive,
}

/// Resolves an opaque credential to an actor.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// Returns the actor behind `credential`. Inactive actors fail with
    /// [`AuthFailure::Inactive`].
    async fn authenticate(&self, credential: &str) -> Result<Actor, AuthFailure>;
}

/// Error in a static token table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessConfigError {
    #[error("Malformed access token entry: {0}")]
    MalformedEntry(String),

    #[error("Unknown actor type: {0}")]
    UnknownActorType(String),

    #[error("Invalid actor id in entry: {0}")]
    InvalidActorId(String),
}

/// Access gate backed by a fixed token table.
///
/// Token issuance lives outside this service; this gate is what the server
/// uses when tokens are provisioned through configuration, and what tests use.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGate {
    tokens: Arc<RwLock<HashMap<String, Actor>>>,
}

impl StaticAccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses comma-separated `token=actorType:uuid[:inactive]` entries.
    pub fn from_entries(entries: &str) -> Result<Self, AccessConfigError> {
        let mut tokens = HashMap::new();

        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, actor) = entry
                .split_once('=')
                .ok_or_else(|| AccessConfigError::MalformedEntry(entry.to_string()))?;

            let mut parts = actor.split(':');
            let (Some(actor_type), Some(id)) = (parts.next(), parts.next()) else {
                return Err(AccessConfigError::MalformedEntry(entry.to_string()));
            };
            let actor_type: ActorType = actor_type.parse()?;
            let id: ActorId = id
                .parse()
                .map_err(|_| AccessConfigError::InvalidActorId(entry.to_string()))?;

            let mut actor = Actor::new(id, actor_type);
            match parts.next() {
                None => {}
                Some("inactive") => actor = actor.inactive(),
                Some(_) => return Err(AccessConfigError::MalformedEntry(entry.to_string())),
            }

            let token = token.trim();
            if token.is_empty() {
                return Err(AccessConfigError::MalformedEntry(entry.to_string()));
            }
            tokens.insert(token.to_string(), actor);
        }

        Ok(Self {
            tokens: Arc::new(RwLock::new(tokens)),
        })
    }

    /// Registers a token for an actor, replacing any previous holder.
    pub async fn grant(&self, token: impl Into<String>, actor: Actor) {
        self.tokens.write().await.insert(token.into(), actor);
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl AccessGate for StaticAccessGate {
    async fn authenticate(&self, credential: &str) -> Result<Actor, AuthFailure> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthFailure::MissingCredential);
        }

        let actor = self
            .tokens
            .read()
            .await
            .get(credential)
            .copied()
            .ok_or(AuthFailure::InvalidCredential)?;

        if !actor.active {
            return Err(AuthFailure::Inactive);
        }
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticates_granted_token() {
        let gate = StaticAccessGate::new();
        let actor = Actor::customer(ActorId::new());
        gate.grant("tok-1", actor).await;

        assert_eq!(gate.authenticate("tok-1").await, Ok(actor));
        assert_eq!(
            gate.authenticate("tok-2").await,
            Err(AuthFailure::InvalidCredential)
        );
        assert_eq!(
            gate.authenticate("  ").await,
            Err(AuthFailure::MissingCredential)
        );
    }

    #[tokio::test]
    async fn inactive_actor_is_rejected() {
        let gate = StaticAccessGate::new();
        gate.grant("tok", Actor::driver(ActorId::new()).inactive()).await;

        assert_eq!(gate.authenticate("tok").await, Err(AuthFailure::Inactive));
    }

    #[tokio::test]
    async fn parses_token_entries() {
        let customer = ActorId::new();
        let pharmacy = ActorId::new();
        let entries = format!("alice=customer:{customer}, shop=pharmacy:{pharmacy}:inactive,,");

        let gate = StaticAccessGate::from_entries(&entries).unwrap();
        assert_eq!(gate.len().await, 2);

        let alice = gate.authenticate("alice").await.unwrap();
        assert_eq!(alice.id, customer);
        assert_eq!(alice.actor_type, ActorType::Customer);
        assert_eq!(gate.authenticate("shop").await, Err(AuthFailure::Inactive));
    }

    #[test]
    fn rejects_malformed_entries() {
        let id = ActorId::new();
        assert!(matches!(
            StaticAccessGate::from_entries("no-equals-sign"),
            Err(AccessConfigError::MalformedEntry(_))
        ));
        assert!(matches!(
            StaticAccessGate::from_entries(&format!("t=nurse:{id}")),
            Err(AccessConfigError::UnknownActorType(_))
        ));
        assert!(matches!(
            StaticAccessGate::from_entries("t=admin:not-a-uuid"),
            Err(AccessConfigError::InvalidActorId(_))
        ));
        assert!(matches!(
            StaticAccessGate::from_entries(&format!("t=admin:{id}:retired")),
            Err(AccessConfigError::MalformedEntry(_))
        ));
    }

    #[test]
    fn pharmacy_actor_owns_its_pharmacy() {
        let pharmacy = PharmacyId::new();
        let actor = Actor::pharmacy(pharmacy);

        assert!(actor.owns_pharmacy(pharmacy));
        assert!(!actor.owns_pharmacy(PharmacyId::new()));
        assert!(!Actor::admin(ActorId::from_uuid(pharmacy.as_uuid())).owns_pharmacy(pharmacy));
    }
}
