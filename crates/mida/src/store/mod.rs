//! Session history and text-challenge storage.
//!
//! Sessions are append-only, owned by an email address, and listed
//! newest-first with an opaque cursor taken from the last item of the
//! previous page.

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use mida_common::{
    AimSession, ChapcaSession, Collection, MidaError, Page, SalesSession, SessionDocument, Stored,
};
use rand::Rng;

use crate::captcha::StoredChallenge;

/// Append-only session collections
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a chapca session, returning its id
    async fn save_chapca(&self, session: &ChapcaSession) -> Result<String, MidaError>;

    /// Persist an aim session, returning its id
    async fn save_aim(&self, session: &AimSession) -> Result<String, MidaError>;

    /// Persist a sales session, returning its id
    async fn save_sales(&self, session: &SalesSession) -> Result<String, MidaError>;

    async fn list_chapca(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<ChapcaSession>>, MidaError>;

    async fn list_aim(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<AimSession>>, MidaError>;

    async fn list_sales(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<SalesSession>>, MidaError>;

    /// Reserve the single write of a client playthrough
    async fn claim_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
    ) -> Result<Claim, MidaError>;

    /// Record the session id a claimed playthrough was stored under
    async fn complete_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
        session_id: &str,
    ) -> Result<(), MidaError>;

    /// Drop a claim whose write failed so the client can retry
    async fn release_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
    ) -> Result<(), MidaError>;

    /// Backend reachability
    async fn ping(&self) -> bool;
}

/// Result of claiming a playthrough
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// Caller owns the write
    Granted,
    /// Another request is writing it now
    InFlight,
    /// Already written under this session id
    Stored(String),
}

/// Single-use storage for issued text challenges
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn put_challenge(
        &self,
        challenge_id: &str,
        challenge: &StoredChallenge,
        ttl_secs: u64,
    ) -> Result<(), MidaError>;

    /// Fetch and delete
    async fn take_challenge(&self, challenge_id: &str)
    -> Result<Option<StoredChallenge>, MidaError>;
}

/// Generate a random URL-safe id for documents and challenges
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Position of a document in newest-first order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at_ms: i64,
    pub id: String,
}

impl Cursor {
    pub fn of<T: SessionDocument>(stored: &Stored<T>) -> Self {
        Self {
            created_at_ms: stored.doc.created_at().timestamp_millis(),
            id: stored.id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.created_at_ms, self.id))
    }

    pub fn decode(raw: &str) -> Result<Self, MidaError> {
        let invalid = || MidaError::InvalidInput("malformed page cursor".to_string());
        let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (millis, id) = text.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            created_at_ms: millis.parse().map_err(|_| invalid())?,
            id: id.to_string(),
        })
    }
}

/// Build a page and its continuation cursor
fn page_from<T: SessionDocument>(items: Vec<Stored<T>>, page_size: usize) -> Page<Stored<T>> {
    let next_cursor = items.last().map(|last| Cursor::of(last).encode());
    Page::new(items, page_size, next_cursor)
}

/// Newest-first ordering key
fn order_key<T: SessionDocument>(stored: &Stored<T>) -> (DateTime<Utc>, &str) {
    (stored.doc.created_at(), stored.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = Cursor {
            created_at_ms: 1_760_000_000_123,
            id: "abc:def".to_string(),
        };
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(matches!(
            Cursor::decode("not-a-cursor!!"),
            Err(MidaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
        assert_eq!(generate_id().len(), 22);
    }
}
