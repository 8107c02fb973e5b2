//! Redis-backed store.
//!
//! Each collection/owner pair is a sorted set `mida:{collection}:{email}`
//! scored by `createdAt` in milliseconds, members being the JSON document
//! with its id. Text challenges are plain keys with a TTL.

use async_trait::async_trait;
use mida_common::constants::redis_keys::{
    PLAYTHROUGH_PREFIX, SESSIONS_PREFIX, TEXT_CHALLENGE_PREFIX,
};
use mida_common::constants::{PLAYTHROUGH_PENDING_TTL_SECS, PLAYTHROUGH_TTL_SECS};
use mida_common::{
    AimSession, ChapcaSession, Collection, MidaError, Page, SalesSession, SessionDocument, Stored,
};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ChallengeStore, Claim, Cursor, SessionStore, generate_id, page_from};
use crate::captcha::StoredChallenge;

/// Store over a shared Redis connection manager
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, MidaError> {
        let client = redis::Client::open(url)
            .map_err(|e| MidaError::Config(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| MidaError::Store(format!("Redis connection failed: {}", e)))?;
        tracing::info!("Connected to Redis");
        Ok(Self { conn })
    }

    fn sessions_key(collection: Collection, email: &str) -> String {
        format!("{}{}:{}", SESSIONS_PREFIX, collection, email)
    }

    async fn append<T: SessionDocument + Serialize>(
        &self,
        collection: Collection,
        doc: &T,
    ) -> Result<String, MidaError> {
        let id = generate_id();
        let member = serde_json::to_string(&Stored { id: id.clone(), doc })
            .map_err(|e| MidaError::Internal(e.to_string()))?;
        let score = doc.created_at().timestamp_millis();

        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(Self::sessions_key(collection, doc.owner()), member, score)
            .await
            .map_err(store_error)?;

        tracing::debug!(id = %id, collection = %collection, "Session stored");
        Ok(id)
    }

    /// Newest-first page. The cursor's own millisecond is read inclusively
    /// and its ties are filtered by id, so sessions sharing a millisecond
    /// are never skipped at a page boundary.
    async fn page<T: SessionDocument + DeserializeOwned>(
        &self,
        collection: Collection,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<T>>, MidaError> {
        let key = Self::sessions_key(collection, email);
        let mut conn = self.conn.clone();

        let (mut items, max) = match cursor {
            Some(raw) => {
                let cursor = Cursor::decode(raw)?;
                let ties: Vec<String> = conn
                    .zrangebyscore(&key, cursor.created_at_ms, cursor.created_at_ms)
                    .await
                    .map_err(query_error)?;
                let ties = ties_after(decode_members(&ties)?, &cursor);
                (ties, format!("({}", cursor.created_at_ms))
            }
            None => (Vec::new(), "+inf".to_string()),
        };
        items.truncate(page_size);

        let remaining = page_size - items.len();
        if remaining > 0 {
            let members: Vec<String> = conn
                .zrevrangebyscore_limit(&key, max, "-inf", 0, remaining as isize)
                .await
                .map_err(query_error)?;
            items.extend(decode_members(&members)?);
        }

        Ok(page_from(items, page_size))
    }

    fn playthrough_key(collection: Collection, playthrough_id: &str) -> String {
        format!("{}{}:{}", PLAYTHROUGH_PREFIX, collection, playthrough_id)
    }
}

fn decode_members<T: DeserializeOwned>(members: &[String]) -> Result<Vec<Stored<T>>, MidaError> {
    members
        .iter()
        .map(|m| serde_json::from_str::<Stored<T>>(m))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MidaError::Query(format!("Corrupt session document: {}", e)))
}

/// Members sharing the cursor's millisecond that come after it, newest-first.
/// Same-score members sort by their JSON, which starts with the fixed-length
/// id, so descending id matches the order of the first page.
fn ties_after<T>(ties: Vec<Stored<T>>, cursor: &Cursor) -> Vec<Stored<T>> {
    let mut after: Vec<Stored<T>> = ties
        .into_iter()
        .filter(|s| s.id.as_str() < cursor.id.as_str())
        .collect();
    after.sort_by(|a, b| b.id.cmp(&a.id));
    after
}

fn query_error(e: redis::RedisError) -> MidaError {
    MidaError::Query(e.to_string())
}

fn store_error(e: redis::RedisError) -> MidaError {
    MidaError::Store(e.to_string())
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn save_chapca(&self, session: &ChapcaSession) -> Result<String, MidaError> {
        self.append(Collection::Chapca, session).await
    }

    async fn save_aim(&self, session: &AimSession) -> Result<String, MidaError> {
        self.append(Collection::Aim, session).await
    }

    async fn save_sales(&self, session: &SalesSession) -> Result<String, MidaError> {
        self.append(Collection::Sales, session).await
    }

    async fn list_chapca(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<ChapcaSession>>, MidaError> {
        self.page(Collection::Chapca, email, page_size, cursor).await
    }

    async fn list_aim(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<AimSession>>, MidaError> {
        self.page(Collection::Aim, email, page_size, cursor).await
    }

    async fn list_sales(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<SalesSession>>, MidaError> {
        self.page(Collection::Sales, email, page_size, cursor).await
    }

    async fn claim_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
    ) -> Result<Claim, MidaError> {
        let key = Self::playthrough_key(collection, playthrough_id);
        let mut conn = self.conn.clone();

        // SET NX with an empty value marks the write as in flight
        let granted: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("")
            .arg("NX")
            .arg("EX")
            .arg(PLAYTHROUGH_PENDING_TTL_SECS)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        if granted.is_some() {
            return Ok(Claim::Granted);
        }

        let existing: Option<String> = conn.get(&key).await.map_err(store_error)?;
        Ok(match existing {
            Some(session_id) if !session_id.is_empty() => Claim::Stored(session_id),
            _ => Claim::InFlight,
        })
    }

    async fn complete_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
        session_id: &str,
    ) -> Result<(), MidaError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(
            Self::playthrough_key(collection, playthrough_id),
            session_id,
            PLAYTHROUGH_TTL_SECS,
        )
        .await
        .map_err(store_error)
    }

    async fn release_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
    ) -> Result<(), MidaError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::playthrough_key(collection, playthrough_id))
            .await
            .map_err(store_error)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

#[async_trait]
impl ChallengeStore for RedisStore {
    async fn put_challenge(
        &self,
        challenge_id: &str,
        challenge: &StoredChallenge,
        ttl_secs: u64,
    ) -> Result<(), MidaError> {
        let key = format!("{}{}", TEXT_CHALLENGE_PREFIX, challenge_id);
        let value =
            serde_json::to_string(challenge).map_err(|e| MidaError::Internal(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, value, ttl_secs)
            .await
            .map_err(store_error)
    }

    async fn take_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<StoredChallenge>, MidaError> {
        let key = format!("{}{}", TEXT_CHALLENGE_PREFIX, challenge_id);
        let mut conn = self.conn.clone();

        // GET + DEL rather than GETDEL, which needs Redis 6.2+
        let stored: Option<String> = conn.get(&key).await.map_err(store_error)?;
        conn.del::<_, ()>(&key).await.map_err(store_error)?;

        stored
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| MidaError::Captcha(format!("Corrupt challenge: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_key_layout() {
        assert_eq!(
            RedisStore::sessions_key(Collection::Aim, "a@mida.az"),
            "mida:aimSessions:a@mida.az"
        );
    }

    #[test]
    fn test_playthrough_key_layout() {
        assert_eq!(
            RedisStore::playthrough_key(Collection::Sales, "p-1"),
            "mida:playthrough:salesSessions:p-1"
        );
    }

    fn stored(id: &str) -> Stored<String> {
        Stored {
            id: id.to_string(),
            doc: String::new(),
        }
    }

    #[test]
    fn test_ties_after_cursor_resume_in_id_order() {
        // Four sessions in one millisecond; the first page ended at "c"
        let cursor = Cursor {
            created_at_ms: 1_000,
            id: "c".to_string(),
        };
        let ties = vec![stored("a"), stored("d"), stored("b"), stored("c")];

        let rest: Vec<String> = ties_after(ties, &cursor).into_iter().map(|s| s.id).collect();
        assert_eq!(rest, vec!["b", "a"]);
    }

    #[test]
    fn test_connect_rejects_malformed_url() {
        let result = tokio_test::block_on(RedisStore::connect("not a redis url"));
        assert!(matches!(result, Err(MidaError::Config(_))));
    }
}
