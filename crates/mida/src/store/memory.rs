//! In-process store with fault injection, used by tests and local demos.

use async_trait::async_trait;
use mida_common::{
    AimSession, ChapcaSession, Collection, MidaError, Page, SalesSession, SessionDocument, Stored,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{Claim, ChallengeStore, Cursor, SessionStore, generate_id, order_key, page_from};
use crate::captcha::StoredChallenge;

/// Session and challenge store held in memory
#[derive(Default)]
pub struct MemorySessionStore {
    chapca: RwLock<Vec<Stored<ChapcaSession>>>,
    aim: RwLock<Vec<Stored<AimSession>>>,
    sales: RwLock<Vec<Stored<SalesSession>>>,
    challenges: RwLock<HashMap<String, StoredChallenge>>,
    /// Claimed playthroughs; `None` while the write is in flight
    playthroughs: RwLock<HashMap<String, Option<String>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    writes: AtomicU64,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent session write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent listing fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Successful session writes so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), MidaError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MidaError::Store("write rejected".to_string()));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), MidaError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MidaError::Query(
                "the query requires an index on (email, createdAt)".to_string(),
            ));
        }
        Ok(())
    }

    async fn append<T: Clone>(
        &self,
        collection: &RwLock<Vec<Stored<T>>>,
        doc: &T,
    ) -> Result<String, MidaError> {
        self.check_write()?;
        let id = generate_id();
        collection.write().await.push(Stored {
            id: id.clone(),
            doc: doc.clone(),
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn page<T: SessionDocument + Clone>(
        &self,
        collection: &RwLock<Vec<Stored<T>>>,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<T>>, MidaError> {
        self.check_read()?;
        let after = cursor.map(Cursor::decode).transpose()?;

        let docs = collection.read().await;
        let mut owned: Vec<&Stored<T>> = docs.iter().filter(|s| s.doc.owner() == email).collect();
        owned.sort_by(|a, b| order_key(b).cmp(&order_key(a)));

        let items: Vec<Stored<T>> = owned
            .into_iter()
            .filter(|s| match &after {
                Some(c) => {
                    let key = (s.doc.created_at().timestamp_millis(), s.id.as_str());
                    key < (c.created_at_ms, c.id.as_str())
                }
                None => true,
            })
            .take(page_size)
            .cloned()
            .collect();

        Ok(page_from(items, page_size))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save_chapca(&self, session: &ChapcaSession) -> Result<String, MidaError> {
        self.append(&self.chapca, session).await
    }

    async fn save_aim(&self, session: &AimSession) -> Result<String, MidaError> {
        self.append(&self.aim, session).await
    }

    async fn save_sales(&self, session: &SalesSession) -> Result<String, MidaError> {
        self.append(&self.sales, session).await
    }

    async fn list_chapca(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<ChapcaSession>>, MidaError> {
        self.page(&self.chapca, email, page_size, cursor).await
    }

    async fn list_aim(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<AimSession>>, MidaError> {
        self.page(&self.aim, email, page_size, cursor).await
    }

    async fn list_sales(
        &self,
        email: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Stored<SalesSession>>, MidaError> {
        self.page(&self.sales, email, page_size, cursor).await
    }

    async fn claim_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
    ) -> Result<Claim, MidaError> {
        let mut claims = self.playthroughs.write().await;
        let claim = match claims.entry(playthrough_key(collection, playthrough_id)) {
            Entry::Occupied(entry) => match entry.get() {
                Some(session_id) => Claim::Stored(session_id.clone()),
                None => Claim::InFlight,
            },
            Entry::Vacant(entry) => {
                entry.insert(None);
                Claim::Granted
            }
        };
        Ok(claim)
    }

    async fn complete_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
        session_id: &str,
    ) -> Result<(), MidaError> {
        self.playthroughs.write().await.insert(
            playthrough_key(collection, playthrough_id),
            Some(session_id.to_string()),
        );
        Ok(())
    }

    async fn release_playthrough(
        &self,
        collection: Collection,
        playthrough_id: &str,
    ) -> Result<(), MidaError> {
        self.playthroughs
            .write()
            .await
            .remove(&playthrough_key(collection, playthrough_id));
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}

fn playthrough_key(collection: Collection, playthrough_id: &str) -> String {
    format!("{}:{}", collection, playthrough_id)
}

#[async_trait]
impl ChallengeStore for MemorySessionStore {
    async fn put_challenge(
        &self,
        challenge_id: &str,
        challenge: &StoredChallenge,
        _ttl_secs: u64,
    ) -> Result<(), MidaError> {
        self.challenges
            .write()
            .await
            .insert(challenge_id.to_string(), challenge.clone());
        Ok(())
    }

    async fn take_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<StoredChallenge>, MidaError> {
        Ok(self.challenges.write().await.remove(challenge_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use mida_common::GameMode;

    fn aim(email: &str, created_ms: i64) -> AimSession {
        let t = Utc.timestamp_millis_opt(created_ms).unwrap();
        AimSession {
            email: email.to_string(),
            start_time: t - Duration::seconds(20),
            end_time: t,
            total_duration: 20_000,
            total_duration_seconds: 20,
            game_mode: GameMode::Normal,
            score: 12,
            misses: 3,
            expired_targets: 3,
            accuracy: 80.0,
            level: 2,
            created_at: t,
        }
    }

    #[tokio::test]
    async fn test_pages_are_newest_first_and_owner_scoped() {
        let store = MemorySessionStore::new();
        for i in 0..5 {
            store.save_aim(&aim("a@mida.az", 1_000 + i * 100)).await.unwrap();
        }
        store.save_aim(&aim("b@mida.az", 5_000)).await.unwrap();

        let first = store.list_aim("a@mida.az", 2, None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.items[0].doc.created_at.timestamp_millis(), 1_400);
        assert_eq!(first.items[1].doc.created_at.timestamp_millis(), 1_300);

        let second = store
            .list_aim("a@mida.az", 2, first.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(second.items[0].doc.created_at.timestamp_millis(), 1_200);

        let third = store
            .list_aim("a@mida.az", 2, second.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(third.items.len(), 1);
        assert!(!third.has_more);
    }

    #[tokio::test]
    async fn test_full_last_page_still_reports_more() {
        let store = MemorySessionStore::new();
        for i in 0..2 {
            store.save_aim(&aim("a@mida.az", 1_000 + i)).await.unwrap();
        }
        let page = store.list_aim("a@mida.az", 2, None).await.unwrap();
        assert!(page.has_more);
        let next = store
            .list_aim("a@mida.az", 2, page.next_cursor.as_deref())
            .await
            .unwrap();
        assert!(next.items.is_empty());
        assert!(!next.has_more);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemorySessionStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save_aim(&aim("a@mida.az", 1)).await,
            Err(MidaError::Store(_))
        ));
        assert_eq!(store.write_count(), 0);

        store.set_fail_reads(true);
        assert!(matches!(
            store.list_aim("a@mida.az", 10, None).await,
            Err(MidaError::Query(_))
        ));
    }

    #[tokio::test]
    async fn test_challenges_are_single_use() {
        let store = MemorySessionStore::new();
        let challenge = StoredChallenge {
            answer: "ab3cd".to_string(),
            created_at: 0,
            expires_at: 300,
        };
        store.put_challenge("c1", &challenge, 300).await.unwrap();
        assert!(store.take_challenge("c1").await.unwrap().is_some());
        assert!(store.take_challenge("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_playthrough_claims() {
        let store = MemorySessionStore::new();
        let claim = store.claim_playthrough(Collection::Aim, "p1").await.unwrap();
        assert_eq!(claim, Claim::Granted);
        assert_eq!(
            store.claim_playthrough(Collection::Aim, "p1").await.unwrap(),
            Claim::InFlight
        );
        // Same id in another collection is independent
        assert_eq!(
            store.claim_playthrough(Collection::Sales, "p1").await.unwrap(),
            Claim::Granted
        );

        store.complete_playthrough(Collection::Aim, "p1", "s1").await.unwrap();
        assert_eq!(
            store.claim_playthrough(Collection::Aim, "p1").await.unwrap(),
            Claim::Stored("s1".to_string())
        );

        store.release_playthrough(Collection::Sales, "p1").await.unwrap();
        assert_eq!(
            store.claim_playthrough(Collection::Sales, "p1").await.unwrap(),
            Claim::Granted
        );
    }
}
