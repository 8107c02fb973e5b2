//! Application state and shared resources.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::captcha::{TextChallengeGenerator, TextChallengeVerifier, TextRenderer};
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, StoreBackend};
use crate::flow::FlowRegistry;
use crate::store::{ChallengeStore, MemorySessionStore, RedisStore, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Session history
    pub sessions: Arc<dyn SessionStore>,

    /// Issued text challenges
    pub challenges: Arc<dyn ChallengeStore>,

    pub clock: Arc<dyn Clock>,

    /// Text CAPTCHA generator
    pub text_generator: Arc<TextChallengeGenerator>,

    /// Text CAPTCHA verifier
    pub text_verifier: Arc<TextChallengeVerifier>,

    /// Live chapca flows by id
    pub chapca_flows: Arc<RwLock<FlowRegistry>>,
}

impl AppState {
    /// Create application state, connecting to the configured store
    pub async fn new(config: AppConfig) -> Result<Self> {
        match config.store {
            StoreBackend::Redis => {
                let store = Arc::new(
                    RedisStore::connect(&config.redis_url)
                        .await
                        .context("Failed to connect to Redis")?,
                );
                Ok(Self::with_stores(config, store.clone(), store, Arc::new(SystemClock)))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, sessions are lost on restart");
                let store = Arc::new(MemorySessionStore::new());
                Ok(Self::with_stores(config, store.clone(), store, Arc::new(SystemClock)))
            }
        }
    }

    /// Assemble state around existing stores and clock
    pub fn with_stores(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        challenges: Arc<dyn ChallengeStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let renderer = Arc::new(TextRenderer::from_config(config.captcha.font_path.as_deref()));
        let text_generator = Arc::new(TextChallengeGenerator::new(
            config.captcha.challenge_ttl_secs,
            renderer,
        ));

        let max_idle = Duration::seconds(config.flow_idle_secs as i64);

        Self {
            config: Arc::new(config),
            sessions,
            challenges,
            clock,
            text_generator,
            text_verifier: Arc::new(TextChallengeVerifier::new()),
            chapca_flows: Arc::new(RwLock::new(FlowRegistry::new(max_idle))),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Drop chapca flows nobody has touched for `flow_idle_secs`
    pub async fn sweep_idle_flows(&self) -> usize {
        let now = self.now();
        let evicted = self.chapca_flows.write().await.evict_idle(now);
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle chapca flows");
        }
        evicted
    }
}
