//! Shared constants for MİDA components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Delay before a widget clears itself after a wrong answer
pub const WRONG_ANSWER_RESET_MS: i64 = 1500;

/// Sales wizard: confirmation display before auto-advancing
pub const SALES_ADVANCE_DELAY_MS: i64 = 1000;

/// Sales wizard: delay before a failed widget is regenerated
pub const SALES_RETRY_DELAY_MS: i64 = 500;

/// Upper bound of the per-kind repeat count in the chapca flow
pub const MAX_REPEAT_COUNT: u8 = 10;

/// Upper bound of the captchas planned for one sales run
pub const MAX_SALES_CAPTCHAS: u32 = 5;

/// Birth date used when none is configured
pub const DEFAULT_BIRTH_DATE: &str = "25/08/1990";

/// Text CAPTCHA alphabet (no `o`, `l`, `0`, `1`)
pub const TEXT_CHARSET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";

/// Text CAPTCHA length
pub const TEXT_LENGTH: usize = 5;

/// Number CAPTCHA length
pub const NUMBER_LENGTH: usize = 6;

/// Text challenge expiry in the store (5 minutes)
pub const TEXT_CHALLENGE_TTL_SECS: u64 = 300;

/// Default page size for session history
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Aim trainer tuning
pub mod aim {
    /// Spawn interval at the start of a session
    pub const SPAWN_INTERVAL_START_MS: i64 = 500;

    /// Spawn interval once the ramp is over
    pub const SPAWN_INTERVAL_END_MS: i64 = 100;

    /// Length of the spawn-rate ramp
    pub const SPAWN_RAMP_SECS: f64 = 30.0;

    /// Target lifetime at level 1
    pub const LIFETIME_START_MS: i64 = 4000;

    /// Lifetime lost per level
    pub const LIFETIME_STEP_MS: i64 = 150;

    /// Lifetime floor
    pub const LIFETIME_MIN_MS: i64 = 2000;

    /// Target size at level 1
    pub const SIZE_START_PX: f64 = 80.0;

    /// Size lost per level
    pub const SIZE_STEP_PX: f64 = 3.0;

    /// Size floor
    pub const SIZE_MIN_PX: f64 = 40.0;

    /// Expirations that end the game
    pub const MAX_EXPIRED: u32 = 3;

    /// Points per level
    pub const POINTS_PER_LEVEL: u32 = 10;

    /// Drag mode drop zone radius around the arena centre
    pub const DROP_ZONE_RADIUS_PX: f64 = 80.0;

    /// Spawn padding from the arena edges
    pub const SPAWN_PADDING_PX: f64 = 20.0;
}

/// Redis key layout
pub mod redis_keys {
    /// Text challenge: captcha:text:{challenge_id}
    pub const TEXT_CHALLENGE_PREFIX: &str = "mida:captcha:text:";

    /// Session collection index: mida:{collection}:{email}
    pub const SESSIONS_PREFIX: &str = "mida:";

    /// Single-write guard: mida:playthrough:{collection}:{playthrough_id}
    pub const PLAYTHROUGH_PREFIX: &str = "mida:playthrough:";
}

/// How long a claimed playthrough may stay unwritten before it can be
/// claimed again
pub const PLAYTHROUGH_PENDING_TTL_SECS: u64 = 60;

/// How long a written playthrough keeps answering duplicates (7 days)
pub const PLAYTHROUGH_TTL_SECS: u64 = 7 * 24 * 60 * 60;
