//! # MİDA trainer engine
//!
//! CAPTCHA widgets, the chapca and sales-wizard orchestrators, the aim
//! trainer, and newest-first session history behind a small HTTP API.

pub mod aim;
pub mod captcha;
pub mod clock;
pub mod config;
pub mod flow;
pub mod routes;
pub mod state;
pub mod store;
