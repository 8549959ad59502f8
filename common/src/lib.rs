//! Chaos Coin common library.
//!
//! Pure domain logic shared by the dashboard: who is the administrator,
//! what input is acceptable, the locally persisted post feed and the
//! market data records. Nothing here talks to the network.

pub mod auth;
pub mod config;
pub mod feed;
pub mod logger;
pub mod market;
pub mod security;
pub mod time;
