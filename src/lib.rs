//! Identity, credential and authorization core of the FleetPass backend.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod rate_limit;
pub mod seed;
pub mod state;
