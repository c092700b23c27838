//! SalesPulse server library.
//!
//! Exposes the configuration, persistence, service, and routing layers so
//! the binary and the integration tests share one wiring surface.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
