//! Storage traits for clients, codes, tokens and assertion JTIs.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations
//! - Authorization codes and granted tokens
//! - Used client assertion JTIs
//!
//! # Implementations
//!
//! [`memory`] provides `DashMap` backed implementations of every trait.
//! Persistent backends implement the same traits in their own crates.

pub mod client;
pub mod jti;
pub mod memory;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

pub use client::ClientStorage;
pub use jti::JtiStorage;
pub use memory::{InMemoryClientStorage, InMemoryJtiStorage, InMemoryTokenStore};
pub use token::TokenStore;

/// Starts a background task that deletes expired entries every `interval`.
///
/// Lookups already treat expired entries as absent, so the sweep only
/// bounds memory. The task runs until the handle is aborted.
pub fn spawn_cleanup_task(
    tokens: Arc<dyn TokenStore>,
    jtis: Option<Arc<dyn JtiStorage>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            match tokens.cleanup_expired().await {
                Ok(deleted) if deleted > 0 => {
                    tracing::debug!(deleted, "Token store cleanup completed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Token store cleanup failed");
                }
                _ => {}
            }

            if let Some(jtis) = &jtis {
                match jtis.cleanup_expired().await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::debug!(deleted, "Assertion JTI cleanup completed");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Assertion JTI cleanup failed");
                    }
                    _ => {}
                }
            }
        }
    })
}
