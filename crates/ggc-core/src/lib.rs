//! Core types and trait definitions for the Global Grant Community
//! assessment engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the question catalog and answer types, the progress/compliance aggregator,
//! and the report shapes consumed by presentation layers.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod form;
pub mod level;
pub mod progress;
pub mod report;
pub mod response;
pub mod roles;
pub mod store;
pub mod tally;

pub use error::{DomainError, Entity, Error, IntegrityViolation, Result};
pub use level::Level;
pub use progress::{ProgressInfo, ProgressSlug, get_progress_info};
