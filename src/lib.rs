//! Track identity resolution and idempotent playlist synchronization for
//! historical discographies.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod duplicates;
pub mod errors;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod scoring;
pub mod sync;
