//! Derivative-generation pipeline for uploaded proof assets.
//!
//! Takes an asset attached to a proof record (image/video/document) and
//! produces thumbnails, a web-optimized rendition, extracted metadata and
//! an optional guarded in-place recompression of the original, while
//! isolating per-step failures and keeping the canonical source file safe
//! from corruption.
//!
//! The embedding service owns HTTP routing, persistence and queue
//! delivery; it hands an [`models::AssetRecord`] to
//! [`orchestrator::ProcessingOrchestrator::run`] on its worker lane and
//! persists the mutated record afterwards.

pub mod aggregate;
pub mod common;
pub mod config;
pub mod guard;
pub mod media;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod processors;
pub mod storage;
