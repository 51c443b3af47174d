//! `daybook` — a deterministic pipeline that turns exported AI-chat
//! transcripts into auditable, reproducible per-day journal summaries.
//!
//! This crate is the CLI surface over the `daybook-*` library crates; it
//! owns argument parsing, process wiring (DB connection, logging, LLM
//! backend selection) and nothing else. Every algorithmic decision — hashing,
//! ingest, classification, bundling, segmentation, ticking, export rendering,
//! search — lives in its own workspace crate and is unit-tested there.

pub mod cli;
pub mod fs_write;
pub mod logging;
