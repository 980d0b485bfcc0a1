//! Extraction and pipeline logic for crewout.
//!
//! This crate turns a finished crew run into an execution result
//! (`extract` → `assemble`) and hands it to storage (`persist_run`).

pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod run;
pub mod sample;
