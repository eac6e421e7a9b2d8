//! Core pipeline orchestration and domain logic for EventIntel.
//!
//! This crate ties the generation service and the knowledge store together
//! into the five-stage event pipeline (see [`pipeline::Pipeline`]).

pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod risk;
pub mod stages;
pub mod state;

#[cfg(test)]
mod testing;

pub use pipeline::{Pipeline, PipelineSettings, ProgressReporter, SilentProgress};
pub use render::render_full_page;
pub use state::{
    Classification, EventDetails, EventType, FinalState, PipelineState, Retrieval,
    RiskAssessment, RiskLevel, Stage,
};
