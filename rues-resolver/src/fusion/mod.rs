//! Resolution orchestration
//!
//! Dataset → registry API → registry page, each step an explicit
//! `Option`-returning call merged first-writer-wins into one identity.

pub mod identity_resolver;

pub use identity_resolver::{
    IdentityResolver, Resolution, ResolutionTrace, SourceOutcome, SourceStep,
};
