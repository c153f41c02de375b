//! # sentinel-renderer
//!
//! Tera templates that turn a step into the texts a human or an agent works
//! from: an execution brief, a verification checklist, an output template,
//! and repair notes after a failed verify.
//!
//! ```rust,no_run
//! use sentinel_core::{Step, StepKind};
//! use sentinel_renderer::{Renderer, StepContext};
//!
//! fn brief(step: &Step) -> Option<String> {
//!     let renderer = Renderer::new().ok()?;
//!     let artifact = renderer.compile(&StepContext::new(step, "api")).ok()?;
//!     Some(artifact.brief)
//! }
//! # let _ = brief(&Step::new("s1", StepKind::Verification, "document"));
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{RepairContext, StepContext};
pub use engine::{ArtifactKind, CompiledArtifact, Renderer};
pub use error::RenderError;
