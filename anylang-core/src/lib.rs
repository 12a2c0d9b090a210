//! Core pipeline for the Anylang toolchain.
//!
//! Anylang has no compiler of its own. The pipeline is roughly:
//!
//!   source .any files
//!     -> sources    (discovery)
//!     -> prompt     (payload + system instruction)
//!     -> translate  (streamed LLVM IR from the generate-content API)
//!     -> toolchain  (llc, C compiler, run)
//!
//! Front-ends (the CLI) should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod error;
pub mod config;

// ---------------------------------------------------------------------
// Inputs: source discovery and prompt construction
// ---------------------------------------------------------------------

pub mod sources;
pub mod prompt;

// ---------------------------------------------------------------------
// Translation and native build
// ---------------------------------------------------------------------

pub mod translate;
pub mod toolchain;
pub mod pipeline;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use config::{ApiKey, TranslatorConfig, load_dotenv};
pub use error::CoreError;
pub use pipeline::{Emit, Pipeline, PipelineOptions, PipelineReport, Stage};
pub use toolchain::{Artifacts, Platform, SystemRunner, ToolOutcome, Toolchain};
pub use translate::{Translator, VertexTranslator};
