//! symgrad: symbolic gradients compiled to native code
//!
//! symgrad builds scalar expression graphs, differentiates them in reverse
//! mode, and evaluates the result either with a small interpreter or as C
//! code compiled into a shared object and loaded at runtime.
//!
//! # Architecture
//!
//! - **sx**: scalar expressions, dense symbolic matrices, determinants
//! - **ad**: symbolic reverse-mode differentiation
//! - **function**: the [`Function`] interface and the interpreted [`SxFunction`]
//! - **backend**: C rendering, compilation and loading of shared objects
//! - **bench**: wall-clock timing of function variants
//! - **pipeline**: the determinant gradient benchmark end to end

// ============================================================================
// Core Modules
// ============================================================================

pub mod ad;
pub mod backend;
pub mod bench;
pub mod error;
pub mod function;
pub mod pipeline;
pub mod sx;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::c::{CCompiler, CRenderer, CompileOptions, ExternalFunction, OptLevel};
pub use error::{Result, SymError};
pub use function::{Function, SxFunction};
pub use pipeline::{DetGradPipeline, PipelineConfig, PipelineReport};
pub use sx::{Sx, SxMatrix, det};

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module with commonly used types and traits
pub mod prelude {
    // Symbolic expressions
    pub use crate::ad::gradient;
    pub use crate::sx::{Sx, SxMatrix, det};

    // Functions
    pub use crate::function::{Function, SxFunction};

    // Native code
    pub use crate::backend::c::{CCompiler, CRenderer, ExternalFunction, OptLevel};

    pub use crate::error::{Result, SymError};
}

/// Install the `env_logger` backend, defaulting to `info` when `RUST_LOG`
/// is unset. Calling it twice is harmless.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
