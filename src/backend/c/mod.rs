//! C backend: source rendering, compilation with the system compiler and
//! loading of the resulting shared objects

pub mod compiler;
pub mod external;
pub mod renderer;

pub use compiler::{CCompiler, CompileOptions, CompileReport, OptLevel};
pub use external::ExternalFunction;
pub use renderer::CRenderer;

/// `int symgrad_init(int* n_in, int* n_out)`
pub const ENTRY_INIT: &str = "symgrad_init";
/// `int symgrad_sparsity(int i, int* nrow, int* ncol)`, inputs first
pub const ENTRY_SPARSITY: &str = "symgrad_sparsity";
/// `int symgrad_n_ops(void)`
pub const ENTRY_N_OPS: &str = "symgrad_n_ops";
/// `int symgrad_eval(const double** x, double** r)`
pub const ENTRY_EVAL: &str = "symgrad_eval";

/// C source of one generated function
///
/// Newtype over `String` so rendered code is not mixed up with other text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CCode {
    code: String,
}

impl CCode {
    pub fn new(code: String) -> Self {
        Self { code }
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn into_inner(self) -> String {
        self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn contains(&self, pat: &str) -> bool {
        self.code.contains(pat)
    }

    /// Create or overwrite `path` with the source
    pub fn write_to(&self, path: impl AsRef<std::path::Path>) -> crate::Result<std::path::PathBuf> {
        let path = path.as_ref();
        std::fs::write(path, &self.code)?;
        log::debug!("Wrote {} bytes of C source to {}", self.code.len(), path.display());
        Ok(path.to_path_buf())
    }
}

impl From<String> for CCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for CCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for CCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}
