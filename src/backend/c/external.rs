//! Functions loaded from compiled shared objects

use super::{ENTRY_EVAL, ENTRY_INIT, ENTRY_N_OPS, ENTRY_SPARSITY};
use crate::error::{Result, SymError};
use crate::function::{Function, FunctionIo};
use libloading::Library;
use log::debug;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};

type InitFn = unsafe extern "C" fn(*mut c_int, *mut c_int) -> c_int;
type SparsityFn = unsafe extern "C" fn(c_int, *mut c_int, *mut c_int) -> c_int;
type NOpsFn = unsafe extern "C" fn() -> c_int;
type EvalFn = unsafe extern "C" fn(*const *const f64, *const *mut f64) -> c_int;

struct Loaded {
    eval: EvalFn,
    n_ops: usize,
    io: FunctionIo,
    // Argument arrays for `symgrad_eval`, refilled from `io` before each call
    input_ptrs: Vec<*const f64>,
    output_ptrs: Vec<*mut f64>,
}

impl Loaded {
    fn refresh_pointers(&mut self) {
        self.input_ptrs.clear();
        self.input_ptrs
            .extend(self.io.inputs.iter().map(|v| v.as_ptr()));
        self.output_ptrs.clear();
        self.output_ptrs
            .extend(self.io.outputs.iter_mut().map(|v| v.as_mut_ptr()));
    }
}

/// A function exported by a shared object produced from [`super::CRenderer`]
/// output
///
/// The library stays mapped for the lifetime of this value; resolved entry
/// points are never handed out.
pub struct ExternalFunction {
    name: String,
    path: PathBuf,
    library: Library,
    state: Option<Loaded>,
}

impl std::fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalFunction")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("initialized", &self.state.is_some())
            .finish()
    }
}

impl ExternalFunction {
    /// Map the shared object at `path`; entry points are resolved by `init`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Loading runs the library's initialisers; our generated code has none.
        let library = unsafe { Library::new(&path) }.map_err(|e| SymError::Library {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("external")
            .to_string();
        debug!("Loaded shared object {}", path.display());
        Ok(Self {
            name,
            path,
            library,
            state: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn symbol<T: Copy>(&self, name: &str) -> Result<T> {
        let symbol = unsafe { self.library.get::<T>(name.as_bytes()) }.map_err(|e| {
            SymError::Library {
                path: self.path.clone(),
                message: format!("failed to resolve '{name}': {e}"),
            }
        })?;
        Ok(*symbol)
    }

    fn library_error(&self, message: String) -> SymError {
        SymError::Library {
            path: self.path.clone(),
            message,
        }
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.state
            .as_ref()
            .ok_or_else(|| SymError::NotInitialized(self.name.clone()))
    }

    fn checked_count(&self, value: c_int, what: &str) -> Result<usize> {
        usize::try_from(value)
            .map_err(|_| self.library_error(format!("{what} returned negative value {value}")))
    }
}

impl Function for ExternalFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let init: InitFn = self.symbol(ENTRY_INIT)?;
        let sparsity: SparsityFn = self.symbol(ENTRY_SPARSITY)?;
        let n_ops: NOpsFn = self.symbol(ENTRY_N_OPS)?;
        let eval: EvalFn = self.symbol(ENTRY_EVAL)?;

        let (mut n_in, mut n_out): (c_int, c_int) = (0, 0);
        let status = unsafe { init(&mut n_in, &mut n_out) };
        if status != 0 {
            return Err(self.library_error(format!("{ENTRY_INIT} returned {status}")));
        }
        let n_in = self.checked_count(n_in, ENTRY_INIT)?;
        let n_out = self.checked_count(n_out, ENTRY_INIT)?;

        let mut sizes = Vec::with_capacity(n_in + n_out);
        for i in 0..n_in + n_out {
            let (mut nrow, mut ncol): (c_int, c_int) = (0, 0);
            let index = c_int::try_from(i)
                .map_err(|_| self.library_error(format!("too many arguments ({i})")))?;
            let status = unsafe { sparsity(index, &mut nrow, &mut ncol) };
            if status != 0 {
                return Err(self.library_error(format!("{ENTRY_SPARSITY}({i}) returned {status}")));
            }
            sizes.push(self.checked_count(nrow, ENTRY_SPARSITY)? * self.checked_count(ncol, ENTRY_SPARSITY)?);
        }
        let n_ops = self.checked_count(unsafe { n_ops() }, ENTRY_N_OPS)?;

        let io = FunctionIo::new(&sizes[..n_in], &sizes[n_in..]);
        debug!(
            "Initialized '{}': {} inputs, {} outputs, {} elementary operations",
            self.name, n_in, n_out, n_ops
        );
        self.state = Some(Loaded {
            eval,
            n_ops,
            io,
            input_ptrs: Vec::with_capacity(n_in),
            output_ptrs: Vec::with_capacity(n_out),
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn n_in(&self) -> Result<usize> {
        Ok(self.loaded()?.io.inputs.len())
    }

    fn n_out(&self) -> Result<usize> {
        Ok(self.loaded()?.io.outputs.len())
    }

    fn set_input(&mut self, index: usize, values: &[f64]) -> Result<()> {
        match self.state.as_mut() {
            Some(loaded) => loaded.io.set_input(index, values),
            None => Err(SymError::NotInitialized(self.name.clone())),
        }
    }

    fn evaluate(&mut self) -> Result<()> {
        let Some(loaded) = self.state.as_mut() else {
            return Err(SymError::NotInitialized(self.name.clone()));
        };
        loaded.refresh_pointers();
        // Buffer sizes were taken from the library's own sparsity table.
        let status =
            unsafe { (loaded.eval)(loaded.input_ptrs.as_ptr(), loaded.output_ptrs.as_ptr()) };
        if status != 0 {
            return Err(self.library_error(format!("{ENTRY_EVAL} returned {status}")));
        }
        Ok(())
    }

    fn output(&self, index: usize) -> Result<&[f64]> {
        self.loaded()?.io.output(index)
    }

    fn n_elementary_ops(&self) -> Result<usize> {
        Ok(self.loaded()?.n_ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::c::{CCompiler, CRenderer, OptLevel};
    use crate::function::SxFunction;
    use crate::sx::SxMatrix;

    #[test]
    fn test_load_missing_library() {
        let err = ExternalFunction::load("/nonexistent/libmissing.so").unwrap_err();
        assert!(matches!(err, SymError::Library { .. }));
    }

    #[test]
    fn test_compiled_function_matches_interpreter() {
        let _ = env_logger::builder().is_test(true).try_init();
        let compiler = CCompiler::new();
        if !compiler.is_available() {
            eprintln!("C compiler not available, skipping test.");
            return;
        }

        let x = SxMatrix::symbolic("x", 3, 1);
        let d = x.data();
        let f0 = &(&d[0] * &d[1]) / &d[2];
        let f1 = d[0].sin() - d[2].sqrt();
        let mut interpreted =
            SxFunction::new(vec![x.clone()], vec![SxMatrix::column(vec![f0, f1])]).unwrap();
        interpreted.init().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let source = CRenderer::new()
            .render(&interpreted)
            .unwrap()
            .write_to(dir.path().join("f.c"))
            .unwrap();
        let output = dir.path().join("f.so");
        compiler.compile(&source, &output, OptLevel::None).unwrap();

        let mut external = ExternalFunction::load(&output).unwrap();
        assert_eq!(external.name(), "f");
        assert!(matches!(external.evaluate(), Err(SymError::NotInitialized(_))));
        external.init().unwrap();
        assert_eq!(external.n_in().unwrap(), 1);
        assert_eq!(external.n_out().unwrap(), 1);
        assert_eq!(
            external.n_elementary_ops().unwrap(),
            interpreted.n_elementary_ops().unwrap()
        );

        for input in [[1.5, 2.0, 4.0], [0.25, -3.0, 9.0]] {
            let expected = interpreted.call(&input).unwrap();
            let actual = external.call(&input).unwrap();
            assert_eq!(actual.len(), 2);
            for (a, e) in actual.iter().zip(&expected) {
                assert!((a - e).abs() < 1e-12, "expected {e}, got {a}");
            }
        }
    }
}
