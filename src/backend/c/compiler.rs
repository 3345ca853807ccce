//! Shared-object compilation with the system C compiler

use crate::error::{Result, SymError};
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Optimization variants benchmarked against each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptLevel {
    /// Compiler default, no flag passed
    None,
    O3,
    Os,
}

impl OptLevel {
    pub const ALL: [OptLevel; 3] = [OptLevel::None, OptLevel::O3, OptLevel::Os];

    /// Flags added to the command line
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            OptLevel::None => &[],
            OptLevel::O3 => &["-O3"],
            OptLevel::Os => &["-Os"],
        }
    }

    /// Suffix used in artifact names, e.g. `grad_det_O3_opt.so`
    pub fn suffix(self) -> &'static str {
        match self {
            OptLevel::None => "no_opt",
            OptLevel::O3 => "O3_opt",
            OptLevel::Os => "Os_opt",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OptLevel::None => "without optimization",
            OptLevel::O3 => "with O3 optimization",
            OptLevel::Os => "with Os optimization",
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Options for [`CCompiler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Compiler executable, looked up on `PATH`
    pub compiler: String,
    /// Flags passed after the optimization flag
    pub extra_flags: Vec<String>,
    /// Libraries appended after the output path
    pub libs: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            compiler: std::env::var("CC").unwrap_or_else(|_| "gcc".to_string()),
            extra_flags: vec!["-fPIC".to_string()],
            libs: vec!["-lm".to_string()],
        }
    }
}

impl CompileOptions {
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_extra_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_flags = flags;
        self
    }
}

/// Outcome of one compiler invocation
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub level: OptLevel,
    pub output: PathBuf,
    /// Wall-clock time of the compiler process
    pub duration: Duration,
}

/// Compiles generated C files into shared objects
#[derive(Debug, Clone, Default)]
pub struct CCompiler {
    options: CompileOptions,
}

impl CCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// True when `<compiler> --version` runs successfully
    pub fn is_available(&self) -> bool {
        match Command::new(&self.options.compiler).arg("--version").output() {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Arguments for `<compiler> -shared [opt] <extra...> <source> -o <output> <libs...>`
    pub fn args(&self, source: &Path, output: &Path, level: OptLevel) -> Vec<String> {
        let mut args = vec!["-shared".to_string()];
        args.extend(level.flags().iter().map(|f| f.to_string()));
        args.extend(self.options.extra_flags.iter().cloned());
        args.push(source.to_string_lossy().to_string());
        args.push("-o".to_string());
        args.push(output.to_string_lossy().to_string());
        args.extend(self.options.libs.iter().cloned());
        args
    }

    /// Compile `source` into the shared object `output`, blocking until the
    /// compiler exits
    pub fn compile(&self, source: &Path, output: &Path, level: OptLevel) -> Result<CompileReport> {
        let compiler = &self.options.compiler;
        let args = self.args(source, output, level);
        debug!("Running compile command: {} {}", compiler, args.join(" "));

        let start = Instant::now();
        let result = Command::new(compiler).args(&args).output().map_err(|e| {
            SymError::CompilerNotFound {
                compiler: compiler.clone(),
                source: e,
            }
        })?;
        let duration = start.elapsed();

        if !result.status.success() {
            return Err(SymError::CompilationFailed {
                source_path: source.to_path_buf(),
                status: Some(result.status),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        if !output.exists() {
            return Err(SymError::CompilationFailed {
                source_path: source.to_path_buf(),
                status: Some(result.status),
                stderr: format!("{} was not produced", output.display()),
            });
        }

        info!(
            "Compiled {} ({}) in {:.1} ms",
            output.display(),
            level,
            duration.as_secs_f64() * 1e3
        );
        Ok(CompileReport {
            level,
            output: output.to_path_buf(),
            duration,
        })
    }
}
