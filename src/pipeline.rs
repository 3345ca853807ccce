//! Determinant gradient benchmark
//!
//! Builds `det(x)` for a symbolic square matrix `x`, derives its gradient
//! with respect to `vec(x)`, writes the gradient as C, compiles it once per
//! [`OptLevel`], loads each shared object back and times every variant
//! against the interpreted gradient on one random input.

use crate::backend::c::{CCompiler, CRenderer, CompileOptions, CompileReport, ExternalFunction, OptLevel};
use crate::bench::{self, BenchResult};
use crate::error::{Result, SymError};
use crate::function::{Function, SxFunction};
use crate::sx::{MAX_DET_SIZE, SxMatrix, det};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

/// Parameters of a pipeline run; `Default` gives the standard 7x7 benchmark
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rows and columns of the symbolic matrix
    pub size: usize,
    /// Timed evaluations per variant
    pub repeats: usize,
    /// Seed of the input sampler
    pub seed: u64,
    /// Directory receiving the C source and shared objects
    pub out_dir: PathBuf,
    /// Artifact base name: `<basename>.c`, `<basename>_<level>.so`
    pub basename: String,
    pub compile: CompileOptions,
    pub levels: Vec<OptLevel>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            size: 7,
            repeats: 10_000,
            seed: 0,
            out_dir: PathBuf::from("."),
            basename: "grad_det".to_string(),
            compile: CompileOptions::default(),
            levels: OptLevel::ALL.to_vec(),
        }
    }
}

impl PipelineConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_compile_options(mut self, compile: CompileOptions) -> Self {
        self.compile = compile;
        self
    }

    pub fn with_levels(mut self, levels: Vec<OptLevel>) -> Self {
        self.levels = levels;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(SymError::InvalidConfig("matrix size must be positive".to_string()));
        }
        if self.size > MAX_DET_SIZE {
            return Err(SymError::InvalidConfig(format!(
                "matrix size {} exceeds the maximum {MAX_DET_SIZE}",
                self.size
            )));
        }
        if self.repeats == 0 {
            return Err(SymError::InvalidConfig("repeat count must be positive".to_string()));
        }
        if self.basename.is_empty() {
            return Err(SymError::InvalidConfig("artifact base name is empty".to_string()));
        }
        Ok(())
    }

    pub fn source_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.c", self.basename))
    }

    pub fn object_path(&self, level: OptLevel) -> PathBuf {
        self.out_dir
            .join(format!("{}_{}.so", self.basename, level.suffix()))
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub source: PathBuf,
    /// The fixed input fed to every variant
    pub input: Vec<f64>,
    pub compiles: Vec<CompileReport>,
    /// Interpreted function first, then one entry per compiled level
    pub benches: Vec<BenchResult>,
}

impl PipelineReport {
    /// Largest deviation of any compiled output from the interpreted one
    pub fn max_deviation(&self) -> f64 {
        let Some((reference, rest)) = self.benches.split_first() else {
            return 0.0;
        };
        rest.iter()
            .map(|b| bench::max_abs_difference(&reference.first_output, &b.first_output))
            .fold(0.0, f64::max)
    }
}

/// Sequential driver of the determinant gradient benchmark
#[derive(Debug, Clone, Default)]
pub struct DetGradPipeline {
    config: PipelineConfig,
}

impl DetGradPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Initialized gradient of `det(x)` with respect to `vec(x)`
    pub fn build_gradient(&self) -> Result<SxFunction> {
        let n = self.config.size;
        let x = SxMatrix::symbolic("x", n, n);
        let f = det(&x)?;
        let x = x.vec();

        let mut fcn = SxFunction::new(vec![x.clone()], vec![SxMatrix::scalar(f)])?.with_name("det");
        fcn.init()?;
        let gf = fcn.grad(0, 0)?;

        let mut gfcn = SxFunction::new(vec![x], vec![gf])?.with_name(self.config.basename.clone());
        gfcn.init()?;
        info!(
            "Built gradient of a {n}x{n} determinant: {} elementary operations (determinant {})",
            gfcn.n_elementary_ops()?,
            fcn.n_elementary_ops()?
        );
        Ok(gfcn)
    }

    /// Uniform samples on `[0, 1)`, one per element of `x`
    pub fn sample_input(&self) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let n = self.config.size * self.config.size;
        (0..n).map(|_| rng.gen_range(0.0..1.0)).collect()
    }

    /// Write the C source of `function` and return its path
    pub fn generate_source(&self, function: &SxFunction) -> Result<PathBuf> {
        let code = CRenderer::new().render(function)?;
        let path = code.write_to(self.config.source_path())?;
        info!("Generated {} ({} bytes)", path.display(), code.len());
        Ok(path)
    }

    /// Compile the source once per configured level, in order
    pub fn compile_all(&self, source: &std::path::Path) -> Result<Vec<CompileReport>> {
        let compiler = CCompiler::with_options(self.config.compile.clone());
        self.config
            .levels
            .iter()
            .map(|&level| {
                info!("Compiling {}: {}", level.description(), self.config.object_path(level).display());
                compiler.compile(source, &self.config.object_path(level), level)
            })
            .collect()
    }

    /// Load and initialize each compiled variant
    pub fn load_all(&self, compiles: &[CompileReport]) -> Result<Vec<ExternalFunction>> {
        compiles
            .iter()
            .map(|report| {
                let mut f = ExternalFunction::load(&report.output)?;
                f.init()?;
                Ok(f)
            })
            .collect()
    }

    pub fn run(&self) -> Result<PipelineReport> {
        self.config.validate()?;
        std::fs::create_dir_all(&self.config.out_dir)?;

        let mut gfcn = self.build_gradient()?;
        let input = self.sample_input();
        let source = self.generate_source(&gfcn)?;
        let compiles = self.compile_all(&source)?;
        let mut externals = self.load_all(&compiles)?;

        let mut benches = Vec::with_capacity(externals.len() + 1);
        benches.push(bench::benchmark(&mut gfcn, &input, self.config.repeats)?);
        for f in externals.iter_mut() {
            benches.push(bench::benchmark(f, &input, self.config.repeats)?);
        }

        let report = PipelineReport {
            source,
            input,
            compiles,
            benches,
        };
        let deviation = report.max_deviation();
        if deviation > 1e-9 {
            warn!("Compiled outputs deviate from the interpreter by up to {deviation:e}");
        }
        Ok(report)
    }
}
