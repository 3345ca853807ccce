//! grad-det: benchmark the gradient of a symbolic determinant, interpreted
//! and compiled as C at several optimization levels

use clap::Parser;
use std::path::PathBuf;

use symgrad::{CompileOptions, DetGradPipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "grad-det")]
#[command(about = "Compile the gradient of a symbolic determinant to C and time it")]
#[command(version)]
struct Cli {
    /// Rows and columns of the symbolic matrix, at most 16; graph size grows
    /// as n * 2^n
    #[arg(short = 'n', long, default_value_t = 7)]
    size: usize,

    /// Timed evaluations per variant
    #[arg(short, long, default_value_t = 10_000)]
    repeats: usize,

    /// Seed of the random input
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory for the generated C file and shared objects
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// C compiler (default: $CC, then gcc)
    #[arg(long)]
    cc: Option<String>,
}

fn main() {
    symgrad::init_logger();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> symgrad::Result<()> {
    let mut compile = CompileOptions::default();
    if let Some(cc) = cli.cc {
        compile = compile.with_compiler(cc);
    }
    let config = PipelineConfig::default()
        .with_size(cli.size)
        .with_repeats(cli.repeats)
        .with_seed(cli.seed)
        .with_out_dir(cli.out_dir)
        .with_compile_options(compile);

    let report = DetGradPipeline::new(config).run()?;

    println!("Generated {}", report.source.display());
    for compile in &report.compiles {
        println!(
            "Compiling {}: {} / time = {} ms",
            compile.level.description(),
            compile.output.display(),
            compile.duration.as_nanos() as f64 / 1e6
        );
    }
    for bench in &report.benches {
        println!("{bench}");
    }
    println!("max deviation from interpreter: {:e}", report.max_deviation());
    Ok(())
}
