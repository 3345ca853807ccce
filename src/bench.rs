//! Wall-clock timing of repeated evaluations

use crate::error::{Result, SymError};
use crate::function::Function;
use log::info;
use std::fmt;
use std::time::{Duration, Instant};

/// Timing of one function variant
#[derive(Debug, Clone)]
pub struct BenchResult {
    pub name: String,
    pub repeats: usize,
    /// Time spent in all timed evaluations
    pub total: Duration,
    pub per_call: Duration,
    /// Output 0 of the untimed first evaluation
    pub first_output: Vec<f64>,
    /// Operation count reported by the variant itself
    pub n_ops: usize,
}

impl BenchResult {
    pub fn per_call_ms(&self) -> f64 {
        self.per_call.as_nanos() as f64 / 1e6
    }

    /// Average time per elementary operation in nanoseconds
    pub fn time_per_op_ns(&self) -> f64 {
        if self.n_ops == 0 {
            return 0.0;
        }
        self.per_call.as_nanos() as f64 / self.n_ops as f64
    }
}

impl fmt::Display for BenchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        writeln!(f, "  result = {:?}", self.first_output)?;
        writeln!(f, "  time = {} ms", self.per_call_ms())?;
        writeln!(f, "  number of elementary operations: {}", self.n_ops)?;
        write!(f, "  time per elementary operation: {} ns", self.time_per_op_ns())
    }
}

/// Evaluate `function` on `input` `repeats` times and average the wall-clock time
///
/// Input 0 is set once. One untimed evaluation runs first and provides
/// `first_output`.
pub fn benchmark(function: &mut dyn Function, input: &[f64], repeats: usize) -> Result<BenchResult> {
    if repeats == 0 {
        return Err(SymError::InvalidConfig(
            "repeat count must be positive".to_string(),
        ));
    }
    function.set_input(0, input)?;
    function.evaluate()?;
    let first_output = function.output(0)?.to_vec();

    let start = Instant::now();
    for _ in 0..repeats {
        function.evaluate()?;
    }
    let total = start.elapsed();
    let per_call = average_duration(total, repeats);

    let result = BenchResult {
        name: function.name().to_string(),
        repeats,
        total,
        per_call,
        first_output,
        n_ops: function.n_elementary_ops()?,
    };
    info!(
        "{}: {:.6} ms per call over {} calls",
        result.name,
        result.per_call_ms(),
        repeats
    );
    Ok(result)
}

/// `total / repeats` without narrowing the count
fn average_duration(total: Duration, repeats: usize) -> Duration {
    let nanos = total.as_nanos() / repeats as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Largest absolute elementwise difference, infinite on a length mismatch
pub fn max_abs_difference(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::SxFunction;
    use crate::sx::SxMatrix;

    fn identity_function() -> SxFunction {
        let x = SxMatrix::symbolic("x", 2, 1);
        let mut f = SxFunction::new(vec![x.clone()], vec![x]).unwrap().with_name("id");
        f.init().unwrap();
        f
    }

    #[test]
    fn test_benchmark() {
        let mut f = identity_function();
        let result = benchmark(&mut f, &[1.0, 2.0], 100).unwrap();
        assert_eq!(result.name, "id");
        assert_eq!(result.repeats, 100);
        assert_eq!(result.first_output, vec![1.0, 2.0]);
        assert_eq!(result.n_ops, 4);
        assert!(result.per_call_ms().is_finite());
        assert!(result.per_call_ms() >= 0.0);
        assert!(result.time_per_op_ns() >= 0.0);
        assert!(result.per_call <= result.total);
    }

    #[test]
    fn test_benchmark_rejects_zero_repeats() {
        let mut f = identity_function();
        assert!(matches!(
            benchmark(&mut f, &[1.0, 2.0], 0),
            Err(SymError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_benchmark_requires_init() {
        let x = SxMatrix::symbolic("x", 1, 1);
        let mut f = SxFunction::new(vec![x.clone()], vec![x]).unwrap();
        assert!(matches!(
            benchmark(&mut f, &[1.0], 10),
            Err(SymError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_display() {
        let result = BenchResult {
            name: "f".to_string(),
            repeats: 1,
            total: Duration::from_millis(2),
            per_call: Duration::from_millis(2),
            first_output: vec![0.5],
            n_ops: 4,
        };
        assert_eq!(
            result.to_string(),
            "f:\n  result = [0.5]\n  time = 2 ms\n  number of elementary operations: 4\n  time per elementary operation: 500000 ns"
        );
    }

    #[test]
    fn test_average_with_large_repeat_count() {
        let total = Duration::from_secs(10_000);
        let repeats = u32::MAX as usize * 4;
        let expected = 10_000e9 / repeats as f64;
        let actual = average_duration(total, repeats).as_nanos() as f64;
        assert!((actual - expected).abs() <= 1.0);
        assert_eq!(average_duration(Duration::from_millis(6), 3), Duration::from_millis(2));
    }

    #[test]
    fn test_max_abs_difference() {
        assert_eq!(max_abs_difference(&[1.0, 2.0], &[1.5, 1.0]), 1.0);
        assert_eq!(max_abs_difference(&[], &[]), 0.0);
        assert!(max_abs_difference(&[1.0], &[]).is_infinite());
    }
}
