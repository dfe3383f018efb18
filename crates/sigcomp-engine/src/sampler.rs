//! Sample-by-sample evaluation of expressions over a grid.
//!
//! Every grid point yields exactly one value. A point whose evaluation
//! fails or is non-finite comes back as `None`, and callers substitute the
//! sentinel that fits the array they are filling.

use num_complex::Complex64;
use sigcomp_symbolic::{compile_with_vars, CompiledExpr, Scalar, SymExpr};

/// `count` evenly spaced points from `start` to `stop`, endpoints exact
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![stop];
    }
    let step = (stop - start) / ((count - 1) as f64);
    let mut data: Vec<f64> = (0..count).map(|idx| start + (idx as f64) * step).collect();
    if let Some(last) = data.last_mut() {
        *last = stop;
    }
    data
}

/// `count` points from `10^start` to `10^stop`, evenly spaced in the exponent
pub fn logspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    linspace(start, stop, count)
        .into_iter()
        .map(|exponent| 10f64.powf(exponent))
        .collect()
}

/// Evaluate `expr` with `var` bound to each domain value
pub fn sample<T: Scalar>(expr: &SymExpr, var: &str, domain: &[T]) -> Vec<Option<T>> {
    let compiled = match compile_with_vars(expr, &[var]) {
        Ok(compiled) => compiled,
        Err(err) => {
            log::debug!("'{expr}' cannot be sampled: {err}");
            return vec![None; domain.len()];
        }
    };
    sample_compiled(&compiled, domain)
}

fn sample_compiled<T: Scalar>(compiled: &CompiledExpr, domain: &[T]) -> Vec<Option<T>> {
    compiled
        .eval_range(domain)
        .into_iter()
        .zip(domain)
        .map(|(value, point)| match value {
            Ok(v) if v.is_finite() => Some(v),
            Ok(v) => {
                log::trace!("non-finite sample {v:?} at {point:?}");
                None
            }
            Err(err) => {
                log::trace!("sample at {point:?} failed: {err}");
                None
            }
        })
        .collect()
}

pub fn sample_real(expr: &SymExpr, var: &str, domain: &[f64]) -> Vec<Option<f64>> {
    sample(expr, var, domain)
}

/// Evaluate along the imaginary axis, `var = j*omega`
pub fn sample_imaginary_axis(expr: &SymExpr, var: &str, omegas: &[f64]) -> Vec<Option<Complex64>> {
    let domain: Vec<Complex64> = omegas.iter().map(|&w| Complex64::new(0.0, w)).collect();
    sample(expr, var, &domain)
}

/// Replace missing samples with `sentinel`
pub fn fill(values: Vec<Option<f64>>, sentinel: f64) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(sentinel)).collect()
}

/// Evaluate a constant or single-variable expression at one point
pub fn eval_at(expr: &SymExpr, var: &str, point: f64) -> Option<f64> {
    sample_real(expr, var, &[point]).into_iter().next().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigcomp_parser::parse;

    #[test]
    fn test_linspace_endpoints() {
        let xs = linspace(-5.0, 5.0, 200);
        assert_eq!(xs.len(), 200);
        assert_eq!(xs[0], -5.0);
        assert_eq!(xs[199], 5.0);
        assert!((xs[1] - xs[0] - 10.0 / 199.0).abs() < 1e-12);
        assert_eq!(linspace(0.0, 1.0, 1), vec![1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_logspace_decades() {
        let ws = logspace(-2.0, 2.0, 100);
        assert_eq!(ws.len(), 100);
        assert!((ws[0] - 0.01).abs() < 1e-15);
        assert!((ws[99] - 100.0).abs() < 1e-9);
        assert!(ws.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_failed_samples_become_none() {
        let expr = parse("log(t)").unwrap();
        let values = sample_real(&expr, "t", &[-1.0, 0.0, 1.0]);
        assert_eq!(values[0], None); // NaN
        assert_eq!(values[1], None); // -inf
        assert_eq!(values[2], Some(0.0));
        assert_eq!(fill(values, -100.0), vec![-100.0, -100.0, 0.0]);
    }

    #[test]
    fn test_foreign_variable_fails_every_sample() {
        let expr = parse("t*s").unwrap();
        let values = sample_real(&expr, "t", &[0.0, 1.0]);
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn test_imaginary_axis() {
        let expr = parse("1/(s+1)").unwrap();
        let values = sample_imaginary_axis(&expr, "s", &[1.0]);
        let h = values[0].unwrap();
        assert!((h - Complex64::new(0.5, -0.5)).norm() < 1e-12);
    }

    #[test]
    fn test_eval_at_constant() {
        let expr = parse("2*pi").unwrap();
        let value = eval_at(&expr, "s", 0.0).unwrap();
        assert!((value - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
