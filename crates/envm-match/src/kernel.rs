use serde::{Deserialize, Serialize};

use crate::environment::Environment;

/// Similarity between two environments, expected in `[0, 1]`.
pub trait EnvironmentKernel: Send + Sync {
    /// Evaluates the kernel. Either side may be a placeholder.
    fn evaluate(&self, a: &Environment, b: &Environment) -> f64;
}

impl<F> EnvironmentKernel for F
where
    F: Fn(&Environment, &Environment) -> f64 + Send + Sync,
{
    fn evaluate(&self, a: &Environment, b: &Environment) -> f64 {
        self(a, b)
    }
}

fn default_zeta() -> f64 {
    1.0
}

/// Cosine similarity of the descriptors, clipped at zero and raised to `zeta`.
///
/// Isolated atoms and placeholders carry no descriptor and are scored as lone
/// atoms: two of them are identical (1.0) and either shares nothing with a
/// site that has neighbours (0.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDotKernel {
    /// Sharpening exponent.
    #[serde(default = "default_zeta")]
    pub zeta: f64,
}

impl Default for NormalizedDotKernel {
    fn default() -> Self {
        Self {
            zeta: default_zeta(),
        }
    }
}

impl NormalizedDotKernel {
    /// Creates the kernel with the given exponent.
    pub fn new(zeta: f64) -> Self {
        Self { zeta }
    }
}

impl EnvironmentKernel for NormalizedDotKernel {
    fn evaluate(&self, a: &Environment, b: &Environment) -> f64 {
        let (fa, fb) = match (a.features(), b.features()) {
            (None, None) => return 1.0,
            (Some(fa), Some(fb)) => (fa, fb),
            _ => return 0.0,
        };
        let dot: f64 = fa.iter().zip(fb).map(|(x, y)| x * y).sum();
        let norm_a: f64 = fa.iter().map(|x| x * x).sum::<f64>().sqrt();
        let norm_b: f64 = fb.iter().map(|y| y * y).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return if norm_a == norm_b { 1.0 } else { 0.0 };
        }
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0).powf(self.zeta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_descriptors_score_one() {
        let env = Environment::real(1, vec![0.3, 0.4, 1.2]);
        let kernel = NormalizedDotKernel::new(2.0);
        assert!((kernel.evaluate(&env, &env) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn orthogonal_and_opposite_descriptors_score_zero() {
        let kernel = NormalizedDotKernel::default();
        let x = Environment::real(1, vec![1.0, 0.0]);
        let y = Environment::real(1, vec![0.0, 2.0]);
        let minus_x = Environment::real(1, vec![-1.0, 0.0]);
        assert_eq!(kernel.evaluate(&x, &y), 0.0);
        assert_eq!(kernel.evaluate(&x, &minus_x), 0.0);
    }

    #[test]
    fn placeholders_follow_isolated_atom_convention() {
        let kernel = NormalizedDotKernel::default();
        let real = Environment::real(6, vec![1.0]);
        let missing = Environment::missing(6);
        assert_eq!(kernel.evaluate(&missing, &missing), 1.0);
        assert_eq!(kernel.evaluate(&real, &missing), 0.0);
        let isolated = Environment::isolated(6);
        assert_eq!(kernel.evaluate(&isolated, &missing), 1.0);
        assert_eq!(kernel.evaluate(&isolated, &real), 0.0);
    }

    #[test]
    fn closures_are_kernels() {
        let constant = |_: &Environment, _: &Environment| 0.25;
        let env = Environment::missing(1);
        assert_eq!(constant.evaluate(&env, &env), 0.25);
    }
}
