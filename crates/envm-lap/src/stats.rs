use nalgebra::{Complex, Normed};

/// Running mean and pooled variance of complex samples.
///
/// `m2` accumulates `|x - mean|²`, i.e. the real and imaginary variances
/// summed. Partial accumulators merge with the pairwise update of Chan et al.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RunningStats {
    pub count: usize,
    pub mean: Complex<f64>,
    pub m2: f64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: Complex::new(0.0, 0.0),
            m2: 0.0,
        }
    }
}

impl RunningStats {
    pub fn push(&mut self, sample: Complex<f64>) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += (delta.conj() * (sample - self.mean)).re;
    }

    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        let weight = other.count as f64 / total as f64;
        self.mean += delta * weight;
        self.m2 += other.m2 + delta.norm_sqr() * self.count as f64 * weight;
        self.count = total;
    }

    /// Standard error of the mean relative to its modulus.
    pub fn relative_std_error(&self) -> f64 {
        if self.count < 2 {
            return f64::INFINITY;
        }
        let variance = self.m2.max(0.0) / (self.count - 1) as f64;
        let std_error = (variance / self.count as f64).sqrt();
        let scale = self.mean.norm();
        if scale == 0.0 {
            if std_error == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            std_error / scale
        }
    }
}
