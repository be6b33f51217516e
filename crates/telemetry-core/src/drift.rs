use crate::spec::DriftSpec;
use rand::Rng;

/// Fraction of the distance to `target` recovered on every step.
pub const MEAN_REVERSION_RATE: f64 = 0.1;

impl DriftSpec {
    /// Advances one scalar by a bounded mean-reverting random walk.
    ///
    /// Without a previous value the walk starts at `baseline` with noise of
    /// full `volatility`; afterwards each step pulls 10% of the way toward
    /// `target` with half-`volatility` noise. The result always lies in
    /// `[min, max]`.
    pub fn next_value<R: Rng + ?Sized>(&self, current: Option<f64>, rng: &mut R) -> f64 {
        let next = match current {
            None => self.baseline + noise(rng, self.volatility),
            Some(current) => {
                let mean_reversion = (self.target - current) * MEAN_REVERSION_RATE;
                current + mean_reversion + noise(rng, self.volatility / 2.0)
            }
        };
        next.clamp(self.min, self.max)
    }
}

fn noise<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}
