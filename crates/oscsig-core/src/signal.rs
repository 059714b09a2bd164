use std::time::{Duration, Instant};

/// Multi-component value that glides linearly toward its latest target.
///
/// Interpolation is evaluated lazily from wall-clock time, so the signal
/// never needs to be ticked. Every `*_at` method takes the instant
/// explicitly; the plain forms read `Instant::now()`.
#[derive(Clone, Debug)]
pub struct Ramp {
    from: Vec<f64>,
    to: Vec<f64>,
    start: Instant,
    time: Duration,
}

impl Ramp {
    /// A settled signal of `width` zero components.
    pub fn new(width: usize) -> Self {
        Self {
            from: vec![0.0; width],
            to: vec![0.0; width],
            start: Instant::now(),
            time: Duration::ZERO,
        }
    }

    /// Number of components currently carried.
    pub fn width(&self) -> usize {
        self.to.len()
    }

    /// Transition time of the last assignment.
    pub fn ramp(&self) -> Duration {
        self.time
    }

    /// Values being approached.
    pub fn target(&self) -> &[f64] {
        &self.to
    }

    pub fn set_target(&mut self, target: &[f64], ramp: Duration) {
        self.set_target_at(target, ramp, Instant::now());
    }

    /// Start a new transition from wherever the signal is at `now`.
    ///
    /// A target of a different length re-shapes the signal; components
    /// that did not exist before start from 0.
    pub fn set_target_at(&mut self, target: &[f64], ramp: Duration, now: Instant) {
        let mut from = self.values_at(now);
        from.resize(target.len(), 0.0);
        self.from = from;
        self.to = target.to_vec();
        self.start = now;
        self.time = ramp;
    }

    pub fn values(&self) -> Vec<f64> {
        self.values_at(Instant::now())
    }

    /// Interpolated components at `now`.
    pub fn values_at(&self, now: Instant) -> Vec<f64> {
        let t = self.progress_at(now);
        if t >= 1.0 {
            return self.to.clone();
        }
        self.from
            .iter()
            .zip(&self.to)
            .map(|(a, b)| a + (b - a) * t)
            .collect()
    }

    /// Transition progress in [0, 1].
    pub fn progress_at(&self, now: Instant) -> f64 {
        if self.time.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f64() / self.time.as_secs_f64()).min(1.0)
    }

    pub fn is_settled_at(&self, now: Instant) -> bool {
        self.progress_at(now) >= 1.0
    }
}
