//! Time sampling: the policy mapping sample indices to times.
//!
//! Every scalar and array property references one entry of its archive's
//! time-sampling table. Entry 0 is always the identity sampling used for
//! static properties.

use crate::core::SampleInterp;
use crate::util::{Chrono, Error, Result};

/// Sentinel time-per-cycle marking acyclic sampling on disk.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = -f64::MAX;

/// Kind of time sampling.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// `start_time + index * time_per_cycle`. A cyclic sampling with one
    /// sample per cycle.
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// Repeating pattern: sample `i` lands at
    /// `(i / n) * time_per_cycle + times[i % n]`.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },

    /// One explicit time per sample.
    Acyclic { times: Vec<Chrono> },
}

/// Time sampling of a property.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSampling {
    sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// The static sampling stored at table index 0.
    pub fn identity() -> Self {
        Self::uniform(1.0, 0.0)
    }

    /// One sample every `time_per_cycle`, starting at `start_time`.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    /// Cyclic sampling; a single stored time collapses to uniform.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        if times.len() == 1 {
            return Self::uniform(time_per_cycle, times[0]);
        }
        Self {
            sampling_type: TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            },
        }
    }

    /// Explicit times, one per sample, non-decreasing.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    /// Rebuild from the on-disk pair (time per cycle, stored times).
    pub fn from_stored(time_per_cycle: Chrono, times: Vec<Chrono>) -> Result<Self> {
        if times.is_empty() {
            return Err(Error::malformed("time sampling without stored times"));
        }
        let ts = if time_per_cycle == ACYCLIC_TIME_PER_CYCLE {
            Self::acyclic(times)
        } else {
            Self::cyclic(time_per_cycle, times)
        };
        ts.validate().map_err(|e| Error::malformed(e.to_string()))?;
        Ok(ts)
    }

    #[inline]
    pub fn sampling_type(&self) -> &TimeSamplingType {
        &self.sampling_type
    }

    /// Time per cycle as written to disk.
    pub fn time_per_cycle(&self) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Uniform { time_per_cycle, .. }
            | TimeSamplingType::Cyclic { time_per_cycle, .. } => *time_per_cycle,
            TimeSamplingType::Acyclic { .. } => ACYCLIC_TIME_PER_CYCLE,
        }
    }

    /// Stored times as written to disk.
    pub fn stored_times(&self) -> &[Chrono] {
        match &self.sampling_type {
            TimeSamplingType::Uniform { start_time, .. } => std::slice::from_ref(start_time),
            TimeSamplingType::Cyclic { times, .. } | TimeSamplingType::Acyclic { times } => times,
        }
    }

    /// Samples per cycle; the total count for acyclic sampling.
    pub fn samples_per_cycle(&self) -> usize {
        self.stored_times().len()
    }

    /// True for explicit per-sample times.
    #[inline]
    pub fn is_acyclic(&self) -> bool {
        matches!(self.sampling_type, TimeSamplingType::Acyclic { .. })
    }

    /// True for the uniform 1.0/0.0 sampling used by static properties.
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Check the ordering invariants.
    pub fn validate(&self) -> Result<()> {
        let times = self.stored_times();
        if times.iter().any(|t| !t.is_finite()) {
            return Err(Error::invalid_state("time sampling has non-finite times"));
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid_state("time sampling times must be non-decreasing"));
        }
        if !self.is_acyclic() {
            let tpc = self.time_per_cycle();
            if !(tpc.is_finite() && tpc > 0.0) {
                return Err(Error::invalid_state(format!(
                    "time per cycle must be positive, got {tpc}"
                )));
            }
        }
        Ok(())
    }

    /// Time of sample `index`.
    ///
    /// Total for uniform and cyclic sampling; acyclic sampling fails past
    /// its stored times.
    pub fn sample_time(&self, index: usize) -> Result<Chrono> {
        if let TimeSamplingType::Acyclic { times } = &self.sampling_type {
            if index >= times.len() {
                return Err(Error::OutOfRange {
                    what: "acyclic sample time",
                    index,
                    count: times.len(),
                });
            }
        }
        Ok(self.time_at(index))
    }

    /// Caller guarantees `index` is valid for acyclic sampling.
    fn time_at(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => start_time + index as Chrono * time_per_cycle,
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                let cycle = index / times.len();
                times[index % times.len()] + cycle as Chrono * time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => times[index],
        }
    }

    /// Number of addressable samples given `num_samples` written.
    fn usable(&self, num_samples: usize) -> usize {
        match &self.sampling_type {
            TimeSamplingType::Acyclic { times } => num_samples.min(times.len()),
            _ => num_samples,
        }
    }

    /// Largest index whose time is `<= time`, clamped to `[0, num_samples-1]`.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> usize {
        let n = self.usable(num_samples);
        if n <= 1 || time < self.time_at(0) {
            return 0;
        }
        if time >= self.time_at(n - 1) {
            return n - 1;
        }

        if let TimeSamplingType::Uniform {
            time_per_cycle,
            start_time,
        } = &self.sampling_type
        {
            // Rounding in the division can land one step off.
            let mut idx = (((time - start_time) / time_per_cycle).floor().max(0.0) as usize).min(n - 1);
            while idx > 0 && self.time_at(idx) > time {
                idx -= 1;
            }
            while idx + 1 < n && self.time_at(idx + 1) <= time {
                idx += 1;
            }
            return idx;
        }

        // First index whose time exceeds `time`, minus one.
        let (mut lo, mut hi) = (0, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.time_at(mid) <= time {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo.saturating_sub(1)
    }

    /// Smallest index whose time is `>= time`, clamped to `[0, num_samples-1]`.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> usize {
        let n = self.usable(num_samples);
        if n == 0 {
            return 0;
        }
        if time <= self.time_at(0) {
            return 0;
        }
        if time > self.time_at(n - 1) {
            return n - 1;
        }
        // First index whose time is not below `time`.
        let (mut lo, mut hi) = (0, n - 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.time_at(mid) < time {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Whichever of floor/ceil is closer to `time`; ties go to floor.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> usize {
        let floor = self.floor_index(time, num_samples);
        let ceil = self.ceil_index(time, num_samples);
        if floor == ceil {
            return floor;
        }
        let to_floor = (time - self.time_at(floor)).abs();
        let to_ceil = (self.time_at(ceil) - time).abs();
        if to_ceil < to_floor {
            ceil
        } else {
            floor
        }
    }

    /// Bracketing samples and blend factor for `time`.
    pub fn interp(&self, time: Chrono, num_samples: usize) -> SampleInterp {
        let floor = self.floor_index(time, num_samples);
        let ceil = self.ceil_index(time, num_samples);
        if floor == ceil || self.usable(num_samples) == 0 {
            return SampleInterp::exact(floor);
        }
        let (t0, t1) = (self.time_at(floor), self.time_at(ceil));
        let alpha = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
        SampleInterp::lerp(floor, ceil, alpha)
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_sampling() -> TimeSampling {
        TimeSampling::cyclic(3.0, vec![1.0, 2.0, 3.0])
    }

    #[test]
    fn test_uniform_sampling() {
        let ts = TimeSampling::uniform(1.0 / 24.0, 0.0);
        assert_eq!(ts.sample_time(0).unwrap(), 0.0);
        assert!((ts.sample_time(24).unwrap() - 1.0).abs() < 1e-10);
        assert!((ts.sample_time(48).unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_cyclic_sample_times() {
        let ts = cube_sampling();
        let times: Vec<_> = (0..6).map(|i| ts.sample_time(i).unwrap()).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_acyclic_bounds() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);
        assert_eq!(ts.sample_time(3).unwrap(), 2.0);
        assert!(matches!(ts.sample_time(4), Err(Error::OutOfRange { .. })));
        // Requests past the stored times clamp to the last stored index.
        assert_eq!(ts.floor_index(10.0, 100), 3);
    }

    #[test]
    fn test_cube_queries() {
        let ts = cube_sampling();
        assert_eq!(ts.near_index(1.1, 3), 0);
        assert_eq!(ts.ceil_index(1.1, 3), 1);
        assert_eq!(ts.floor_index(3.1, 3), 2);
        assert_eq!(ts.floor_index(0.0, 3), 0);
        assert_eq!(ts.ceil_index(99.0, 3), 2);
    }

    #[test]
    fn test_near_ties_go_to_floor() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        assert_eq!(ts.near_index(2.5, 10), 2);
        assert_eq!(ts.near_index(2.51, 10), 3);
    }

    #[test]
    fn test_floor_of_sample_time_is_identity() {
        let samplings = [
            TimeSampling::uniform(1.0 / 24.0, 1.0),
            cube_sampling(),
            TimeSampling::cyclic(1.0, vec![0.0, 0.25, 0.5]),
            TimeSampling::acyclic(vec![-1.0, 0.0, 0.3, 7.5, 9.0]),
        ];
        for ts in &samplings {
            let n = if ts.is_acyclic() { ts.samples_per_cycle() } else { 50 };
            for i in 0..n {
                let t = ts.sample_time(i).unwrap();
                assert_eq!(ts.floor_index(t, n), i, "{ts:?} index {i}");
                assert_eq!(ts.ceil_index(t, n), i, "{ts:?} index {i}");
                if i + 1 < n {
                    assert!(ts.sample_time(i + 1).unwrap() >= t);
                }
            }
        }
    }

    #[test]
    fn test_repeated_acyclic_times() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.0, 1.0, 1.0, 2.0]);
        assert_eq!(ts.floor_index(0.0, 5), 1);
        assert_eq!(ts.ceil_index(0.0, 5), 0);
        assert_eq!(ts.floor_index(1.0, 5), 3);
        assert_eq!(ts.ceil_index(1.0, 5), 2);
        assert_eq!(ts.ceil_index(0.5, 5), 2);
        assert_eq!(ts.floor_index(0.5, 5), 1);
    }

    #[test]
    fn test_single_cyclic_time_is_uniform() {
        let ts = TimeSampling::cyclic(0.5, vec![2.0]);
        assert!(matches!(ts.sampling_type(), TimeSamplingType::Uniform { .. }));
        assert_eq!(ts.sample_time(2).unwrap(), 3.0);
    }

    #[test]
    fn test_stored_roundtrip() {
        for ts in [TimeSampling::identity(), cube_sampling(), TimeSampling::acyclic(vec![0.0, 4.0])] {
            let back = TimeSampling::from_stored(ts.time_per_cycle(), ts.stored_times().to_vec()).unwrap();
            assert_eq!(back, ts);
        }
        assert!(TimeSampling::from_stored(1.0, vec![]).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(TimeSampling::cyclic(1.0, vec![0.5, 0.1]).validate().is_err());
        assert!(TimeSampling::uniform(0.0, 0.0).validate().is_err());
        assert!(TimeSampling::acyclic(vec![0.0, 0.0, 1.0]).validate().is_ok());
    }

    #[test]
    fn test_interp() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        let i = ts.interp(2.25, 10);
        assert_eq!((i.floor_index, i.ceil_index), (2, 3));
        assert!((i.alpha - 0.25).abs() < 1e-12);
        assert!(ts.interp(3.0, 10).is_exact());
    }
}
