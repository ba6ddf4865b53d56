//! Provides [`RunningAverage`], a moving-average filter for smoothing noisy analog readings.

use tinyvec::ArrayVec;

/// The largest window a [`RunningAverage`] can be configured with unless a different capacity is requested.
pub const MAX_WINDOW_LEN: usize = 32;

/// A moving average over the most recent samples, backed by a circular buffer of fixed capacity `N`.
///
/// The window length is chosen at runtime (anywhere from 2 to `N`) and cannot change afterwards. Until the window
/// has been filled, the average is taken over the samples seen so far rather than over the whole (zero-initialized)
/// window, so early readings are not dragged towards zero.
#[derive(Clone, Debug, PartialEq)]
pub struct RunningAverage<const N: usize = MAX_WINDOW_LEN> {
    /// The window; its length is the configured window length.
    samples: ArrayVec<[u16; N]>,
    /// Sum of every value in `samples`.
    sum: u32,
    /// Position the next sample will be written to.
    index: usize,
    /// Number of samples written so far, saturating at the window length.
    count: usize,
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for RunningAverage<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "RunningAverage {{ len: {}, count: {}, sum: {} }}",
            self.samples.len(),
            self.count,
            self.sum
        );
    }
}

impl<const N: usize> RunningAverage<N> {
    /// Constructs a [`RunningAverage`] over a window of `length` samples.
    ///
    /// Returns `None` when the length is meaningless (0 or 1 samples) or exceeds the capacity `N`.
    pub fn new(length: usize) -> Option<Self> {
        if length < 2 || length > N {
            return None;
        }
        let mut samples = ArrayVec::new();
        samples.resize(length, 0);
        Some(Self {
            samples,
            sum: 0,
            index: 0,
            count: 0,
        })
    }

    /// Adds a sample to the window, evicting the oldest one if the window is full, and returns the new average.
    pub fn push(&mut self, value: u16) -> u16 {
        let slot = &mut self.samples[self.index];
        self.sum -= u32::from(*slot);
        *slot = value;
        self.sum += u32::from(value);

        self.index = (self.index + 1) % self.samples.len();
        if self.count < self.samples.len() {
            self.count += 1;
        }

        // count is at least 1 here since a sample was just written
        (self.sum / self.count as u32) as u16
    }

    /// Returns the configured window length.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns the number of valid samples in the window.
    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_meaningless_lengths() {
        assert_eq!(None, RunningAverage::<MAX_WINDOW_LEN>::new(0));
        assert_eq!(None, RunningAverage::<MAX_WINDOW_LEN>::new(1));
    }

    #[test]
    fn rejects_lengths_beyond_capacity() {
        assert_eq!(None, RunningAverage::<4>::new(5));
        assert!(RunningAverage::<4>::new(4).is_some());
    }

    #[test]
    fn new_is_zeroed() {
        let average = RunningAverage::<MAX_WINDOW_LEN>::new(8).unwrap();
        assert_eq!(8, average.len(), "Expected left but got right");
        assert_eq!(0, average.count(), "Expected left but got right");
        assert!(average.samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn averages_over_samples_seen_before_window_fills() {
        let mut average = RunningAverage::<MAX_WINDOW_LEN>::new(4).unwrap();
        assert_eq!(100, average.push(100), "Expected left but got right");
        assert_eq!(150, average.push(200), "Expected left but got right");
        assert_eq!(200, average.push(300), "Expected left but got right");
        assert_eq!(3, average.count(), "Expected left but got right");
    }

    #[test]
    fn slides_once_window_is_full() {
        let mut average = RunningAverage::<MAX_WINDOW_LEN>::new(3).unwrap();
        average.push(10);
        average.push(20);
        assert_eq!(20, average.push(30), "Expected left but got right");
        // 10 is evicted
        assert_eq!(30, average.push(40), "Expected left but got right");
        // 20 is evicted
        assert_eq!(40, average.push(50), "Expected left but got right");
        assert_eq!(3, average.count(), "Count should saturate at the window length");
    }

    #[test]
    fn integer_division_truncates() {
        let mut average = RunningAverage::<MAX_WINDOW_LEN>::new(2).unwrap();
        average.push(1);
        assert_eq!(1, average.push(2), "Expected left but got right");
    }

    #[test]
    fn matches_mean_of_last_window_for_long_runs() {
        const LEN: usize = 5;
        let mut average = RunningAverage::<MAX_WINDOW_LEN>::new(LEN).unwrap();
        let inputs: [u16; 12] = [1023, 0, 512, 7, 8, 900, 333, 1, 64, 777, 250, 1000];
        for (i, &input) in inputs.iter().enumerate() {
            let actual = average.push(input);
            let start = (i + 1).saturating_sub(LEN);
            let window = &inputs[start..=i];
            let expected = window.iter().map(|&v| u32::from(v)).sum::<u32>() / window.len() as u32;
            assert_eq!(expected as u16, actual, "Mismatch after sample {}", i);
        }
    }
}
