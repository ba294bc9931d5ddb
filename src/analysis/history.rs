use super::spectrum::Complex32;
use super::AnalysisError;

/// One analyzed frame, borrowed from a [`History`]
#[derive(Debug, Clone, Copy)]
pub struct TimeSlice<'a> {
    pub samples: &'a [f32],
    pub bins: &'a [Complex32],
    pub magnitudes: &'a [f32],
    pub rms: f32,
}

/// A freshly appended slice whose spectral part is still to be filled in
pub struct TimeSliceMut<'a> {
    pub samples: &'a [f32],
    pub bins: &'a mut [Complex32],
    pub magnitudes: &'a mut [f32],
}

/// Bounded, chronological history of time slices
///
/// Slices live in flat arrays used as a ring indexed by `(head, len)`, so
/// appending and evicting are O(1) and no per-slice allocation happens after
/// construction. Index 0 is always the oldest slice.
pub struct History {
    frame_len: usize,
    bin_count: usize,
    capacity: usize,
    head: usize,
    len: usize,
    samples: Vec<f32>,
    bins: Vec<Complex32>,
    magnitudes: Vec<f32>,
    rms: Vec<f32>,
}

impl History {
    /// Allocate room for `capacity` slices of `frame_len` samples
    ///
    /// # Panics
    ///
    /// Panics if `frame_len` or `capacity` is zero.
    pub fn new(frame_len: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "History capacity must be greater than zero");
        assert!(frame_len > 0, "History frame length must be greater than zero");

        let bin_count = frame_len / 2;
        Self {
            frame_len,
            bin_count,
            capacity,
            head: 0,
            len: 0,
            samples: vec![0.0; frame_len * capacity],
            bins: vec![Complex32::new(0.0, 0.0); bin_count * capacity],
            magnitudes: vec![0.0; bin_count * capacity],
            rms: vec![0.0; capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) % self.capacity
    }

    /// Append a slice built from `samples`, evicting the oldest one if full
    ///
    /// Bins and magnitudes of the new slice start zeroed; the returned view
    /// lets the caller fill them in place.
    pub fn append(&mut self, samples: &[f32], rms: f32) -> Result<TimeSliceMut<'_>, AnalysisError> {
        if samples.len() != self.frame_len {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.frame_len,
                actual: samples.len(),
            });
        }

        let slot = if self.is_full() {
            let oldest = self.head;
            self.head = (self.head + 1) % self.capacity;
            oldest
        } else {
            let slot = self.slot(self.len);
            self.len += 1;
            slot
        };

        let (f, b) = (self.frame_len, self.bin_count);
        self.rms[slot] = rms;
        self.samples[slot * f..(slot + 1) * f].copy_from_slice(samples);

        let bins = &mut self.bins[slot * b..(slot + 1) * b];
        bins.fill(Complex32::new(0.0, 0.0));
        let magnitudes = &mut self.magnitudes[slot * b..(slot + 1) * b];
        magnitudes.fill(0.0);

        Ok(TimeSliceMut {
            samples: &self.samples[slot * f..(slot + 1) * f],
            bins,
            magnitudes,
        })
    }

    /// Slice at chronological `index` (0 = oldest)
    pub fn get(&self, index: usize) -> Option<TimeSlice<'_>> {
        if index >= self.len {
            return None;
        }
        let slot = self.slot(index);
        let (f, b) = (self.frame_len, self.bin_count);
        Some(TimeSlice {
            samples: &self.samples[slot * f..(slot + 1) * f],
            bins: &self.bins[slot * b..(slot + 1) * b],
            magnitudes: &self.magnitudes[slot * b..(slot + 1) * b],
            rms: self.rms[slot],
        })
    }

    /// Most recently appended slice
    pub fn latest(&self) -> Result<TimeSlice<'_>, AnalysisError> {
        self.len
            .checked_sub(1)
            .and_then(|index| self.get(index))
            .ok_or(AnalysisError::EmptyHistory)
    }

    pub fn oldest(&self) -> Option<TimeSlice<'_>> {
        self.get(0)
    }

    /// Slices from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = TimeSlice<'_>> + '_ {
        (0..self.len).filter_map(move |index| self.get(index))
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Raw sample at flattened offset `slice_index * frame_len + i`
    pub fn sample_at(&self, offset: usize) -> Option<f32> {
        self.flat_index(offset, self.frame_len)
            .map(|idx| self.samples[idx])
    }

    /// Bin at flattened offset `slice_index * bin_count + i`
    pub fn bin_at(&self, offset: usize) -> Option<Complex32> {
        self.flat_index(offset, self.bin_count)
            .map(|idx| self.bins[idx])
    }

    /// Magnitude at flattened offset `slice_index * bin_count + i`
    pub fn magnitude_at(&self, offset: usize) -> Option<f32> {
        self.flat_index(offset, self.bin_count)
            .map(|idx| self.magnitudes[idx])
    }

    fn flat_index(&self, offset: usize, stride: usize) -> Option<usize> {
        if stride == 0 {
            return None;
        }
        let (index, within) = (offset / stride, offset % stride);
        (index < self.len).then(|| self.slot(index) * stride + within)
    }

    /// The stored region of `data` in chronological order, as two runs
    fn runs<'a, T>(&self, data: &'a [T], stride: usize) -> (&'a [T], &'a [T]) {
        let first = (self.capacity - self.head).min(self.len);
        let second = self.len - first;
        (
            &data[self.head * stride..(self.head + first) * stride],
            &data[..second * stride],
        )
    }

    /// All raw samples, oldest first, as at most two contiguous runs
    ///
    /// Concatenating the runs gives the flattened layout used by
    /// [`History::sample_at`].
    pub fn sample_runs(&self) -> (&[f32], &[f32]) {
        self.runs(&self.samples, self.frame_len)
    }

    pub fn magnitude_runs(&self) -> (&[f32], &[f32]) {
        self.runs(&self.magnitudes, self.bin_count)
    }

    pub fn bin_runs(&self) -> (&[Complex32], &[Complex32]) {
        self.runs(&self.bins, self.bin_count)
    }

    /// Copy all raw samples, oldest first, into `out`
    pub fn export_samples(&self, out: &mut Vec<f32>) {
        let (a, b) = self.sample_runs();
        out.clear();
        out.reserve(a.len() + b.len());
        out.extend_from_slice(a);
        out.extend_from_slice(b);
    }

    /// Copy all magnitudes, oldest first, into `out`
    pub fn export_magnitudes(&self, out: &mut Vec<f32>) {
        let (a, b) = self.magnitude_runs();
        out.clear();
        out.reserve(a.len() + b.len());
        out.extend_from_slice(a);
        out.extend_from_slice(b);
    }

    /// Copy all bins, oldest first, into `out` as interleaved `re, im` pairs
    pub fn export_bins(&self, out: &mut Vec<f32>) {
        let (a, b) = self.bin_runs();
        out.clear();
        out.reserve(2 * (a.len() + b.len()));
        for bin in a.iter().chain(b) {
            out.push(bin.re);
            out.push(bin.im);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32, len: usize) -> Vec<f32> {
        vec![value; len]
    }

    fn first_samples(history: &History) -> Vec<f32> {
        history.iter().map(|s| s.samples[0]).collect()
    }

    #[test]
    fn test_latest_on_empty_history() {
        let history = History::new(8, 3);
        assert!(history.is_empty());
        assert!(matches!(history.latest(), Err(AnalysisError::EmptyHistory)));
    }

    #[test]
    fn test_latest_after_one_append() {
        let mut history = History::new(8, 3);
        history.append(&frame(1.0, 8), 0.5).unwrap();

        let latest = history.latest().unwrap();
        assert_eq!(latest.samples, frame(1.0, 8).as_slice());
        assert_eq!(latest.rms, 0.5);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_fifo_eviction_keeps_last_three() {
        let mut history = History::new(8, 3);
        for i in 1..=5 {
            history.append(&frame(i as f32, 8), 0.0).unwrap();
        }

        assert_eq!(history.len(), 3);
        assert_eq!(first_samples(&history), vec![3.0, 4.0, 5.0]);
        assert_eq!(history.latest().unwrap().samples[0], 5.0);
        assert_eq!(history.oldest().unwrap().samples[0], 3.0);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut history = History::new(4, 7);
        for i in 0..100 {
            history.append(&frame(i as f32, 4), 0.0).unwrap();
            assert!(history.len() <= 7);
        }

        let expected: Vec<f32> = (93..100).map(|i| i as f32).collect();
        assert_eq!(first_samples(&history), expected);
    }

    #[test]
    fn test_append_rejects_wrong_length() {
        let mut history = History::new(8, 3);
        let err = history.append(&frame(1.0, 4), 0.0).err();

        assert_eq!(
            err,
            Some(AnalysisError::DimensionMismatch {
                expected: 8,
                actual: 4
            })
        );
        assert!(history.is_empty());
    }

    #[test]
    fn test_appended_slice_is_writable_and_reset() {
        let mut history = History::new(4, 1);

        let slice = history.append(&frame(1.0, 4), 0.0).unwrap();
        slice.magnitudes.copy_from_slice(&[7.0, 8.0]);
        slice.bins[1] = Complex32::new(1.0, -1.0);
        assert_eq!(history.latest().unwrap().magnitudes, &[7.0, 8.0]);

        // Overwriting the only slot starts from a zeroed skeleton
        let slice = history.append(&frame(2.0, 4), 0.0).unwrap();
        assert_eq!(slice.samples, &[2.0; 4]);
        assert!(slice.magnitudes.iter().all(|&m| m == 0.0));
        assert_eq!(slice.bins[1], Complex32::new(0.0, 0.0));
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        History::new(4, 0);
    }

    #[test]
    #[should_panic]
    fn test_zero_frame_len_panics() {
        History::new(0, 3);
    }

    #[test]
    fn test_flattened_offsets_follow_chronology() {
        let mut history = History::new(4, 3);
        for i in 1..=4 {
            let samples: Vec<f32> = (0..4).map(|j| (i * 10 + j) as f32).collect();
            let slice = history.append(&samples, 0.0).unwrap();
            slice.magnitudes.copy_from_slice(&[i as f32, -(i as f32)]);
            slice.bins[0] = Complex32::new(i as f32, 0.0);
            slice.bins[1] = Complex32::new(0.0, i as f32);
        }

        // Slices 2, 3, 4 remain
        assert_eq!(history.sample_at(0), Some(20.0));
        assert_eq!(history.sample_at(4 + 3), Some(33.0));
        assert_eq!(history.sample_at(2 * 4 + 1), Some(41.0));
        assert_eq!(history.sample_at(3 * 4), None);

        assert_eq!(history.magnitude_at(0), Some(2.0));
        assert_eq!(history.magnitude_at(2 * 2 + 1), Some(-4.0));
        assert_eq!(history.magnitude_at(3 * 2), None);

        assert_eq!(history.bin_at(0), Some(Complex32::new(2.0, 0.0)));
        assert_eq!(history.bin_at(2 + 1), Some(Complex32::new(0.0, 3.0)));
        assert_eq!(history.bin_at(2 * 2), Some(Complex32::new(4.0, 0.0)));
        assert_eq!(history.bin_at(2 * 2 + 1), Some(Complex32::new(0.0, 4.0)));
        assert_eq!(history.bin_at(3 * 2), None);
    }

    #[test]
    fn test_export_matches_flattened_layout() {
        let mut history = History::new(2, 3);
        for i in 1..=5 {
            let slice = history.append(&[i as f32, -(i as f32)], 0.0).unwrap();
            slice.bins[0] = Complex32::new(i as f32, 0.5);
        }

        let mut samples = Vec::new();
        history.export_samples(&mut samples);
        assert_eq!(samples, vec![3.0, -3.0, 4.0, -4.0, 5.0, -5.0]);
        for (offset, &value) in samples.iter().enumerate() {
            assert_eq!(history.sample_at(offset), Some(value));
        }

        let mut bins = Vec::new();
        history.export_bins(&mut bins);
        assert_eq!(bins, vec![3.0, 0.5, 4.0, 0.5, 5.0, 0.5]);

        let (a, b) = history.sample_runs();
        assert_eq!(a.len() + b.len(), 6);
    }

    #[test]
    fn test_clear_empties() {
        let mut history = History::new(2, 2);
        history.append(&[1.0, 1.0], 0.0).unwrap();
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.iter().count(), 0);
        assert!(history.latest().is_err());
    }
}
