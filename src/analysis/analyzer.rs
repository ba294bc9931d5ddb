//! Per-tick orchestration
//!
//! [`Analyzer::tick`] is called once per consumer tick. It reads the latest
//! frame from a [`FrameSource`] and, in order:
//!
//! 1. computes the frame's RMS and folds it into the loudness envelope
//! 2. appends the raw samples to the history as a new slice (evicting the
//!    oldest slice when full)
//! 3. fills that slice's bins and magnitudes with the spectral transform
//! 4. updates every smoothing rate from the new magnitudes
//!
//! History and smoothers are created on the first frame; the smoothers are
//! seeded from that frame's magnitudes.

use super::envelope::{rms, RmsEnvelope};
use super::history::{History, TimeSlice};
use super::smoother::{MultiRateSmoother, SmoothingRate};
use super::spectrum::SpectralTransform;
use super::AnalysisError;
use crate::audio::{FrameRead, FrameSource};
use crate::settings::{AnalyzerSettings, ConfigError};

/// Lifecycle of the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzerState {
    /// No frame observed yet
    #[default]
    Uninitialized,
    /// Processing one frame per tick
    Steady,
    /// Stream stopped; further ticks are refused
    Shutdown,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was analyzed; `fresh` is false when it was a repeat
    Processed { fresh: bool },
    /// No frame was available
    Idle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounters {
    pub fresh: u64,
    pub repeated: u64,
    pub idle: u64,
    pub evicted: u64,
}

/// Borrowed view of everything the visualization layer consumes
#[derive(Clone, Copy)]
pub struct Features<'a> {
    /// Smoothed RMS loudness
    pub rms: f32,
    pub history: &'a History,
    pub smoothed: &'a MultiRateSmoother,
    pub counters: TickCounters,
}

impl<'a> Features<'a> {
    pub fn latest(&self) -> Result<TimeSlice<'a>, AnalysisError> {
        self.history.latest()
    }
}

pub struct Analyzer {
    frame_len: usize,
    history_len: usize,
    rates: Vec<SmoothingRate>,
    envelope: RmsEnvelope,
    transform: SpectralTransform,
    history: Option<History>,
    smoothers: Option<MultiRateSmoother>,
    state: AnalyzerState,
    counters: TickCounters,
}

impl Analyzer {
    pub fn new(settings: &AnalyzerSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        Ok(Self {
            frame_len: settings.frame_len,
            history_len: settings.history_len,
            rates: settings.rates.clone(),
            envelope: RmsEnvelope::new(settings.rms_decay),
            transform: SpectralTransform::new(settings.frame_len, settings.magnitude, settings.window),
            history: None,
            smoothers: None,
            state: AnalyzerState::Uninitialized,
            counters: TickCounters::default(),
        })
    }

    /// Pull one frame from `source` and analyze it
    pub fn tick<S>(&mut self, source: &mut S) -> Result<TickOutcome, AnalysisError>
    where
        S: FrameSource + ?Sized,
    {
        if self.state == AnalyzerState::Shutdown {
            return Err(AnalysisError::Stopped);
        }

        let (frame, fresh) = match source.read() {
            FrameRead::Fresh(frame) => (frame, true),
            FrameRead::Repeat(frame) => (frame, false),
            FrameRead::Pending => {
                self.counters.idle += 1;
                return Ok(TickOutcome::Idle);
            }
        };
        if frame.is_empty() {
            self.counters.idle += 1;
            return Ok(TickOutcome::Idle);
        }

        self.analyze(frame)?;

        if fresh {
            self.counters.fresh += 1;
        } else {
            self.counters.repeated += 1;
            log::trace!("Frame repeated, producer has not published since last tick");
        }
        Ok(TickOutcome::Processed { fresh })
    }

    /// Analyze `frame` directly, bypassing any frame source
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<(), AnalysisError> {
        if self.state == AnalyzerState::Shutdown {
            return Err(AnalysisError::Stopped);
        }
        self.analyze(frame)?;
        self.counters.fresh += 1;
        Ok(())
    }

    fn analyze(&mut self, frame: &[f32]) -> Result<(), AnalysisError> {
        if frame.len() != self.frame_len {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }

        let level = rms(frame);
        self.envelope.update(level);

        let history_len = self.history_len;
        let frame_len = self.frame_len;
        let history = self
            .history
            .get_or_insert_with(|| History::new(frame_len, history_len));

        let evicting = history.is_full();
        let slice = history.append(frame, level)?;
        self.transform
            .transform(frame, &mut *slice.bins, &mut *slice.magnitudes)?;

        match self.smoothers.as_mut() {
            Some(smoothers) => smoothers.update(slice.magnitudes)?,
            None => self.smoothers = Some(MultiRateSmoother::new(&self.rates, slice.magnitudes)),
        }

        if evicting {
            self.counters.evicted += 1;
            log::trace!("History full, oldest slice evicted");
        }

        if self.state == AnalyzerState::Uninitialized {
            self.state = AnalyzerState::Steady;
            log::debug!(
                "First frame observed: {} samples, {} bins ({}), {} smoothing rate(s)",
                self.frame_len,
                self.transform.bin_count(),
                self.transform.scale().name(),
                self.rates.len()
            );
        }
        Ok(())
    }

    /// Stop accepting ticks; analyzed data stays readable
    pub fn shutdown(&mut self) {
        if self.state != AnalyzerState::Shutdown {
            self.state = AnalyzerState::Shutdown;
            log::info!(
                "Analyzer stopped after {} fresh, {} repeated, {} idle tick(s)",
                self.counters.fresh,
                self.counters.repeated,
                self.counters.idle
            );
        }
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    pub fn counters(&self) -> TickCounters {
        self.counters
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Smoothed RMS, 0 before the first frame
    pub fn smoothed_rms(&self) -> f32 {
        self.envelope.value()
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn latest(&self) -> Result<TimeSlice<'_>, AnalysisError> {
        self.history
            .as_ref()
            .ok_or(AnalysisError::EmptyHistory)?
            .latest()
    }

    /// Smoothed magnitudes of the rate called `name`
    pub fn smoothed(&self, name: &str) -> Option<&[f32]> {
        self.smoothers.as_ref()?.get(name)
    }

    /// Everything the visualization layer reads, once a frame has been seen
    pub fn features(&self) -> Result<Features<'_>, AnalysisError> {
        match (&self.history, &self.smoothers) {
            (Some(history), Some(smoothed)) => Ok(Features {
                rms: self.envelope.value(),
                history,
                smoothed,
                counters: self.counters,
            }),
            _ => Err(AnalysisError::EmptyHistory),
        }
    }
}
