//! Exponentially weighted smoothing of magnitude spectra
//!
//! Each [`Ewma`] keeps one value per bin and a single coefficient `alpha`:
//! the retained history is weighted `alpha`, the new reading `1 - alpha`.
//! Larger `alpha` means slower-moving output. A [`MultiRateSmoother`] runs
//! several independent instances over the same input.

use serde::{Deserialize, Serialize};

use super::{lerp, AnalysisError};

/// A named smoothing coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingRate {
    pub name: String,
    pub alpha: f32,
}

impl SmoothingRate {
    pub fn new(name: impl Into<String>, alpha: f32) -> Self {
        Self {
            name: name.into(),
            alpha,
        }
    }

    /// fast / slow / glacial
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("fast", 0.6),
            Self::new("slow", 0.85),
            Self::new("glacial", 0.95),
        ]
    }
}

/// Per-bin exponentially weighted moving average
#[derive(Debug, Clone)]
pub struct Ewma {
    alpha: f32,
    state: Vec<f32>,
}

impl Ewma {
    /// Seed the state directly from the first observed magnitudes
    pub fn new(alpha: f32, initial: &[f32]) -> Self {
        Self {
            alpha,
            state: initial.to_vec(),
        }
    }

    /// Fold `magnitudes` into the state
    ///
    /// On a length mismatch the state is left untouched.
    pub fn update(&mut self, magnitudes: &[f32]) -> Result<(), AnalysisError> {
        if magnitudes.len() != self.state.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.state.len(),
                actual: magnitudes.len(),
            });
        }

        for (state, &new) in self.state.iter_mut().zip(magnitudes) {
            *state = lerp(new, *state, self.alpha);
        }
        Ok(())
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn values(&self) -> &[f32] {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Independent EWMAs over the same magnitude stream, one per rate
#[derive(Debug, Clone)]
pub struct MultiRateSmoother {
    names: Vec<String>,
    states: Vec<Ewma>,
}

impl MultiRateSmoother {
    pub fn new(rates: &[SmoothingRate], initial: &[f32]) -> Self {
        Self {
            names: rates.iter().map(|r| r.name.clone()).collect(),
            states: rates.iter().map(|r| Ewma::new(r.alpha, initial)).collect(),
        }
    }

    /// Update every rate from the same magnitudes
    ///
    /// All instances share one length, so either all are updated or, on a
    /// mismatch, none are.
    pub fn update(&mut self, magnitudes: &[f32]) -> Result<(), AnalysisError> {
        if let Some(first) = self.states.first() {
            if first.len() != magnitudes.len() {
                return Err(AnalysisError::DimensionMismatch {
                    expected: first.len(),
                    actual: magnitudes.len(),
                });
            }
        }
        for state in &mut self.states {
            state.update(magnitudes)?;
        }
        Ok(())
    }

    /// Smoothed magnitudes for the rate called `name`
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.states[i].values())
    }

    /// `(name, ewma)` pairs in configured order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Ewma)> {
        self.names.iter().map(String::as_str).zip(&self.states)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
