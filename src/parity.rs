//! # Detector parity
//!
//! Each detector reads out with its own handedness relative to the telescope
//! V2/V3 focal-plane axes. The parity matrix is the 2×2 sign matrix taking
//! detector XY axes onto V2/V3.
//!
//! Resolution order in [`ParityTable::lookup`]:
//!
//! 1. instruments with a single parity (WFPC2, STIS, NICMOS) return their matrix
//!    whatever the detector,
//! 2. otherwise the detector name is looked up (WFC, HRC, SBC, …),
//! 3. anything else is an [`UnsupportedDetector`](crate::makewcs_errors::MakeWcsError::UnsupportedDetector) error.
//!
//! The table is an immutable value built once ([`ParityTable::standard`]) and
//! handed to whoever needs it.

use std::collections::HashMap;

use nalgebra::Matrix2;

use crate::makewcs_errors::MakeWcsError;

/// 2×2 sign matrix from detector XY to V2/V3.
pub type ParityMatrix = Matrix2<f64>;

/// `[[1, 0], [0, 1]]`
pub fn identity_parity() -> ParityMatrix {
    ParityMatrix::identity()
}

/// `[[1, 0], [0, -1]]`, y axis flipped.
pub fn flip_y_parity() -> ParityMatrix {
    ParityMatrix::new(1.0, 0.0, 0.0, -1.0)
}

/// `[[-1, 0], [0, 1]]`, x axis flipped.
pub fn flip_x_parity() -> ParityMatrix {
    ParityMatrix::new(-1.0, 0.0, 0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParityTable {
    by_instrument: HashMap<String, ParityMatrix>,
    by_detector: HashMap<String, ParityMatrix>,
}

impl ParityTable {
    /// An empty table: every lookup fails.
    pub fn new() -> Self {
        ParityTable {
            by_instrument: HashMap::new(),
            by_detector: HashMap::new(),
        }
    }

    /// Parity of the supported HST detectors.
    pub fn standard() -> Self {
        ParityTable::new()
            .with_instrument("WFPC2", flip_x_parity())
            .with_instrument("STIS", flip_x_parity())
            .with_instrument("NICMOS", flip_x_parity())
            .with_detector("WFC", flip_y_parity())
            .with_detector("HRC", flip_x_parity())
            .with_detector("SBC", flip_x_parity())
            .with_detector("default", identity_parity())
    }

    /// Register an instrument whose detectors all share one parity.
    pub fn with_instrument(mut self, instrument: &str, parity: ParityMatrix) -> Self {
        self.by_instrument.insert(instrument.to_string(), parity);
        self
    }

    /// Register the parity of a detector.
    pub fn with_detector(mut self, detector: &str, parity: ParityMatrix) -> Self {
        self.by_detector.insert(detector.to_string(), parity);
        self
    }

    /// Find the parity matrix of an instrument/detector pair.
    ///
    /// Arguments
    /// ---------
    /// * `instrument`: value of the `INSTRUME` keyword
    /// * `detector`: value of the `DETECTOR` keyword, if any
    ///
    /// Return
    /// ------
    /// * the parity matrix, or [`MakeWcsError::UnsupportedDetector`] when neither
    ///   the instrument nor the detector is known
    pub fn lookup(
        &self,
        instrument: &str,
        detector: Option<&str>,
    ) -> Result<ParityMatrix, MakeWcsError> {
        if let Some(parity) = self.by_instrument.get(instrument) {
            return Ok(*parity);
        }

        detector
            .and_then(|d| self.by_detector.get(d))
            .copied()
            .ok_or_else(|| MakeWcsError::UnsupportedDetector {
                instrument: instrument.to_string(),
                detector: detector.unwrap_or("").to_string(),
            })
    }
}

impl Default for ParityTable {
    fn default() -> Self {
        Self::standard()
    }
}
