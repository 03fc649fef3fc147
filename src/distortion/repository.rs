//! # Distortion-model repository
//!
//! The pipeline asks for "the model of chip N, seen through this filter pair,
//! on this date" and optionally names an offset table whose date-dependent
//! V2/V3 corrections are folded into the answer.
//!
//! ## Resolution rules
//!
//! 1. Only entries for the requested chip are considered.
//! 2. An entry filter of `None` matches any filter; a named filter must match exactly.
//!    Entries matching more filters by name win over wildcard entries.
//! 3. Among the best-matching entries, those whose `valid_from` is after the
//!    observation date are discarded and the most recent remaining one is used.
//! 4. With an offset table, the per-chip `(ΔV2, ΔV3)` interpolated at the observation
//!    date (linear in MJD, clamped at the table ends) is added to `V2REF/V3REF`.
//!
//! Anything that cannot be resolved is reported as
//! [`MakeWcsError::MissingMetadata`](crate::makewcs_errors::MakeWcsError::MissingMetadata).

use std::collections::HashMap;

use hifitime::Epoch;
use itertools::Itertools;

use super::DistortionModel;
use crate::{constants::ArcSec, makewcs_errors::MakeWcsError, time::epoch_to_mjd};

/// Everything needed to pick one distortion model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Distortion table identifier (value of `IDCTAB`).
    pub table: String,
    pub chip: u32,
    pub filter1: String,
    pub filter2: String,
    pub date: Option<Epoch>,
    /// Offset table identifier (value of `OFFTAB`), if one applies.
    pub offset_table: Option<String>,
}

/// Source of distortion models.
pub trait DistortionRepository {
    fn read_distortion_model(&self, request: &ModelRequest)
        -> Result<DistortionModel, MakeWcsError>;

    /// `true` when the repository holds a table with this identifier.
    fn has_table(&self, table: &str) -> bool;
}

/// One row of a distortion table.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionEntry {
    pub chip: u32,
    pub filter1: Option<String>,
    pub filter2: Option<String>,
    pub valid_from: Option<Epoch>,
    pub model: DistortionModel,
}

impl DistortionEntry {
    /// Entry valid for every filter and date.
    pub fn new(chip: u32, model: DistortionModel) -> Self {
        DistortionEntry {
            chip,
            filter1: None,
            filter2: None,
            valid_from: None,
            model,
        }
    }

    pub fn with_filters(mut self, filter1: &str, filter2: &str) -> Self {
        self.filter1 = Some(filter1.to_string());
        self.filter2 = Some(filter2.to_string());
        self
    }

    pub fn valid_from(mut self, epoch: Epoch) -> Self {
        self.valid_from = Some(epoch);
        self
    }

    /// Number of filters matched by name, `None` if a named filter differs.
    fn filter_score(&self, filter1: &str, filter2: &str) -> Option<u8> {
        let score = |wanted: &Option<String>, got: &str| match wanted {
            None => Some(0),
            Some(f) if f == got => Some(1),
            Some(_) => None,
        };
        Some(score(&self.filter1, filter1)? + score(&self.filter2, filter2)?)
    }

    fn valid_on(&self, date: Option<&Epoch>) -> bool {
        match (&self.valid_from, date) {
            (Some(from), Some(date)) => epoch_to_mjd(from) <= epoch_to_mjd(date),
            _ => true,
        }
    }

    fn start_mjd(&self) -> f64 {
        self.valid_from
            .as_ref()
            .map(epoch_to_mjd)
            .unwrap_or(f64::NEG_INFINITY)
    }
}

/// Date-stamped V2/V3 correction for one chip.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetRow {
    pub chip: u32,
    pub date: Epoch,
    pub dv2: ArcSec,
    pub dv3: ArcSec,
}

/// Time-dependent pointing corrections, per chip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetTable {
    rows: Vec<OffsetRow>,
}

impl OffsetTable {
    pub fn new(rows: Vec<OffsetRow>) -> Self {
        OffsetTable { rows }
    }

    /// Correction for `chip` at `date`.
    ///
    /// Return
    /// ------
    /// * `(ΔV2, ΔV3)` in arcseconds, linearly interpolated between the rows
    ///   bracketing `date` and clamped to the first/last row outside the table
    pub fn correction(&self, chip: u32, date: &Epoch) -> Result<(ArcSec, ArcSec), MakeWcsError> {
        let rows = self
            .rows
            .iter()
            .filter(|r| r.chip == chip)
            .map(|r| (epoch_to_mjd(&r.date), r.dv2, r.dv3))
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .collect::<Vec<_>>();

        let (first, last) = match (rows.first(), rows.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => {
                return Err(MakeWcsError::MissingMetadata(format!(
                    "offset table has no entry for chip {chip}"
                )))
            }
        };

        let t = epoch_to_mjd(date);
        if t <= first.0 {
            return Ok((first.1, first.2));
        }
        if t >= last.0 {
            return Ok((last.1, last.2));
        }

        let (lo, hi) = rows
            .iter()
            .tuple_windows()
            .find(|(lo, hi)| lo.0 <= t && t <= hi.0)
            .map(|(lo, hi)| (*lo, *hi))
            .unwrap_or((last, last));
        let span = hi.0 - lo.0;
        if span == 0.0 {
            return Ok((lo.1, lo.2));
        }
        let w = (t - lo.0) / span;
        Ok((lo.1 + w * (hi.1 - lo.1), lo.2 + w * (hi.2 - lo.2)))
    }
}

/// In-memory distortion tables and offset tables, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct DistortionCatalog {
    tables: HashMap<String, Vec<DistortionEntry>>,
    offset_tables: HashMap<String, OffsetTable>,
}

impl DistortionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, id: &str, entries: Vec<DistortionEntry>) -> Self {
        self.tables.insert(id.to_string(), entries);
        self
    }

    pub fn with_offset_table(mut self, id: &str, table: OffsetTable) -> Self {
        self.offset_tables.insert(id.to_string(), table);
        self
    }
}

impl DistortionRepository for DistortionCatalog {
    fn read_distortion_model(
        &self,
        request: &ModelRequest,
    ) -> Result<DistortionModel, MakeWcsError> {
        let entries = self.tables.get(&request.table).ok_or_else(|| {
            MakeWcsError::MissingMetadata(format!("distortion table {} not found", request.table))
        })?;

        let candidates = entries
            .iter()
            .filter(|e| e.chip == request.chip)
            .filter_map(|e| {
                e.filter_score(&request.filter1, &request.filter2)
                    .map(|s| (s, e))
            })
            .collect::<Vec<_>>();

        let best_score = candidates.iter().map(|(s, _)| *s).max();

        let entry = candidates
            .into_iter()
            .filter(|(s, _)| Some(*s) == best_score)
            .map(|(_, e)| e)
            .filter(|e| e.valid_on(request.date.as_ref()))
            .max_by(|a, b| a.start_mjd().total_cmp(&b.start_mjd()))
            .ok_or_else(|| {
                MakeWcsError::MissingMetadata(format!(
                    "no distortion model in {} for chip {} with filters {}/{}",
                    request.table, request.chip, request.filter1, request.filter2
                ))
            })?;

        let mut model = entry.model.clone();

        if let Some(offtab) = &request.offset_table {
            let table = self.offset_tables.get(offtab).ok_or_else(|| {
                MakeWcsError::MissingMetadata(format!("offset table {offtab} not found"))
            })?;
            let date = request.date.as_ref().ok_or_else(|| {
                MakeWcsError::MissingMetadata("DATE-OBS is required with an offset table".into())
            })?;
            let (dv2, dv3) = table.correction(request.chip, date)?;
            model.v2ref += dv2;
            model.v3ref += dv3;
        }

        Ok(model)
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }
}
