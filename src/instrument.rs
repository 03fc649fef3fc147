//! # Instrument profiles
//!
//! The supported instrument families differ in which keywords name the chip
//! and the filters, which chip defines the shared tangent plane, how the
//! parity is looked up and which optional corrections apply.
//! [`InstrumentProfile`] captures these differences as a closed set of variants.
//!
//! | Profile    | Reference chip (extension) | Filters               | Parity by  | VAFACTOR | OFFTAB |
//! |------------|----------------------------|-----------------------|------------|----------|--------|
//! | `AcsWfc`   | 2 (`sci,1`)                | `FILTER1`, `FILTER2`  | detector   | yes      | no     |
//! | `Acs`      | 1 (`sci,1`)                | `FILTER1`, `FILTER2`  | detector   | yes      | no     |
//! | `Wfpc2`    | 3 (`sci,3`)                | `FILTNAM1`, `FILTNAM2`| instrument | no       | yes    |
//! | `Stis`     | 1 (`sci,1`)                | `FILTER1`, `FILTER2`  | instrument | no       | no     |
//! | `Nicmos`   | `CAMERA` (`sci,1`)         | `FILTER`              | instrument | no       | no     |
//! | `Default`  | 1 (`sci,1`)                | `FILTER1`, `FILTER2`  | detector   | no       | no     |
//!
//! [`ExtensionCounts`] gives the number of header units per exposure, used to
//! find how many science extensions a file holds.

use std::collections::HashMap;

use crate::{
    header::{Extension, Keywords},
    makewcs_errors::MakeWcsError,
    parity::{ParityMatrix, ParityTable},
};

/// Filter name used for empty filter slots.
pub const CLEAR: &str = "CLEAR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentProfile {
    /// ACS Wide Field Channel.
    AcsWfc,
    /// Other ACS detectors (HRC, SBC).
    Acs { detector: String },
    Wfpc2,
    Stis,
    Nicmos,
    /// Any other instrument, parity looked up by detector.
    Default {
        instrument: String,
        detector: Option<String>,
    },
}

impl InstrumentProfile {
    /// Pick the profile from `INSTRUME` and `DETECTOR`.
    pub fn from_header(header: &impl Keywords) -> Result<Self, MakeWcsError> {
        let instrument = header.require_str("INSTRUME")?;
        let detector = header.opt_str("DETECTOR")?;

        Ok(match instrument.as_str() {
            "ACS" => match detector {
                Some(d) if d == "WFC" => InstrumentProfile::AcsWfc,
                Some(d) => InstrumentProfile::Acs { detector: d },
                None => {
                    return Err(MakeWcsError::MissingMetadata(
                        "keyword DETECTOR not found".into(),
                    ))
                }
            },
            "WFPC2" => InstrumentProfile::Wfpc2,
            "STIS" => InstrumentProfile::Stis,
            "NICMOS" => InstrumentProfile::Nicmos,
            _ => InstrumentProfile::Default {
                instrument,
                detector,
            },
        })
    }

    pub fn instrument(&self) -> &str {
        match self {
            InstrumentProfile::AcsWfc | InstrumentProfile::Acs { .. } => "ACS",
            InstrumentProfile::Wfpc2 => "WFPC2",
            InstrumentProfile::Stis => "STIS",
            InstrumentProfile::Nicmos => "NICMOS",
            InstrumentProfile::Default { instrument, .. } => instrument.as_str(),
        }
    }

    pub fn detector(&self) -> Option<&str> {
        match self {
            InstrumentProfile::AcsWfc => Some("WFC"),
            InstrumentProfile::Acs { detector } => Some(detector.as_str()),
            InstrumentProfile::Default { detector, .. } => detector.as_deref(),
            _ => None,
        }
    }

    /// Chip whose distortion model defines the shared tangent plane.
    pub fn reference_chip_id(&self, header: &impl Keywords) -> Result<u32, MakeWcsError> {
        match self {
            InstrumentProfile::AcsWfc => Ok(2),
            InstrumentProfile::Wfpc2 => Ok(3),
            InstrumentProfile::Nicmos => header.opt_u32("CAMERA")?.ok_or_else(|| {
                MakeWcsError::MissingMetadata("keyword CAMERA not found".into())
            }),
            _ => Ok(1),
        }
    }

    /// Extension holding the reference chip.
    pub fn reference_extension(&self) -> Extension {
        match self {
            InstrumentProfile::Wfpc2 => Extension::Sci(3),
            _ => Extension::Sci(1),
        }
    }

    /// Chip number of an extension.
    ///
    /// A numeric `CAMERA` wins; otherwise `CCDCHIP`, then a numeric `DETECTOR`;
    /// chip 1 when none of these applies.
    pub fn resolve_chip_id(&self, header: &impl Keywords) -> Result<u32, MakeWcsError> {
        if let Some(camera) = header.opt_str("CAMERA")? {
            if is_number(&camera) {
                return header.opt_u32("CAMERA").map(|c| c.unwrap_or(1));
            }
        }
        if let Some(chip) = header.opt_u32("CCDCHIP")? {
            return Ok(chip);
        }
        match header.opt_str("DETECTOR")? {
            Some(detector) if is_number(&detector) => {
                header.opt_u32("DETECTOR").map(|d| d.unwrap_or(1))
            }
            _ => Ok(1),
        }
    }

    /// Filter pair used to select the distortion model.
    pub fn resolve_filters(&self, header: &impl Keywords) -> Result<(String, String), MakeWcsError> {
        let (filter1, filter2) = match self {
            InstrumentProfile::Wfpc2 => (header.opt_str("FILTNAM1")?, header.opt_str("FILTNAM2")?),
            InstrumentProfile::Nicmos => (header.opt_str("FILTER")?, None),
            _ => (header.opt_str("FILTER1")?, header.opt_str("FILTER2")?),
        };
        Ok((normalize_filter(filter1), normalize_filter(filter2)))
    }

    pub fn parity_matrix(&self, table: &ParityTable) -> Result<ParityMatrix, MakeWcsError> {
        table.lookup(self.instrument(), self.detector())
    }

    /// `true` when the velocity-aberration factor is read from `VAFACTOR`.
    pub fn reads_velocity_aberration(&self) -> bool {
        matches!(self, InstrumentProfile::AcsWfc | InstrumentProfile::Acs { .. })
    }

    /// `true` when an `OFFTAB` named in the header is applied.
    pub fn uses_offset_table(&self) -> bool {
        matches!(self, InstrumentProfile::Wfpc2)
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Blank or absent → `CLEAR`, names starting with `CLEAR` → `CLEAR`.
pub fn normalize_filter(filter: Option<String>) -> String {
    match filter {
        Some(f) if !f.trim().is_empty() && !f.trim().starts_with(CLEAR) => f.trim().to_string(),
        _ => CLEAR.to_string(),
    }
}

/// Header units per exposure, by instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionCounts {
    per_exposure: HashMap<String, u32>,
}

impl ExtensionCounts {
    pub fn new() -> Self {
        ExtensionCounts {
            per_exposure: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        ExtensionCounts::new()
            .with_instrument("ACS", 3)
            .with_instrument("WFPC2", 1)
            .with_instrument("STIS", 3)
            .with_instrument("NICMOS", 5)
    }

    pub fn with_instrument(mut self, instrument: &str, count: u32) -> Self {
        self.per_exposure.insert(instrument.to_string(), count);
        self
    }

    pub fn per_exposure(&self, instrument: &str) -> Result<u32, MakeWcsError> {
        self.per_exposure
            .get(instrument)
            .copied()
            .filter(|n| *n > 0)
            .ok_or_else(|| MakeWcsError::UnsupportedInstrument(instrument.to_string()))
    }

    /// Number of science extensions in a file with `nextend` extensions.
    pub fn imsets(&self, instrument: &str, nextend: u32) -> Result<u32, MakeWcsError> {
        Ok(nextend / self.per_exposure(instrument)?)
    }
}

impl Default for ExtensionCounts {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod instrument_test {
    use super::*;
    use crate::{
        header::Header,
        parity::{flip_x_parity, flip_y_parity},
    };

    fn header(instrument: &str, detector: Option<&str>) -> Header {
        let h = Header::new().with("INSTRUME", instrument);
        match detector {
            Some(d) => h.with("DETECTOR", d),
            None => h,
        }
    }

    #[test]
    fn test_profile_selection() {
        assert_eq!(
            InstrumentProfile::from_header(&header("ACS", Some("WFC"))).unwrap(),
            InstrumentProfile::AcsWfc
        );
        assert_eq!(
            InstrumentProfile::from_header(&header("ACS", Some("HRC"))).unwrap(),
            InstrumentProfile::Acs {
                detector: "HRC".into()
            }
        );
        assert_eq!(
            InstrumentProfile::from_header(&header("WFPC2", Some("2"))).unwrap(),
            InstrumentProfile::Wfpc2
        );
        assert_eq!(
            InstrumentProfile::from_header(&header("WFC3", Some("UVIS"))).unwrap(),
            InstrumentProfile::Default {
                instrument: "WFC3".into(),
                detector: Some("UVIS".into())
            }
        );
        assert!(InstrumentProfile::from_header(&header("ACS", None)).is_err());
        assert!(InstrumentProfile::from_header(&Header::new())
            .unwrap_err()
            .is_missing_metadata());
    }

    #[test]
    fn test_reference_chip() {
        let h = Header::new().with("CAMERA", 2i64);
        assert_eq!(InstrumentProfile::AcsWfc.reference_chip_id(&h).unwrap(), 2);
        assert_eq!(InstrumentProfile::AcsWfc.reference_extension(), Extension::Sci(1));
        assert_eq!(InstrumentProfile::Wfpc2.reference_chip_id(&h).unwrap(), 3);
        assert_eq!(InstrumentProfile::Wfpc2.reference_extension(), Extension::Sci(3));
        assert_eq!(InstrumentProfile::Nicmos.reference_chip_id(&h).unwrap(), 2);
        assert!(InstrumentProfile::Nicmos
            .reference_chip_id(&Header::new())
            .is_err());
        assert_eq!(InstrumentProfile::Stis.reference_chip_id(&h).unwrap(), 1);
    }

    #[test]
    fn test_chip_id() {
        let p = InstrumentProfile::Stis;
        assert_eq!(p.resolve_chip_id(&Header::new()).unwrap(), 1);
        assert_eq!(p.resolve_chip_id(&Header::new().with("CAMERA", "3")).unwrap(), 3);
        assert_eq!(
            p.resolve_chip_id(&Header::new().with("CAMERA", "NIC").with("CCDCHIP", 2i64))
                .unwrap(),
            2
        );
        assert_eq!(p.resolve_chip_id(&Header::new().with("DETECTOR", "4")).unwrap(), 4);
        assert_eq!(p.resolve_chip_id(&Header::new().with("DETECTOR", "CCD")).unwrap(), 1);
        assert!(p
            .resolve_chip_id(&Header::new().with("CCDCHIP", "two"))
            .is_err());
    }

    #[test]
    fn test_filters() {
        let h = Header::new()
            .with("FILTER1", "CLEAR1L")
            .with("FILTER2", "F814W ")
            .with("FILTNAM1", "F555W")
            .with("FILTNAM2", "  ")
            .with("FILTER", "F110W");
        assert_eq!(
            InstrumentProfile::AcsWfc.resolve_filters(&h).unwrap(),
            ("CLEAR".to_string(), "F814W".to_string())
        );
        assert_eq!(
            InstrumentProfile::Wfpc2.resolve_filters(&h).unwrap(),
            ("F555W".to_string(), "CLEAR".to_string())
        );
        assert_eq!(
            InstrumentProfile::Nicmos.resolve_filters(&h).unwrap(),
            ("F110W".to_string(), "CLEAR".to_string())
        );
        assert_eq!(normalize_filter(None), "CLEAR");
    }

    #[test]
    fn test_parity_and_corrections() {
        let table = ParityTable::standard();
        assert_eq!(InstrumentProfile::AcsWfc.parity_matrix(&table).unwrap(), flip_y_parity());
        assert_eq!(InstrumentProfile::Nicmos.parity_matrix(&table).unwrap(), flip_x_parity());
        let unknown = InstrumentProfile::Default {
            instrument: "WFC3".into(),
            detector: Some("UVIS".into()),
        };
        assert!(matches!(
            unknown.parity_matrix(&table),
            Err(MakeWcsError::UnsupportedDetector { .. })
        ));

        assert!(InstrumentProfile::AcsWfc.reads_velocity_aberration());
        assert!(!InstrumentProfile::Wfpc2.reads_velocity_aberration());
        assert!(InstrumentProfile::Wfpc2.uses_offset_table());
        assert!(!InstrumentProfile::Stis.uses_offset_table());
    }

    #[test]
    fn test_extension_counts() {
        let counts = ExtensionCounts::standard();
        assert_eq!(counts.imsets("ACS", 6).unwrap(), 2);
        assert_eq!(counts.imsets("WFPC2", 4).unwrap(), 4);
        assert_eq!(counts.imsets("NICMOS", 5).unwrap(), 1);
        assert_eq!(
            counts.per_exposure("WFC3"),
            Err(MakeWcsError::UnsupportedInstrument("WFC3".into()))
        );
    }
}
