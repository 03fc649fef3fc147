use thiserror::Error;

#[derive(Error, Debug)]
pub enum MakeWcsError {
    #[error("Missing required metadata: {0}")]
    MissingMetadata(String),

    #[error("Invalid value for keyword {key}: {value}")]
    InvalidKeyword { key: String, value: String },

    #[error("Detector {detector} of instrument {instrument} is not supported")]
    UnsupportedDetector {
        instrument: String,
        detector: String,
    },

    #[error("Instrument {0} is not supported")]
    UnsupportedInstrument(String),

    #[error("Distortion Jacobian is singular (determinant = {0}); SIP terms cannot be derived")]
    DegenerateJacobian(f64),

    #[error("Invalid image specifier: {0}")]
    InvalidImageSpec(String),

    #[error("Invalid observation date: {0}")]
    InvalidDate(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV header store error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("Error during the nom parsing: {0}")]
    NomParsingError(String),
}

impl MakeWcsError {
    /// `true` for errors caused by an absent or unparseable keyword or model field.
    pub fn is_missing_metadata(&self) -> bool {
        matches!(
            self,
            MakeWcsError::MissingMetadata(_) | MakeWcsError::InvalidKeyword { .. }
        )
    }
}

impl PartialEq for MakeWcsError {
    fn eq(&self, other: &Self) -> bool {
        use MakeWcsError::*;
        match (self, other) {
            (MissingMetadata(a), MissingMetadata(b)) => a == b,
            (
                InvalidKeyword { key: k1, value: v1 },
                InvalidKeyword { key: k2, value: v2 },
            ) => k1 == k2 && v1 == v2,
            (
                UnsupportedDetector {
                    instrument: i1,
                    detector: d1,
                },
                UnsupportedDetector {
                    instrument: i2,
                    detector: d2,
                },
            ) => i1 == i2 && d1 == d2,
            (UnsupportedInstrument(a), UnsupportedInstrument(b)) => a == b,
            (DegenerateJacobian(a), DegenerateJacobian(b)) => a == b,
            (InvalidImageSpec(a), InvalidImageSpec(b)) => a == b,
            (InvalidDate(a), InvalidDate(b)) => a == b,
            (InvalidParams(a), InvalidParams(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,
            (NomParsingError(a), NomParsingError(b)) => a == b,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}
