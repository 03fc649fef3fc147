//! # Run parameters
//!
//! [`MakeWcsParams`] gathers the options of a WCS recomputation run. It is built
//! with defaults or through the validating [`MakeWcsParamsBuilder`]:
//!
//! ```rust
//! use makewcs::params::MakeWcsParams;
//!
//! let params = MakeWcsParams::builder()
//!     .archive_prefix("W")
//!     .recenter_subarray(true)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.archive_prefix, "W");
//! ```

use std::fmt;

use crate::{
    constants::{MAX_KEYWORD_LEN, WCS_KEYWORDS},
    makewcs_errors::MakeWcsError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MakeWcsParams {
    /// Prefix of the archived WCS keywords (`OCRVAL1`, `OCD1_1`, …).
    pub archive_prefix: String,
    /// Replace an existing archive with the current values before updating.
    pub overwrite_archive: bool,
    /// Re-expand the distortion model about the center of a subarray readout.
    pub recenter_subarray: bool,
    /// Write the SIP keywords along with the linear WCS.
    pub write_sip: bool,
}

impl MakeWcsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MakeWcsParamsBuilder {
        MakeWcsParamsBuilder::new()
    }
}

impl Default for MakeWcsParams {
    fn default() -> Self {
        MakeWcsParams {
            archive_prefix: "O".to_string(),
            overwrite_archive: false,
            recenter_subarray: false,
            write_sip: true,
        }
    }
}

impl fmt::Display for MakeWcsParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MakeWcsParams")?;
        writeln!(f, "  archive_prefix    = {}", self.archive_prefix)?;
        writeln!(f, "  overwrite_archive = {}", self.overwrite_archive)?;
        writeln!(f, "  recenter_subarray = {}", self.recenter_subarray)?;
        write!(f, "  write_sip         = {}", self.write_sip)
    }
}

/// Builder for [`MakeWcsParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct MakeWcsParamsBuilder {
    params: MakeWcsParams,
}

impl MakeWcsParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive_prefix(mut self, prefix: &str) -> Self {
        self.params.archive_prefix = prefix.to_string();
        self
    }

    pub fn overwrite_archive(mut self, v: bool) -> Self {
        self.params.overwrite_archive = v;
        self
    }

    pub fn recenter_subarray(mut self, v: bool) -> Self {
        self.params.recenter_subarray = v;
        self
    }

    pub fn write_sip(mut self, v: bool) -> Self {
        self.params.write_sip = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// ----------------
    /// * `archive_prefix` is made of ASCII uppercase letters and is short enough
    ///   for every archived keyword to fit in a header card name.
    ///
    /// Return
    /// ------
    /// * the parameters, or [`MakeWcsError::InvalidParams`]
    pub fn build(self) -> Result<MakeWcsParams, MakeWcsError> {
        let prefix = &self.params.archive_prefix;

        if prefix.is_empty() {
            return Err(MakeWcsError::InvalidParams(
                "archive_prefix must not be empty".into(),
            ));
        }
        if !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(MakeWcsError::InvalidParams(format!(
                "archive_prefix must be ASCII uppercase letters, got {prefix:?}"
            )));
        }
        let longest = WCS_KEYWORDS.iter().map(|k| k.len()).max().unwrap_or(0);
        if prefix.len() + longest > MAX_KEYWORD_LEN {
            return Err(MakeWcsError::InvalidParams(format!(
                "archive_prefix {prefix:?} is too long: archived keywords exceed {MAX_KEYWORD_LEN} characters"
            )));
        }

        Ok(self.params)
    }
}
