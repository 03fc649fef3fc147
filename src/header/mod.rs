//! # Image headers
//!
//! Typed access to the keywords of an image extension and the stores that
//! hold them.
//!
//! ## Overview
//!
//! - [`HeaderValue`] – a scalar keyword value (string, float, integer or logical),
//! - [`Keywords`] / [`KeywordsMut`] – read and write accessors with typed helpers
//!   ([`Keywords::require_f64`], [`Keywords::opt_str`], …),
//! - [`Header`] – the keywords of one extension,
//! - [`HeaderView`] – an extension header backed by its file's primary header,
//!   the way instrument keywords are looked up,
//! - [`HeaderStore`] – where headers are read from and durably written to,
//!   with an in-memory ([`memory::MemoryHeaderStore`]) and a CSV-backed
//!   ([`csv_store::CsvHeaderStore`]) implementation,
//! - [`archive`] – copy of the WCS keywords under a reserved prefix, and its restore.
//!
//! Missing keywords surface as [`MakeWcsError::MissingMetadata`], values of the
//! wrong type as [`MakeWcsError::InvalidKeyword`].

pub mod archive;
pub mod csv_store;
pub mod memory;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use camino::{Utf8Path, Utf8PathBuf};

use crate::makewcs_errors::MakeWcsError;

/// Scalar value of a header keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl HeaderValue {
    /// Numeric value; numeric strings are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Str(s) => s.trim().parse().ok(),
            HeaderValue::Bool(_) => None,
        }
    }

    /// Text value; integers are rendered in decimal.
    pub fn as_text(&self) -> Option<String> {
        match self {
            HeaderValue::Str(s) => Some(s.trim().to_string()),
            HeaderValue::Int(v) => Some(v.to_string()),
            HeaderValue::Float(_) | HeaderValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(b) => Some(*b),
            HeaderValue::Str(s) => match s.trim() {
                "T" | "t" => Some(true),
                "F" | "f" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Str(s) => write!(f, "'{s}'"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Int(v) => write!(f, "{v}"),
            HeaderValue::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        HeaderValue::Bool(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Str(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::Str(v)
    }
}

fn invalid(key: &str, value: &HeaderValue) -> MakeWcsError {
    MakeWcsError::InvalidKeyword {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn missing(key: &str) -> MakeWcsError {
    MakeWcsError::MissingMetadata(format!("keyword {key} not found"))
}

/// Read access to header keywords.
pub trait Keywords {
    fn get(&self, key: &str) -> Option<&HeaderValue>;

    /// Every keyword name, sorted.
    fn keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn opt_f64(&self, key: &str) -> Result<Option<f64>, MakeWcsError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| invalid(key, v)),
        }
    }

    fn require_f64(&self, key: &str) -> Result<f64, MakeWcsError> {
        self.opt_f64(key)?.ok_or_else(|| missing(key))
    }

    /// Trimmed text value.
    fn opt_str(&self, key: &str) -> Result<Option<String>, MakeWcsError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_text().map(Some).ok_or_else(|| invalid(key, v)),
        }
    }

    fn require_str(&self, key: &str) -> Result<String, MakeWcsError> {
        self.opt_str(key)?.ok_or_else(|| missing(key))
    }

    /// Non-negative integer value, from an integer, an integral float or a string of digits.
    fn opt_u32(&self, key: &str) -> Result<Option<u32>, MakeWcsError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            HeaderValue::Int(v) => u32::try_from(*v).ok(),
            HeaderValue::Float(v) if v.fract() == 0.0 && *v >= 0.0 && *v <= u32::MAX as f64 => {
                Some(*v as u32)
            }
            HeaderValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| invalid(key, value))
    }

    fn opt_bool(&self, key: &str) -> Result<Option<bool>, MakeWcsError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_bool().map(Some).ok_or_else(|| invalid(key, v)),
        }
    }
}

/// Write access to header keywords.
pub trait KeywordsMut: Keywords {
    fn set(&mut self, key: &str, value: HeaderValue);

    fn remove(&mut self, key: &str) -> Option<HeaderValue>;
}

/// Keywords of one image extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: BTreeMap<String, HeaderValue>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: &str, value: impl Into<HeaderValue>) -> Self {
        self.cards.insert(key.to_string(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Keywords for Header {
    fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.cards.keys().cloned().collect()
    }
}

impl KeywordsMut for Header {
    fn set(&mut self, key: &str, value: HeaderValue) {
        self.cards.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        self.cards.remove(key)
    }
}

impl FromIterator<(String, HeaderValue)> for Header {
    fn from_iter<T: IntoIterator<Item = (String, HeaderValue)>>(iter: T) -> Self {
        Header {
            cards: iter.into_iter().collect(),
        }
    }
}

/// An extension header that falls back to the primary header for keywords it lacks.
#[derive(Debug, Clone, Copy)]
pub struct HeaderView<'a> {
    extension: &'a Header,
    primary: &'a Header,
}

impl<'a> HeaderView<'a> {
    pub fn new(extension: &'a Header, primary: &'a Header) -> Self {
        HeaderView { extension, primary }
    }

    pub fn extension(&self) -> &'a Header {
        self.extension
    }
}

impl Keywords for HeaderView<'_> {
    fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.extension.get(key).or_else(|| self.primary.get(key))
    }

    fn keys(&self) -> Vec<String> {
        self.extension
            .cards
            .keys()
            .chain(self.primary.cards.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One header unit of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Extension {
    Primary,
    /// Science extension `[sci,N]`, `N ≥ 1`.
    Sci(u32),
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extension::Primary => write!(f, "primary"),
            Extension::Sci(n) => write!(f, "sci,{n}"),
        }
    }
}

impl FromStr for Extension {
    type Err = MakeWcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("primary") {
            return Ok(Extension::Primary);
        }
        s.strip_prefix("sci,")
            .and_then(|n| n.trim().parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .map(Extension::Sci)
            .ok_or_else(|| MakeWcsError::InvalidImageSpec(format!("bad extension name {s}")))
    }
}

/// An extension of a given image file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionRef {
    pub file: Utf8PathBuf,
    pub extension: Extension,
}

impl ExtensionRef {
    pub fn new(file: impl Into<Utf8PathBuf>, extension: Extension) -> Self {
        ExtensionRef {
            file: file.into(),
            extension,
        }
    }

    /// Another extension of the same file.
    pub fn sibling(&self, extension: Extension) -> Self {
        ExtensionRef {
            file: self.file.clone(),
            extension,
        }
    }
}

impl fmt::Display for ExtensionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.file, self.extension)
    }
}

/// Source and sink of image headers.
///
/// `write_header` replaces the whole header of one extension and returns only
/// once the new content is durable.
pub trait HeaderStore {
    fn read_header(&self, file: &Utf8Path, extension: Extension) -> Result<Header, MakeWcsError>;

    fn write_header(
        &mut self,
        file: &Utf8Path,
        extension: Extension,
        header: &Header,
    ) -> Result<(), MakeWcsError>;
}

#[cfg(test)]
mod header_test {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let header = Header::new()
            .with("PA_V3", 45.5)
            .with("NEXTEND", 6i64)
            .with("CCDCHIP", "2 ")
            .with("DETECTOR", "WFC")
            .with("SUBARRAY", false);

        assert_eq!(header.require_f64("PA_V3").unwrap(), 45.5);
        assert_eq!(header.require_f64("NEXTEND").unwrap(), 6.0);
        assert_eq!(header.opt_u32("NEXTEND").unwrap(), Some(6));
        assert_eq!(header.opt_u32("CCDCHIP").unwrap(), Some(2));
        assert_eq!(header.opt_str("CCDCHIP").unwrap(), Some("2".into()));
        assert_eq!(header.opt_bool("SUBARRAY").unwrap(), Some(false));
        assert_eq!(header.opt_f64("VAFACTOR").unwrap(), None);

        assert_eq!(
            header.require_f64("VAFACTOR"),
            Err(MakeWcsError::MissingMetadata("keyword VAFACTOR not found".into()))
        );
        let err = header.require_f64("DETECTOR").unwrap_err();
        assert!(err.is_missing_metadata());
        assert_eq!(
            err,
            MakeWcsError::InvalidKeyword {
                key: "DETECTOR".into(),
                value: "'WFC'".into()
            }
        );
        assert!(header.opt_u32("DETECTOR").is_err());
        assert!(header.opt_str("PA_V3").is_err());
    }

    #[test]
    fn test_view_falls_back_to_primary() {
        let primary = Header::new().with("INSTRUME", "ACS").with("PA_V3", 10.0);
        let ext = Header::new().with("PA_V3", 20.0).with("CRVAL1", 1.0);
        let view = HeaderView::new(&ext, &primary);

        assert_eq!(view.require_str("INSTRUME").unwrap(), "ACS");
        assert_eq!(view.require_f64("PA_V3").unwrap(), 20.0);
        assert_eq!(view.keys(), vec!["CRVAL1", "INSTRUME", "PA_V3"]);
    }

    #[test]
    fn test_extension_names() {
        assert_eq!(Extension::Sci(2).to_string(), "sci,2");
        assert_eq!("sci,2".parse::<Extension>().unwrap(), Extension::Sci(2));
        assert_eq!("PRIMARY".parse::<Extension>().unwrap(), Extension::Primary);
        assert!("sci,0".parse::<Extension>().is_err());
        assert!("img".parse::<Extension>().is_err());
        assert!(Extension::Primary < Extension::Sci(1));

        let target = ExtensionRef::new("j8x/img_flt.fits", Extension::Sci(1));
        assert_eq!(target.to_string(), "j8x/img_flt.fits[sci,1]");
        assert_eq!(target.sibling(Extension::Primary).extension, Extension::Primary);
    }
}
