//! # Constants and type definitions for makewcs
//!
//! This module centralizes the **unit conversions**, **type aliases** and the
//! **header keyword names** shared by the WCS recomputation pipeline.
//!
//! ## Overview
//!
//! - Angle conversions (degrees ↔ radians ↔ arcseconds)
//! - Core type aliases used across the crate
//! - Names of the WCS keywords that are read, written and archived

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds in one degree
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Detector pixel coordinate
pub type Pixel = f64;
/// Modified Julian Date (days)
pub type MJD = f64;

// -------------------------------------------------------------------------------------------------
// Header keywords
// -------------------------------------------------------------------------------------------------

/// The linear WCS keywords, in the order they are archived and restored.
pub const WCS_KEYWORDS: [&str; 8] = [
    "CRVAL1", "CRVAL2", "CRPIX1", "CRPIX2", "CD1_1", "CD1_2", "CD2_1", "CD2_2",
];

/// Longest keyword name a FITS header card accepts.
pub const MAX_KEYWORD_LEN: usize = 8;
