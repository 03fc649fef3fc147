#![allow(dead_code)]

use approx::assert_relative_eq;
use makewcs::{
    distortion::repository::{DistortionCatalog, DistortionEntry},
    header::{memory::MemoryHeaderStore, Extension, Header},
    DistortionModel, LinearWcs,
};

/// Plate scale of the synthetic chips, in arcsec/pixel.
pub const PSCALE: f64 = 0.05;

/// `CDi_j` magnitude matching [`PSCALE`], in degrees/pixel.
pub const SCALE: f64 = PSCALE / 3600.0;

/// Two-chip ACS/WFC-like distortion table: chip 2 on the V1 axis, chip 1
/// `v3_separation` arcsec above it, both with a pure scale.
pub fn wfc_catalog(v3_separation: f64) -> DistortionCatalog {
    let chip2 = DistortionModel::linear(PSCALE, (2048.0, 1024.0), (0.0, 0.0)).unwrap();
    let chip1 = DistortionModel::linear(PSCALE, (2048.0, 1024.0), (0.0, v3_separation)).unwrap();
    DistortionCatalog::new().with_table(
        "wfc_idc",
        vec![DistortionEntry::new(1, chip1), DistortionEntry::new(2, chip2)],
    )
}

/// Science header with a delivered WCS and the chip number.
pub fn sci_header(crval: (f64, f64), ccdchip: i64) -> Header {
    Header::new()
        .with("CCDCHIP", ccdchip)
        .with("CRVAL1", crval.0)
        .with("CRVAL2", crval.1)
        .with("CRPIX1", 2048.0)
        .with("CRPIX2", 1024.0)
        .with("CD1_1", -SCALE)
        .with("CD1_2", 0.0)
        .with("CD2_1", 0.0)
        .with("CD2_2", SCALE)
}

/// Primary header of a two-chip WFC exposure.
pub fn wfc_primary(pa_v3: f64, va_factor: f64) -> Header {
    Header::new()
        .with("INSTRUME", "ACS")
        .with("DETECTOR", "WFC")
        .with("IDCTAB", "wfc_idc")
        .with("FILTER1", "F606W")
        .with("FILTER2", "CLEAR2L")
        .with("DATE-OBS", "2004-03-12")
        .with("PA_V3", pa_v3)
        .with("VAFACTOR", va_factor)
        .with("NEXTEND", 6i64)
}

/// Store holding one WFC exposure: `sci,1` is chip 2, `sci,2` is chip 1.
pub fn wfc_store(file: &str, pa_v3: f64, va_factor: f64) -> MemoryHeaderStore {
    MemoryHeaderStore::new()
        .with_header(file, Extension::Primary, wfc_primary(pa_v3, va_factor))
        .with_header(file, Extension::Sci(1), sci_header((150.1, 2.2), 2))
        .with_header(file, Extension::Sci(2), sci_header((150.1, 2.2), 1))
}

pub fn assert_wcs_close(actual: &LinearWcs, expected: &LinearWcs, epsilon: f64) {
    assert_relative_eq!(actual.crval.x, expected.crval.x, epsilon = epsilon);
    assert_relative_eq!(actual.crval.y, expected.crval.y, epsilon = epsilon);
    assert_relative_eq!(actual.crpix.x, expected.crpix.x, epsilon = epsilon);
    assert_relative_eq!(actual.crpix.y, expected.crpix.y, epsilon = epsilon);
    for (a, e) in actual.cd.iter().zip(expected.cd.iter()) {
        assert_relative_eq!(*a, *e, epsilon = epsilon);
    }
}
