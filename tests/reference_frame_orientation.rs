mod common;

use approx::assert_relative_eq;
use makewcs::{
    batch::{ImageSelection, MakeWcs, Mode},
    distortion::repository::{DistortionCatalog, DistortionEntry},
    header::{memory::MemoryHeaderStore, Extension, ExtensionRef, Header},
    instrument::ExtensionCounts,
    parity::{identity_parity, ParityTable},
    reference_frame::ReferenceFrameBuilder,
    DistortionModel, MakeWcsParams,
};
use proptest::prelude::*;

use common::{assert_wcs_close, sci_header, PSCALE, SCALE};

const FILE: &str = "twochip.fits";

/// Two chips sharing one focal-plane position, identity parity.
fn driver() -> MakeWcs<DistortionCatalog> {
    let model = DistortionModel::linear(PSCALE, (2048.0, 1024.0), (0.0, 0.0)).unwrap();
    let catalog = DistortionCatalog::new().with_table(
        "idc",
        vec![
            DistortionEntry::new(1, model.clone()),
            DistortionEntry::new(2, model),
        ],
    );
    MakeWcs::new(catalog, MakeWcsParams::default())
        .with_parity_table(ParityTable::new().with_detector("CCD", identity_parity()))
        .with_extension_counts(ExtensionCounts::new().with_instrument("TWOCHIP", 1))
}

fn store(pa_v3: f64) -> MemoryHeaderStore {
    let primary = Header::new()
        .with("INSTRUME", "TWOCHIP")
        .with("DETECTOR", "CCD")
        .with("IDCTAB", "idc")
        .with("PA_V3", pa_v3)
        .with("NEXTEND", 2i64);
    MemoryHeaderStore::new()
        .with_header(FILE, Extension::Primary, primary)
        .with_header(FILE, Extension::Sci(1), sci_header((30.0, 0.0), 1))
        .with_header(FILE, Extension::Sci(2), sci_header((30.0, 0.0), 2))
}

#[test]
fn test_hand_computed_cd_at_45_degrees() {
    let mut store = store(45.0);
    let report = driver().run(&mut store, &[ImageSelection::all(FILE)], Mode::Update);
    assert!(report.is_success());

    let (s, c) = 45f64.to_radians().sin_cos();
    let expected = [[SCALE * c, -SCALE * s], [SCALE * s, SCALE * c]];

    let mut composed = Vec::new();
    for extension in [Extension::Sci(1), Extension::Sci(2)] {
        let wcs = driver()
            .updater()
            .compute(&store, &ExtensionRef::new(FILE, extension))
            .unwrap()
            .wcs;
        composed.push(wcs);
        for (i, row) in expected.iter().enumerate() {
            for (j, want) in row.iter().enumerate() {
                assert_relative_eq!(wcs.cd[(i, j)], *want, epsilon = 1e-9);
            }
        }
        assert_relative_eq!(wcs.crval.x, 30.0, epsilon = 1e-9);
        assert_relative_eq!(wcs.crval.y, 0.0, epsilon = 1e-9);
        assert_eq!((wcs.crpix.x, wcs.crpix.y), (2048.0, 1024.0));
    }
    // zero separation: both chips get the same WCS
    assert_wcs_close(&composed[0], &composed[1], 1e-12);
}

proptest! {
    #[test]
    fn prop_reference_chip_takes_frame_orientation(pa_v3 in 0.0f64..360.0) {
        let wcs = driver()
            .updater()
            .compute(&store(pa_v3), &ExtensionRef::new(FILE, Extension::Sci(1)))
            .unwrap()
            .wcs;
        let frame_cd = ReferenceFrameBuilder::new(identity_parity()).cd_matrix(pa_v3, PSCALE);
        for (got, want) in wcs.cd.iter().zip(frame_cd.iter()) {
            prop_assert!((got - want).abs() < 1e-12);
        }
        prop_assert!((wcs.pixel_scale() - SCALE).abs() < 1e-12);
    }
}
