//! # makewcs
//!
//! Recomputation of the world coordinate system of HST science extensions from
//! the spacecraft orientation (`PA_V3`, `RA_TARG`, `DEC_TARG`) and the
//! polynomial distortion model of each chip.
//!
//! ## Overview
//!
//! For every science extension the update runs the same steps:
//!
//! 1. the instrument and detector are identified from the headers
//!    ([`instrument::InstrumentProfile`]) and the distortion models of the chip and
//!    of the reference chip are fetched from a [`distortion::repository::DistortionRepository`],
//! 2. an undistorted reference frame is built at the reference chip
//!    ([`reference_frame::ReferenceFrameBuilder`]),
//! 3. the chip's tangent point and CD matrix are derived from that frame
//!    ([`chip_wcs::ChipWcsComposer`]), with the velocity aberration applied when known,
//! 4. the higher-order terms of the model are converted into SIP coefficients
//!    ([`sip::convert_to_sip`]),
//! 5. the previous WCS is archived under a keyword prefix and replaced
//!    ([`header::archive`]).
//!
//! [`batch::MakeWcs`] runs this over image specifiers (`file[sci,N]`, wildcards,
//! `@list` files) and can restore the archived values instead.
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use makewcs::{
//!     batch::{MakeWcs, Mode},
//!     distortion::repository::DistortionCatalog,
//!     header::csv_store::CsvHeaderStore,
//!     params::MakeWcsParams,
//! };
//!
//! let catalog = DistortionCatalog::new();
//! let driver = MakeWcs::new(catalog, MakeWcsParams::default());
//! let mut store = CsvHeaderStore::with_root("data");
//! let report = driver
//!     .run_spec(&mut store, "j8*_flt.csv", Utf8Path::new("data"), Mode::Update)
//!     .unwrap();
//! assert!(report.is_success());
//! ```

pub mod angles;
pub mod batch;
pub mod chip_wcs;
pub mod constants;
pub mod distortion;
pub mod header;
pub mod instrument;
pub mod makewcs_errors;
pub mod params;
pub mod parity;
pub mod reference_frame;
pub mod sip;
pub mod time;
pub mod update;
pub mod wcs;

pub use batch::{expand_image_spec, BatchReport, MakeWcs, Mode};
pub use distortion::DistortionModel;
pub use makewcs_errors::MakeWcsError;
pub use params::MakeWcsParams;
pub use update::WcsUpdater;
pub use wcs::{ChipWcs, LinearWcs};
