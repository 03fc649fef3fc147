//! # Per-extension WCS update
//!
//! [`WcsUpdater`] recomputes the WCS of one science extension and commits it
//! through the archive protocol of [`crate::header::archive`].
//!
//! ## Pipeline
//!
//! 1. Read the extension header and the primary header of its file; keywords
//!    missing from the extension are looked up in the primary header.
//! 2. Select the [`InstrumentProfile`] and resolve chip, reference chip,
//!    filters, parity and velocity-aberration factor.
//! 3. Read the current WCS of the reference chip (its archived values when an
//!    archive exists, so that repeated runs start from the delivered WCS).
//! 4. Fetch both distortion models from the [`DistortionRepository`], with the
//!    offset-table correction for the profiles that use one.
//! 5. Bring the models to image pixels: subarray recentering when requested,
//!    then the `LTV1/LTV2` offset of each extension.
//! 6. Build the tangent plane on the reference chip, compose the chip's WCS and
//!    convert its higher-order terms to SIP. A degenerate Jacobian drops the SIP
//!    terms with a warning and keeps the linear WCS.
//! 7. Archive the current values and write the new ones.
//!
//! [`WcsUpdater::restore`] undoes an update from the archived values.

use log::{debug, info, warn};

use crate::{
    chip_wcs::ChipWcsComposer,
    constants::Pixel,
    distortion::{
        repository::{DistortionRepository, ModelRequest},
        DistortionModel,
    },
    header::{
        archive::{archive_then_replace, archived_or_current, restore_extension, RestoreOutcome},
        Extension, ExtensionRef, Header, HeaderStore, HeaderView, Keywords,
    },
    instrument::InstrumentProfile,
    makewcs_errors::MakeWcsError,
    params::MakeWcsParams,
    parity::ParityTable,
    reference_frame::ReferenceFrameBuilder,
    sip::convert_to_sip,
    time::parse_date_obs,
    wcs::ChipWcs,
};

/// What an update wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub wcs: ChipWcs,
    /// `false` when an existing archive was kept.
    pub archive_written: bool,
}

/// `(LTV1, LTV2)` of an extension, zero when absent.
fn pixel_frame_offset(header: &Header) -> Result<(Pixel, Pixel), MakeWcsError> {
    Ok((
        header.opt_f64("LTV1")?.unwrap_or(0.0),
        header.opt_f64("LTV2")?.unwrap_or(0.0),
    ))
}

/// Center of a subarray readout in image pixels, `None` for a full-frame image.
fn subarray_center(header: &impl Keywords) -> Result<Option<(Pixel, Pixel)>, MakeWcsError> {
    if header.opt_bool("SUBARRAY")? != Some(true) {
        return Ok(None);
    }
    Ok(Some((
        header.require_f64("NAXIS1")? / 2.0,
        header.require_f64("NAXIS2")? / 2.0,
    )))
}

/// Recomputes and writes the WCS of image extensions.
pub struct WcsUpdater<'a, R: ?Sized> {
    repository: &'a R,
    parity_table: &'a ParityTable,
    params: &'a MakeWcsParams,
}

impl<'a, R: DistortionRepository + ?Sized> WcsUpdater<'a, R> {
    pub fn new(repository: &'a R, parity_table: &'a ParityTable, params: &'a MakeWcsParams) -> Self {
        WcsUpdater {
            repository,
            parity_table,
            params,
        }
    }

    /// New WCS of an extension, without writing anything.
    pub fn compute<S: HeaderStore + ?Sized>(
        &self,
        store: &S,
        target: &ExtensionRef,
    ) -> Result<ChipWcs, MakeWcsError> {
        let primary = store.read_header(&target.file, Extension::Primary)?;
        let header = store.read_header(&target.file, target.extension)?;
        self.compute_with(store, target, &header, &primary)
    }

    /// Recompute the WCS of an extension and commit it.
    ///
    /// Return
    /// ------
    /// * the new WCS and whether an archive was written, or the first error met;
    ///   nothing is written when the computation fails
    pub fn update<S: HeaderStore + ?Sized>(
        &self,
        store: &mut S,
        target: &ExtensionRef,
    ) -> Result<UpdateOutcome, MakeWcsError> {
        let primary = store.read_header(&target.file, Extension::Primary)?;
        let header = store.read_header(&target.file, target.extension)?;
        let wcs = self.compute_with(&*store, target, &header, &primary)?;

        let archive_written = archive_then_replace(
            store,
            &target.file,
            target.extension,
            header,
            &wcs,
            self.params,
        )?;
        Ok(UpdateOutcome {
            wcs,
            archive_written,
        })
    }

    /// Put the archived WCS of an extension back in place.
    pub fn restore<S: HeaderStore + ?Sized>(
        &self,
        store: &mut S,
        target: &ExtensionRef,
    ) -> Result<RestoreOutcome, MakeWcsError> {
        restore_extension(
            store,
            &target.file,
            target.extension,
            &self.params.archive_prefix,
        )
    }

    fn compute_with<S: HeaderStore + ?Sized>(
        &self,
        store: &S,
        target: &ExtensionRef,
        header: &Header,
        primary: &Header,
    ) -> Result<ChipWcs, MakeWcsError> {
        let view = HeaderView::new(header, primary);
        let profile = InstrumentProfile::from_header(&view)?;
        let prefix = self.params.archive_prefix.as_str();

        let table = view.require_str("IDCTAB")?;
        if table.is_empty() || !self.repository.has_table(&table) {
            return Err(MakeWcsError::MissingMetadata(format!(
                "IDCTAB {table:?} could not be found"
            )));
        }

        let offset_table = if profile.uses_offset_table() {
            view.opt_str("OFFTAB")?
                .filter(|t| !t.is_empty() && t != "N/A")
        } else {
            None
        };
        let date_obs = view.opt_str("DATE-OBS")?;
        debug!("OFFTAB, DATE-OBS: {offset_table:?}, {date_obs:?}");
        let date = date_obs.as_deref().map(parse_date_obs).transpose()?;

        info!("Updating image {target}");

        let pa_v3 = view.require_f64("PA_V3")?;
        let (filter1, filter2) = profile.resolve_filters(&view)?;
        let chip = profile.resolve_chip_id(&view)?;
        let reference_chip = profile.reference_chip_id(&view)?;
        let parity = profile.parity_matrix(self.parity_table)?;
        let va_factor = if profile.reads_velocity_aberration() {
            view.require_f64("VAFACTOR")?
        } else {
            1.0
        };
        debug!("PA_V3: {pa_v3}, chip #{chip}, reference chip #{reference_chip}, VA factor: {va_factor}");

        let reference_extension = profile.reference_extension();
        let reference_header = if reference_extension == target.extension {
            header.clone()
        } else {
            store.read_header(&target.file, reference_extension)?
        };
        let reference_wcs = archived_or_current(&reference_header, prefix)?;

        let request = |chip: u32| ModelRequest {
            table: table.clone(),
            chip,
            filter1: filter1.clone(),
            filter2: filter2.clone(),
            date,
            offset_table: offset_table.clone(),
        };
        let model = self.repository.read_distortion_model(&request(chip))?;
        let reference_model = self
            .repository
            .read_distortion_model(&request(reference_chip))?;
        debug!(
            "Reference chip scale (arcsec/pix): {}",
            reference_model.pscale
        );

        let model = self.in_image_pixels(model, &view, header)?;
        let (dx, dy) = pixel_frame_offset(&reference_header)?;
        let reference_model = reference_model.in_pixel_frame(dx, dy);

        let frame =
            ReferenceFrameBuilder::new(parity).build(pa_v3, &reference_wcs, &reference_model)?;
        let wcs = ChipWcsComposer::new(parity).compose(&model, &reference_model, &frame, va_factor)?;

        let sip = if self.params.write_sip {
            match convert_to_sip(&model) {
                Ok(sip) => Some(sip),
                Err(err @ MakeWcsError::DegenerateJacobian(_)) => {
                    warn!("{target}: {err}; SIP keywords omitted");
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        Ok(ChipWcs { wcs, sip })
    }

    /// Express a chip model in the image pixels of its extension.
    fn in_image_pixels(
        &self,
        model: DistortionModel,
        view: &HeaderView<'_>,
        header: &Header,
    ) -> Result<DistortionModel, MakeWcsError> {
        let (ltv1, ltv2) = pixel_frame_offset(header)?;

        let model = match subarray_center(view)? {
            Some((cx, cy)) if self.params.recenter_subarray => {
                let x_shift = cx - ltv1 - model.xref;
                let y_shift = cy - ltv2 - model.yref;
                debug!("Recentering distortion model on subarray center, shift ({x_shift}, {y_shift})");
                model.recentered(x_shift, y_shift)
            }
            _ => model,
        };

        Ok(model.in_pixel_frame(ltv1, ltv2))
    }
}
