//! # WCS archive and restore
//!
//! Before new WCS values are written, the current `CRVAL`, `CRPIX` and `CD`
//! keywords are copied under a reserved prefix (`OCRVAL1`, `OCD1_1`, … with the
//! default prefix `O`). An existing archive is never overwritten unless asked
//! for, so repeated runs keep the values the image was delivered with.
//!
//! The archive is committed to the store before the new values are: a crash
//! between the two writes leaves an image that can still be restored.
//!
//! Restoring copies the archive back over the current keywords and leaves the
//! archive in place.
//!
//! An archive holding only some of the eight keywords is an error for every
//! reader. Only an update with `overwrite_archive` set replaces it.

use std::sync::LazyLock;

use camino::Utf8Path;
use log::{debug, info, warn};
use regex::Regex;

use super::{Extension, Header, HeaderStore, HeaderValue, Keywords, KeywordsMut};
use crate::{
    constants::WCS_KEYWORDS,
    makewcs_errors::MakeWcsError,
    params::MakeWcsParams,
    sip::SipCoefficients,
    wcs::{ChipWcs, LinearWcs},
};

static SIP_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[AB]_(\d+_\d+|ORDER)$").expect("SIP keyword pattern is valid")
});

/// Result of a restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The archived values were copied back.
    Restored,
    /// The extension has no archive; nothing was changed.
    NoArchive,
}

fn archived_key(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

/// `true` when every linear WCS keyword has an archived copy.
pub fn has_archive(header: &impl Keywords, prefix: &str) -> bool {
    matches!(check_archive(header, prefix), Ok(true))
}

/// Check the archive under `prefix`.
///
/// Return
/// ------
/// * `true` when every archived keyword is present, `false` when none is
/// * a [`MakeWcsError::MissingMetadata`] naming the absent keywords when only some are
pub fn check_archive(header: &impl Keywords, prefix: &str) -> Result<bool, MakeWcsError> {
    let missing: Vec<String> = WCS_KEYWORDS
        .iter()
        .map(|key| archived_key(prefix, key))
        .filter(|key| !header.contains(key))
        .collect();
    match missing.len() {
        0 => Ok(true),
        n if n == WCS_KEYWORDS.len() => Ok(false),
        _ => Err(MakeWcsError::MissingMetadata(format!(
            "incomplete WCS archive under prefix {prefix}, missing {}",
            missing.join(", ")
        ))),
    }
}

/// Read the linear WCS stored under `prefix` (`""` for the current values).
pub fn read_wcs(header: &impl Keywords, prefix: &str) -> Result<LinearWcs, MakeWcsError> {
    let mut values = [0.0; 8];
    for (value, key) in values.iter_mut().zip(WCS_KEYWORDS) {
        *value = header.require_f64(&archived_key(prefix, key))?;
    }
    let [crval1, crval2, crpix1, crpix2, cd11, cd12, cd21, cd22] = values;
    Ok(LinearWcs::new(
        (crval1, crval2),
        (crpix1, crpix2),
        nalgebra::Matrix2::new(cd11, cd12, cd21, cd22),
    ))
}

/// Write a linear WCS under `prefix` (`""` for the current keywords).
pub fn write_wcs(header: &mut impl KeywordsMut, wcs: &LinearWcs, prefix: &str) {
    let values = [
        wcs.crval.x,
        wcs.crval.y,
        wcs.crpix.x,
        wcs.crpix.y,
        wcs.cd[(0, 0)],
        wcs.cd[(0, 1)],
        wcs.cd[(1, 0)],
        wcs.cd[(1, 1)],
    ];
    for (key, value) in WCS_KEYWORDS.iter().zip(values) {
        header.set(&archived_key(prefix, key), HeaderValue::Float(value));
    }
}

/// The archived WCS when there is one, else the current one.
pub fn archived_or_current(header: &impl Keywords, prefix: &str) -> Result<LinearWcs, MakeWcsError> {
    if check_archive(header, prefix)? {
        read_wcs(header, prefix)
    } else {
        read_wcs(header, "")
    }
}

/// Copy the keywords of the linear WCS from one prefix to another, values untouched.
fn copy_wcs_keywords(
    header: &mut impl KeywordsMut,
    from: &str,
    to: &str,
) -> Result<(), MakeWcsError> {
    let mut copied = Vec::with_capacity(WCS_KEYWORDS.len());
    for key in WCS_KEYWORDS {
        let source = archived_key(from, key);
        let value = header.get(&source).cloned().ok_or_else(|| {
            MakeWcsError::MissingMetadata(format!("keyword {source} not found"))
        })?;
        copied.push((archived_key(to, key), value));
    }
    for (key, value) in copied {
        header.set(&key, value);
    }
    Ok(())
}

/// Replace the SIP keywords of a header.
///
/// Every existing `A_p_q`, `B_p_q`, `A_ORDER` and `B_ORDER` is removed first,
/// then the new terms are written when `sip` is given.
pub fn write_sip(header: &mut Header, sip: Option<&SipCoefficients>) {
    for key in header.keys() {
        if SIP_KEYWORD.is_match(&key) {
            header.remove(&key);
        }
    }
    if let Some(sip) = sip {
        header.set("A_ORDER", HeaderValue::Int(sip.order as i64));
        header.set("B_ORDER", HeaderValue::Int(sip.order as i64));
        for (key, value) in sip.keywords() {
            header.set(&key, HeaderValue::Float(value));
        }
    }
}

/// Archive the current WCS of an extension, then replace it with a new one.
///
/// Arguments
/// ---------
/// * `store`: where the header is committed
/// * `file`, `extension`: the extension being updated
/// * `header`: its current header, as read from `store`
/// * `new`: the new WCS and SIP terms
/// * `params`: archive prefix, overwrite policy and whether SIP keywords are written
///
/// Return
/// ------
/// * `true` when an archive was written, `false` when an existing one was kept
/// * an error, with nothing written, when the archive is incomplete and
///   `overwrite_archive` is not set
pub fn archive_then_replace<S: HeaderStore + ?Sized>(
    store: &mut S,
    file: &Utf8Path,
    extension: Extension,
    mut header: Header,
    new: &ChipWcs,
    params: &MakeWcsParams,
) -> Result<bool, MakeWcsError> {
    let prefix = params.archive_prefix.as_str();

    let archived = if params.overwrite_archive || !check_archive(&header, prefix)? {
        copy_wcs_keywords(&mut header, "", prefix)?;
        store.write_header(file, extension, &header)?;
        debug!("Archived WCS of {file}[{extension}] under prefix {prefix}");
        true
    } else {
        false
    };

    write_wcs(&mut header, &new.wcs, "");
    if params.write_sip {
        write_sip(&mut header, new.sip.as_ref());
    }
    store.write_header(file, extension, &header)?;
    Ok(archived)
}

/// Copy the archived WCS back over the current values of a header.
pub fn restore_wcs(header: &mut Header, prefix: &str) -> Result<RestoreOutcome, MakeWcsError> {
    if !check_archive(header, prefix)? {
        return Ok(RestoreOutcome::NoArchive);
    }
    copy_wcs_keywords(header, prefix, "")?;
    Ok(RestoreOutcome::Restored)
}

/// Restore the archived WCS of one extension in a store.
pub fn restore_extension<S: HeaderStore + ?Sized>(
    store: &mut S,
    file: &Utf8Path,
    extension: Extension,
    prefix: &str,
) -> Result<RestoreOutcome, MakeWcsError> {
    let mut header = store.read_header(file, extension)?;
    let outcome = restore_wcs(&mut header, prefix)?;
    match outcome {
        RestoreOutcome::Restored => {
            info!("Restoring original WCS values for {file}[{extension}]");
            store.write_header(file, extension, &header)?;
        }
        RestoreOutcome::NoArchive => {
            warn!("No archived WCS under prefix {prefix} in {file}[{extension}], nothing restored");
        }
    }
    Ok(outcome)
}
