//! # Batch runs
//!
//! A run is described by an image specifier and a [`Mode`]. The specifier is
//! resolved into an ordered list of [`ImageSelection`]s, every selected science
//! extension is processed on its own, and each one gets an [`ExtensionOutcome`].
//! A failure is attributed to one `(image, extension)` and never stops the others.
//!
//! ## Image specifiers
//!
//! | Specifier          | Selects                                                      |
//! |--------------------|--------------------------------------------------------------|
//! | `img.fits[sci,2]`  | one science extension                                        |
//! | `img.fits[2]`      | the same, by extension version                               |
//! | `@list.txt`        | every specifier listed in the file, one per line             |
//! | `j8*_flt.fits`     | files matching the wildcard (`*`, `?`), all their extensions |
//! | `j8xx01`           | the file with that name, or every file containing it         |
//!
//! Without an explicit extension, the number of science extensions of a file is
//! `NEXTEND` divided by the extensions per exposure of its instrument
//! ([`ExtensionCounts`]).

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use log::{info, warn};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until},
    character::complete::{char, space0, u32 as parse_u32},
    combinator::{all_consuming, map, opt, rest},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};
use regex::Regex;

use crate::{
    distortion::repository::DistortionRepository,
    header::{archive::RestoreOutcome, Extension, ExtensionRef, HeaderStore, Keywords},
    instrument::ExtensionCounts,
    makewcs_errors::MakeWcsError,
    params::MakeWcsParams,
    parity::ParityTable,
    update::{UpdateOutcome, WcsUpdater},
};

/// A parsed image specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSpec {
    /// `file[sci,N]` or `file[N]`
    Extension { file: String, extension: Extension },
    /// `@listfile`
    List(String),
    /// A file name, a name fragment or a wildcard pattern.
    Pattern(String),
}

fn extension_suffix(input: &str) -> IResult<&str, u32> {
    delimited(
        char('['),
        delimited(
            space0,
            preceded(
                opt(terminated(tag_no_case("sci"), (space0, char(','), space0))),
                parse_u32,
            ),
            space0,
        ),
        char(']'),
    )
    .parse(input)
}

fn extension_spec(input: &str) -> IResult<&str, (&str, u32)> {
    all_consuming((take_until("["), extension_suffix)).parse(input)
}

fn list_spec(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), rest).parse(input)
}

/// Parse one image specifier.
pub fn parse_image_spec(spec: &str) -> Result<ImageSpec, MakeWcsError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(MakeWcsError::InvalidImageSpec("empty image specifier".into()));
    }

    let parsed: IResult<&str, ImageSpec> = alt((
        map(list_spec, |list: &str| ImageSpec::List(list.trim().to_string())),
        map(extension_spec, |(file, version): (&str, u32)| {
            ImageSpec::Extension {
                file: file.trim().to_string(),
                extension: Extension::Sci(version),
            }
        }),
    ))
    .parse(spec);

    match parsed {
        Ok((_, ImageSpec::Extension { extension: Extension::Sci(0), .. })) => Err(
            MakeWcsError::InvalidImageSpec(format!("{spec}: extension versions start at 1")),
        ),
        Ok((_, ImageSpec::Extension { file, .. })) if file.is_empty() => Err(
            MakeWcsError::InvalidImageSpec(format!("{spec}: no file name")),
        ),
        Ok((_, ImageSpec::List(list))) if list.is_empty() => Err(
            MakeWcsError::InvalidImageSpec(format!("{spec}: no list file")),
        ),
        Ok((_, parsed)) => Ok(parsed),
        Err(_) if spec.contains('[') || spec.contains(']') => Err(MakeWcsError::NomParsingError(
            format!("malformed extension in {spec}"),
        )),
        Err(_) => Ok(ImageSpec::Pattern(spec.to_string())),
    }
}

/// Which extensions of a file to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionSelection {
    /// Every science extension, counted from the primary header.
    All,
    One(Extension),
}

/// A file and the extensions to process in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSelection {
    pub file: Utf8PathBuf,
    pub extensions: ExtensionSelection,
}

impl ImageSelection {
    pub fn all(file: impl Into<Utf8PathBuf>) -> Self {
        ImageSelection {
            file: file.into(),
            extensions: ExtensionSelection::All,
        }
    }

    pub fn one(file: impl Into<Utf8PathBuf>, extension: Extension) -> Self {
        ImageSelection {
            file: file.into(),
            extensions: ExtensionSelection::One(extension),
        }
    }
}

/// Translate a wildcard pattern (`*`, `?`) into an anchored regex.
fn wildcard_regex(pattern: &str) -> Result<Regex, MakeWcsError> {
    let body = pattern
        .chars()
        .map(|c| match c {
            '*' => ".*".to_string(),
            '?' => ".".to_string(),
            c => regex::escape(&c.to_string()),
        })
        .collect::<String>();
    Regex::new(&format!("^{body}$"))
        .map_err(|e| MakeWcsError::InvalidImageSpec(format!("{pattern}: {e}")))
}

/// Visible file names of a directory, sorted.
fn file_names(dir: &Utf8Path) -> Result<Vec<String>, MakeWcsError> {
    let mut names = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() && !entry.file_name().starts_with('.') {
            names.push(entry.file_name().to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn expand_pattern(pattern: &str, dir: &Utf8Path) -> Result<Vec<ImageSelection>, MakeWcsError> {
    let path = Utf8Path::new(pattern);
    let (parent, name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (dir.join(parent), name),
        _ => {
            return Err(MakeWcsError::InvalidImageSpec(format!(
                "{pattern}: no file name"
            )))
        }
    };
    let relative = |file: &str| -> Utf8PathBuf {
        match path.parent() {
            Some(p) if !p.as_str().is_empty() => p.join(file),
            _ => Utf8PathBuf::from(file),
        }
    };

    let names = file_names(&parent)?;
    let matched: Vec<String> = if name.contains('*') || name.contains('?') {
        let re = wildcard_regex(name)?;
        names.into_iter().filter(|n| re.is_match(n)).collect()
    } else if names.iter().any(|n| n == name) {
        vec![name.to_string()]
    } else {
        names.into_iter().filter(|n| n.contains(name)).collect()
    };

    if matched.is_empty() {
        return Err(MakeWcsError::InvalidImageSpec(format!(
            "{pattern}: no matching file in {parent}"
        )));
    }
    Ok(matched
        .iter()
        .map(|n| ImageSelection::all(relative(n)))
        .collect())
}

/// Resolve an image specifier into the images to process.
///
/// Arguments
/// ---------
/// * `spec`: the specifier, see the module documentation
/// * `dir`: directory against which file names, patterns and list files are resolved
///
/// Return
/// ------
/// * the selections, in specifier order, without duplicates; paths are relative
///   to `dir` unless the specifier gave absolute ones
pub fn expand_image_spec(spec: &str, dir: &Utf8Path) -> Result<Vec<ImageSelection>, MakeWcsError> {
    let selections = match parse_image_spec(spec)? {
        ImageSpec::Extension { file, extension } => vec![ImageSelection::one(file, extension)],
        ImageSpec::Pattern(pattern) => expand_pattern(&pattern, dir)?,
        ImageSpec::List(list) => {
            let content = std::fs::read_to_string(dir.join(&list))?;
            let mut selections = Vec::new();
            for line in content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
            {
                if line.starts_with('@') {
                    return Err(MakeWcsError::InvalidImageSpec(format!(
                        "{list}: nested list {line}"
                    )));
                }
                selections.extend(expand_image_spec(line, dir)?);
            }
            selections
        }
    };
    Ok(selections.into_iter().unique().collect())
}

/// Update the WCS, or restore the archived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Update,
    Restore,
}

/// What happened to one extension.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionAction {
    Updated(UpdateOutcome),
    Restored(RestoreOutcome),
}

#[derive(Debug, PartialEq)]
pub struct ExtensionOutcome {
    /// The extension processed; `primary` when the file itself could not be read.
    pub target: ExtensionRef,
    pub result: Result<ExtensionAction, MakeWcsError>,
}

/// Outcomes of a batch run, in processing order.
#[derive(Debug, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<ExtensionOutcome>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &ExtensionOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Batch driver: a distortion repository, the static tables and the run parameters.
#[derive(Debug, Clone)]
pub struct MakeWcs<R> {
    repository: R,
    parity_table: ParityTable,
    extension_counts: ExtensionCounts,
    params: MakeWcsParams,
}

impl<R: DistortionRepository> MakeWcs<R> {
    pub fn new(repository: R, params: MakeWcsParams) -> Self {
        MakeWcs {
            repository,
            parity_table: ParityTable::standard(),
            extension_counts: ExtensionCounts::standard(),
            params,
        }
    }

    pub fn with_parity_table(mut self, parity_table: ParityTable) -> Self {
        self.parity_table = parity_table;
        self
    }

    pub fn with_extension_counts(mut self, extension_counts: ExtensionCounts) -> Self {
        self.extension_counts = extension_counts;
        self
    }

    pub fn params(&self) -> &MakeWcsParams {
        &self.params
    }

    pub fn updater(&self) -> WcsUpdater<'_, R> {
        WcsUpdater::new(&self.repository, &self.parity_table, &self.params)
    }

    /// Science extensions selected in one file.
    pub fn selected_extensions<S: HeaderStore + ?Sized>(
        &self,
        store: &S,
        selection: &ImageSelection,
    ) -> Result<Vec<ExtensionRef>, MakeWcsError> {
        match selection.extensions {
            ExtensionSelection::One(extension) => {
                Ok(vec![ExtensionRef::new(selection.file.clone(), extension)])
            }
            ExtensionSelection::All => {
                let primary = store.read_header(&selection.file, Extension::Primary)?;
                let instrument = primary.require_str("INSTRUME")?;
                let nextend = primary.opt_u32("NEXTEND")?.ok_or_else(|| {
                    MakeWcsError::MissingMetadata("keyword NEXTEND not found".into())
                })?;
                let imsets = self.extension_counts.imsets(&instrument, nextend)?;
                Ok((1..=imsets)
                    .map(|n| ExtensionRef::new(selection.file.clone(), Extension::Sci(n)))
                    .collect())
            }
        }
    }

    /// Process every selected extension.
    pub fn run<S: HeaderStore + ?Sized>(
        &self,
        store: &mut S,
        selections: &[ImageSelection],
        mode: Mode,
    ) -> BatchReport {
        let updater = self.updater();
        let mut report = BatchReport::default();

        for selection in selections {
            let targets = match self.selected_extensions(&*store, selection) {
                Ok(targets) => targets,
                Err(err) => {
                    warn!("Skipping {}: {err}", selection.file);
                    report.outcomes.push(ExtensionOutcome {
                        target: ExtensionRef::new(selection.file.clone(), Extension::Primary),
                        result: Err(err),
                    });
                    continue;
                }
            };

            for target in targets {
                let result = match mode {
                    Mode::Update => updater.update(store, &target).map(ExtensionAction::Updated),
                    Mode::Restore => updater
                        .restore(store, &target)
                        .map(ExtensionAction::Restored),
                };
                if let Err(err) = &result {
                    warn!("Skipping {target}: {err}");
                }
                report.outcomes.push(ExtensionOutcome { target, result });
            }
        }

        info!(
            "{} extension(s) processed, {} failed",
            report.outcomes.len(),
            report.failures().count()
        );
        report
    }

    /// Expand an image specifier against `dir` and process it.
    pub fn run_spec<S: HeaderStore + ?Sized>(
        &self,
        store: &mut S,
        spec: &str,
        dir: &Utf8Path,
        mode: Mode,
    ) -> Result<BatchReport, MakeWcsError> {
        let selections = expand_image_spec(spec, dir)?;
        Ok(self.run(store, &selections, mode))
    }
}
