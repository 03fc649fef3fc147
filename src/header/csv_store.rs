//! # CSV header store
//!
//! Each image file is represented by a keyword dump with one card per row:
//!
//! ```text
//! extension,keyword,kind,value
//! primary,INSTRUME,str,ACS
//! sci,1,CRVAL1,float,150.11
//! ```
//!
//! (the `extension` column is quoted by the writer when it contains a comma).
//! Floats are written with the shortest representation that parses back to
//! the same value, so a restore reproduces archived values bit for bit.
//!
//! Writes rewrite the whole file: the new content goes to a temporary file in
//! the same directory, is flushed to disk with `sync_all`, then renamed over
//! the original. The parent directory is synced after the rename so the new
//! directory entry is durable as well.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use super::{Extension, Header, HeaderStore, HeaderValue, Keywords};
use crate::makewcs_errors::MakeWcsError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CardKind {
    Str,
    Float,
    Int,
    Bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CardRow {
    extension: String,
    keyword: String,
    kind: CardKind,
    value: String,
}

impl CardRow {
    fn new(extension: Extension, keyword: &str, value: &HeaderValue) -> Self {
        let (kind, value) = match value {
            HeaderValue::Str(s) => (CardKind::Str, s.clone()),
            HeaderValue::Float(v) => (CardKind::Float, v.to_string()),
            HeaderValue::Int(v) => (CardKind::Int, v.to_string()),
            HeaderValue::Bool(b) => (CardKind::Bool, if *b { "T" } else { "F" }.to_string()),
        };
        CardRow {
            extension: extension.to_string(),
            keyword: keyword.to_string(),
            kind,
            value,
        }
    }

    fn value(&self) -> Result<HeaderValue, MakeWcsError> {
        let bad = || MakeWcsError::InvalidKeyword {
            key: self.keyword.clone(),
            value: self.value.clone(),
        };
        Ok(match self.kind {
            CardKind::Str => HeaderValue::Str(self.value.clone()),
            CardKind::Float => HeaderValue::Float(self.value.parse().map_err(|_| bad())?),
            CardKind::Int => HeaderValue::Int(self.value.parse().map_err(|_| bad())?),
            CardKind::Bool => match self.value.as_str() {
                "T" => HeaderValue::Bool(true),
                "F" => HeaderValue::Bool(false),
                _ => return Err(bad()),
            },
        })
    }
}

/// Header store over CSV keyword dumps, one file per image.
#[derive(Debug, Clone, Default)]
pub struct CsvHeaderStore {
    root: Option<Utf8PathBuf>,
}

impl CsvHeaderStore {
    /// Store resolving image paths as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store resolving relative image paths against `root`.
    pub fn with_root(root: impl Into<Utf8PathBuf>) -> Self {
        CsvHeaderStore {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, file: &Utf8Path) -> Utf8PathBuf {
        match &self.root {
            Some(root) if file.is_relative() => root.join(file),
            _ => file.to_path_buf(),
        }
    }

    /// Every header of a file, by extension.
    pub fn read_all(&self, file: &Utf8Path) -> Result<BTreeMap<Extension, Header>, MakeWcsError> {
        let path = self.resolve(file);
        let mut reader = csv::Reader::from_path(&path)?;
        let mut headers: BTreeMap<Extension, Header> = BTreeMap::new();
        for row in reader.deserialize::<CardRow>() {
            let row = row?;
            let extension: Extension = row.extension.parse()?;
            let value = row.value()?;
            headers.entry(extension).or_default().cards.insert(row.keyword, value);
        }
        Ok(headers)
    }

    /// Replace the content of a file with `headers`.
    pub fn write_all(
        &self,
        file: &Utf8Path,
        headers: &BTreeMap<Extension, Header>,
    ) -> Result<(), MakeWcsError> {
        let path = self.resolve(file);

        let mut writer = csv::Writer::from_writer(Vec::new());
        for (extension, header) in headers {
            for key in header.keys() {
                if let Some(value) = header.get(&key) {
                    writer.serialize(CardRow::new(*extension, &key, value))?;
                }
            }
        }
        let content = writer
            .into_inner()
            .map_err(|e| io::Error::other(e.to_string()))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| MakeWcsError::Utf8PathError(format!("{path} has no file name")))?;
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));
        {
            let mut out = File::create(&tmp)?;
            out.write_all(&content)?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        sync_parent(&path)?;
        Ok(())
    }
}

/// Flush the directory holding `path`, committing a rename into it.
#[cfg(unix)]
fn sync_parent(path: &Utf8Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    File::open(dir)?.sync_all()
}

/// Directories cannot be opened as files here; the rename is left to the OS.
#[cfg(not(unix))]
fn sync_parent(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}

impl HeaderStore for CsvHeaderStore {
    fn read_header(&self, file: &Utf8Path, extension: Extension) -> Result<Header, MakeWcsError> {
        self.read_all(file)?.remove(&extension).ok_or_else(|| {
            MakeWcsError::MissingMetadata(format!("no header for {file}[{extension}]"))
        })
    }

    fn write_header(
        &mut self,
        file: &Utf8Path,
        extension: Extension,
        header: &Header,
    ) -> Result<(), MakeWcsError> {
        let mut headers = if self.resolve(file).exists() {
            self.read_all(file)?
        } else {
            BTreeMap::new()
        };
        headers.insert(extension, header.clone());
        self.write_all(file, &headers)
    }
}
