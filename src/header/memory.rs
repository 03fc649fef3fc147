//! In-process header store.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};

use super::{Extension, ExtensionRef, Header, HeaderStore};
use crate::makewcs_errors::MakeWcsError;

/// Headers kept in memory, with a journal of every write in commit order.
#[derive(Debug, Clone, Default)]
pub struct MemoryHeaderStore {
    headers: HashMap<(Utf8PathBuf, Extension), Header>,
    journal: Vec<(ExtensionRef, Header)>,
}

impl MemoryHeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(
        mut self,
        file: impl Into<Utf8PathBuf>,
        extension: Extension,
        header: Header,
    ) -> Self {
        self.insert(file, extension, header);
        self
    }

    /// Add or replace a header without recording it in the journal.
    pub fn insert(&mut self, file: impl Into<Utf8PathBuf>, extension: Extension, header: Header) {
        self.headers.insert((file.into(), extension), header);
    }

    pub fn header(&self, file: &Utf8Path, extension: Extension) -> Option<&Header> {
        self.headers.get(&(file.to_path_buf(), extension))
    }

    /// Every committed write, oldest first.
    pub fn journal(&self) -> &[(ExtensionRef, Header)] {
        &self.journal
    }
}

impl HeaderStore for MemoryHeaderStore {
    fn read_header(&self, file: &Utf8Path, extension: Extension) -> Result<Header, MakeWcsError> {
        self.header(file, extension).cloned().ok_or_else(|| {
            MakeWcsError::MissingMetadata(format!("no header for {file}[{extension}]"))
        })
    }

    fn write_header(
        &mut self,
        file: &Utf8Path,
        extension: Extension,
        header: &Header,
    ) -> Result<(), MakeWcsError> {
        self.headers
            .insert((file.to_path_buf(), extension), header.clone());
        self.journal
            .push((ExtensionRef::new(file, extension), header.clone()));
        Ok(())
    }
}
