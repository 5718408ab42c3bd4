//! `hfcrossref` interface with binary containers.
//!
//! A binary container is a [`SourceMap`] serialised with `bincode` into a file carrying the
//! [`XrefFileType::HfData`] extension. The nesting of groups is preserved exactly, so a
//! container written by [`write_hf_data_binary`] imports back into identical data.

use std::path::{Path, PathBuf};

use anyhow::{self, Context};

use crate::interfaces::source::{ImportError, ReferenceDataSource, SourceMap, SourceValue};
use crate::io::{read_xref_binary, write_xref_binary, XrefFileType};
use crate::target::hf_data::HfData;


/// A Hartree-Fock data source read from a binary container.
#[derive(Clone, Debug)]
pub struct BinaryContainer {
    /// The path to the container, including its extension.
    path: PathBuf,

    /// The fully-read contents of the container.
    contents: SourceMap,
}

impl BinaryContainer {
    /// Reads a binary container.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the container without its `.xref.hf` extension.
    ///
    /// # Errors
    ///
    /// Errors with [`ImportError::Read`] if the file cannot be opened or decoded.
    pub fn open<P: AsRef<Path>>(name: P) -> Result<Self, ImportError> {
        let path = XrefFileType::HfData.path(&name);
        let contents = read_xref_binary::<SourceMap, _>(&name, XrefFileType::HfData)
            .map_err(|err| ImportError::read(path.display().to_string(), format!("{err:#}")))?;
        log::debug!(
            "Read {} top-level entries from binary container {}.",
            contents.len(),
            path.display()
        );
        Ok(Self { path, contents })
    }

    /// Returns the path to the container.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReferenceDataSource for BinaryContainer {
    fn contains(&self, path: &str) -> Result<bool, ImportError> {
        self.contents.contains(path)
    }

    fn materialise(&self, path: &str) -> Result<SourceValue, ImportError> {
        self.contents.materialise(path)
    }
}

/// Writes Hartree-Fock data into a binary container.
///
/// # Arguments
///
/// * `data` - The data to be written.
/// * `name` - The name of the container without its `.xref.hf` extension.
pub fn write_hf_data_binary<P: AsRef<Path>>(data: &HfData, name: P) -> Result<(), anyhow::Error> {
    write_xref_binary(&name, XrefFileType::HfData, &data.to_source_map()).with_context(|| {
        format!(
            "Unable to write Hartree-Fock data to {}",
            XrefFileType::HfData.path(&name).display()
        )
    })
}
