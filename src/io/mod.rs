//! Persistence of `hfcrossref` containers and configuration files.
//!
//! Binary files are `bincode` encodings named `<name>.<ext>` with the extension fixed by their
//! [`XrefFileType`]; configuration files are YAML.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{self, Context};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub(crate) mod format;

#[cfg(test)]
#[path = "io_tests.rs"]
mod io_tests;

/// The kinds of binary files `hfcrossref` reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XrefFileType {
    /// A container of Hartree-Fock reference data, stored as a nested source map.
    HfData,

    /// An ADC result together with any properties attached to it.
    AdcResult,
}

impl XrefFileType {
    /// Returns the extension of the file type.
    pub fn ext(&self) -> &'static str {
        match self {
            XrefFileType::HfData => "xref.hf",
            XrefFileType::AdcResult => "xref.adc",
        }
    }

    /// Returns the full path of a file of this type given its name without extensions.
    ///
    /// Only the extensions are appended: a name already containing a dot keeps it.
    pub fn path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        let mut path = name.as_ref().as_os_str().to_owned();
        path.push(".");
        path.push(self.ext());
        PathBuf::from(path)
    }
}

impl fmt::Display for XrefFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XrefFileType::HfData => write!(f, "Hartree-Fock container"),
            XrefFileType::AdcResult => write!(f, "ADC result file"),
        }
    }
}

/// Reads a binary file of the given type.
///
/// # Arguments
///
/// * `name` - The name of the file without its extensions.
/// * `file_type` - The type of the file, fixing its extensions.
///
/// # Errors
///
/// Errors naming the file type and path if the file cannot be opened or decoded.
pub fn read_xref_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: XrefFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = file_type.path(name);
    let file = File::open(&path)
        .with_context(|| format!("Unable to open {file_type} {}", path.display()))?;
    bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("Unable to decode {file_type} {}", path.display()))
}

/// Writes a binary file of the given type, replacing any existing one.
///
/// # Arguments
///
/// * `name` - The name of the file without its extensions.
/// * `file_type` - The type of the file, fixing its extensions.
/// * `value` - The structure to be encoded.
pub fn write_xref_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: XrefFileType,
    value: &T,
) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let path = file_type.path(name);
    let file = File::create(&path)
        .with_context(|| format!("Unable to create {file_type} {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), value)
        .with_context(|| format!("Unable to encode {file_type} {}", path.display()))
}

/// Reads a YAML configuration file.
///
/// # Arguments
///
/// * `path` - The path to the file, including its extension.
pub fn read_xref_yaml<T, P: AsRef<Path>>(path: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Unable to open configuration {}", path.display()))?;
    serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("Unable to parse configuration {}", path.display()))
}

/// Writes a YAML configuration file.
///
/// # Arguments
///
/// * `path` - The path to the file. A `.yml` extension is added unless it already ends in
/// `.yml` or `.yaml`.
/// * `value` - The structure to be written.
///
/// # Returns
///
/// The path actually written.
pub fn write_xref_yaml<T, P: AsRef<Path>>(path: P, value: &T) -> Result<PathBuf, anyhow::Error>
where
    T: Serialize,
{
    let mut path = path.as_ref().to_path_buf();
    if !matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml" | "yaml")
    ) {
        let mut name = path.into_os_string();
        name.push(".yml");
        path = PathBuf::from(name);
    }
    let file = File::create(&path)
        .with_context(|| format!("Unable to create configuration {}", path.display()))?;
    serde_yaml::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("Unable to write configuration {}", path.display()))?;
    Ok(path)
}
