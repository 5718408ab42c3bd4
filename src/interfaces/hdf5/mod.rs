//! `hfcrossref` interface with HDF5 containers.
//!
//! Top-level datasets carry the canonical field names and the multipoles live in a nested
//! `multipoles` group, which is the layout written by the Python back-end drivers.

use std::path::{Path, PathBuf};

use anyhow::{self, Context};
use hdf5::{self, types::TypeDescriptor};
use ndarray::arr0;

use crate::interfaces::source::{ImportError, ReferenceDataSource, SourceMap, SourceValue};
use crate::target::hf_data::HfData;

#[cfg(test)]
#[path = "hdf5_tests.rs"]
mod hdf5_tests;

/// A Hartree-Fock data source backed by an open HDF5 file. The file is closed when this
/// structure is dropped.
#[derive(Debug)]
pub struct Hdf5Container {
    /// The path to the HDF5 file.
    path: PathBuf,

    /// The open HDF5 file.
    file: hdf5::File,
}

impl Hdf5Container {
    /// Opens an HDF5 file for reading.
    ///
    /// # Errors
    ///
    /// Errors with [`ImportError::Read`] if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let file = hdf5::File::open(&path)
            .map_err(|err| ImportError::read(path.display().to_string(), err))?;
        Ok(Self { path, file })
    }

    /// Returns the path to the HDF5 file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a dataset into a [`SourceValue`], converting any numeric array to `f64`.
    fn read_dataset(&self, dataset: &hdf5::Dataset, path: &str) -> Result<SourceValue, ImportError> {
        let read_err = |err: hdf5::Error| ImportError::read(format!("{}:{path}", self.path.display()), err);
        let descriptor = dataset
            .dtype()
            .and_then(|dtype| dtype.to_descriptor())
            .map_err(read_err)?;
        let scalar = dataset.ndim() == 0;
        match descriptor {
            TypeDescriptor::Boolean if scalar => {
                dataset.read_scalar::<bool>().map(SourceValue::Bool).map_err(read_err)
            }
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) if scalar => {
                dataset.read_scalar::<i64>().map(SourceValue::Int).map_err(read_err)
            }
            TypeDescriptor::Float(_) if scalar => {
                dataset.read_scalar::<f64>().map(SourceValue::Float).map_err(read_err)
            }
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Float(_) => {
                dataset.read_dyn::<f64>().map(SourceValue::Array).map_err(read_err)
            }
            other => Err(ImportError::invalid(
                path,
                format!("unsupported HDF5 datatype {other:?}"),
            )),
        }
    }

    /// Reads a group and everything below it into a [`SourceMap`].
    fn read_group(&self, group: &hdf5::Group, path: &str) -> Result<SourceMap, ImportError> {
        let read_err = |err: hdf5::Error| ImportError::read(format!("{}:{path}", self.path.display()), err);
        let mut map = SourceMap::new();
        for name in group.member_names().map_err(read_err)? {
            let child_path = format!("{path}/{name}");
            let value = if let Ok(dataset) = group.dataset(&name) {
                self.read_dataset(&dataset, &child_path)?
            } else {
                let child = group.group(&name).map_err(read_err)?;
                SourceValue::Group(self.read_group(&child, &child_path)?)
            };
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl ReferenceDataSource for Hdf5Container {
    fn contains(&self, path: &str) -> Result<bool, ImportError> {
        // Intermediate groups are checked one level at a time so that a missing parent reports
        // `false` instead of an HDF5 error.
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if !self.file.link_exists(&prefix) {
                return Ok(false);
            }
        }
        Ok(!prefix.is_empty())
    }

    fn materialise(&self, path: &str) -> Result<SourceValue, ImportError> {
        if !self.contains(path)? {
            return Err(ImportError::missing(path));
        }
        if let Ok(dataset) = self.file.dataset(path) {
            self.read_dataset(&dataset, path)
        } else {
            let group = self
                .file
                .group(path)
                .map_err(|err| ImportError::read(format!("{}:{path}", self.path.display()), err))?;
            self.read_group(&group, path).map(SourceValue::Group)
        }
    }
}

/// Writes the entries of a [`SourceMap`] into an HDF5 group, creating nested groups as needed.
fn write_group(group: &hdf5::Group, map: &SourceMap) -> Result<(), hdf5::Error> {
    for (name, value) in map.iter() {
        match value {
            SourceValue::Bool(b) => {
                group
                    .new_dataset_builder()
                    .with_data(&arr0(*b))
                    .create(name.as_str())?;
            }
            SourceValue::Int(i) => {
                group
                    .new_dataset_builder()
                    .with_data(&arr0(*i))
                    .create(name.as_str())?;
            }
            SourceValue::Float(x) => {
                group
                    .new_dataset_builder()
                    .with_data(&arr0(*x))
                    .create(name.as_str())?;
            }
            SourceValue::Array(arr) => {
                group
                    .new_dataset_builder()
                    .with_data(arr.view())
                    .create(name.as_str())?;
            }
            SourceValue::Group(submap) => {
                let subgroup = group.create_group(name)?;
                write_group(&subgroup, submap)?;
            }
        }
    }
    Ok(())
}

/// Writes Hartree-Fock data into a new HDF5 file, replacing any existing file at `path`.
///
/// # Arguments
///
/// * `data` - The data to be written.
/// * `path` - The path of the HDF5 file.
pub fn write_hf_data_hdf5<P: AsRef<Path>>(data: &HfData, path: P) -> Result<(), anyhow::Error> {
    let file = hdf5::File::create(&path)
        .with_context(|| format!("Unable to create HDF5 file {}", path.as_ref().display()))?;
    write_group(&file, &data.to_source_map()).with_context(|| {
        format!(
            "Unable to write Hartree-Fock data to {}",
            path.as_ref().display()
        )
    })?;
    file.close()?;
    Ok(())
}
