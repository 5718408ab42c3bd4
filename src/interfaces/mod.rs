//! Interfaces between `hfcrossref` and external back-ends, files, and users.

use anyhow;

pub mod binaries;
pub mod cli;
#[cfg(feature = "hdf5-container")]
pub mod hdf5;
pub mod input;
pub mod solver;
pub mod source;

/// Trait for handling a parsed input.
pub trait InputHandle {
    /// Handles the input section and runs appropriate calculations.
    fn handle(&self) -> Result<(), anyhow::Error>;
}
