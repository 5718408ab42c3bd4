//! Results produced by external back-ends and solvers that are imported and compared.

pub mod adc;
pub mod hf_data;
pub mod reference_state;
