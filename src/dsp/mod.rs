// src/dsp/mod.rs
//
// Signal-processing building blocks used by voices and the master section.

mod chorus;
mod hpf;
pub mod scaler;
mod vcf;

pub use chorus::{BbdChorus, ChorusMode};
pub use hpf::HighPassFilter;
pub use vcf::NonlinearVcf;
