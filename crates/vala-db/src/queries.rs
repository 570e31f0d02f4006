//! Query functions, one submodule per table group.

pub mod device_sets;
pub mod pulses;
pub mod settings;
