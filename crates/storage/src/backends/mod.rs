//! Object store backends.

pub mod memory;
pub mod s3;
