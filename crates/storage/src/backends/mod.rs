//! Storage backends.

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod s3;
