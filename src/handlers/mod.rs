//! Work that runs off the caller's thread
pub mod cleanup;
