//! # oskit-core
//!
//! Host facilities shared by the oskit crates.
//!
//! - **OS identity**: a one-shot snapshot of the running operating system
//! - **Paths**: text and filesystem-aware operations on platform-native paths
//! - **Bitwise tables**: symbolic `name|name` flag strings against name/bit tables
//! - **Environment**: typed access to environment variables

pub mod bitwise;
pub mod env;
pub mod error;
pub mod osinfo;
pub mod paths;

// Re-exports for convenience
pub use bitwise::{BitEntry, BitTable};
pub use error::{BitwiseError, ConfigError, Error, PathError, Result};
pub use osinfo::{OsFamily, OsInfo, OsType};
