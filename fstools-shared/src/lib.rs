//! fstools shared code
//!
//! Error type, well-known names and fixed filesystem layout used by the
//! `mount_root` binary, its volume library and the test utilities.

pub mod constants;
pub mod errors;
pub mod layout;

pub use errors::{FstoolsError, FstoolsResult};
