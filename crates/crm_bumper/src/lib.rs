//! C11: the stateful version bumper driving `crm bump-recipe`.

pub mod bumper;
pub mod error;

pub use bumper::{VersionBumper, VersionBumperOptions};
pub use error::BumpError;
