//! Domain models for custom domains and theme publications.

pub mod check;
pub mod domain;
pub mod publication;

pub use check::{CheckFailure, CheckReport};
pub use domain::{Domain, StatusUpdate};
pub use publication::{PublicationStatus, ThemePublication};
