//! Core types for Storeforge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod dns;
pub mod hostname;
pub mod id;
pub mod status;

pub use dns::{DnsRecord, DnsRecordType};
pub use hostname::{Hostname, HostnameError};
pub use id::*;
pub use status::*;
