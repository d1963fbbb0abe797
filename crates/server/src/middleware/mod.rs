//! HTTP middleware and extractors.
//!
//! - `owner` - Trusted owner identity from the upstream auth proxy
//! - `request_id` - Request ID generation and propagation

pub mod owner;
pub mod request_id;

pub use owner::{OWNER_ID_HEADER, OwnerRejection, RequireOwner};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
