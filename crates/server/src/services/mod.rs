//! Business logic services.
//!
//! # Services
//!
//! - `domains` - Façade for adding, verifying, deleting and publishing domains
//! - `verification` - DNS verification state machine and batch checks
//! - `publication` - Theme publication binding
//! - `scheduler` - Background refresh task

pub mod domains;
pub mod publication;
pub mod scheduler;
pub mod verification;

pub use domains::DomainService;
pub use publication::PublicationBinder;
pub use scheduler::spawn_refresh_task;
pub use verification::{
    CheckOptions, CheckOutcome, CheckScope, NOT_REGISTERED_MESSAGE, UNREACHABLE_MESSAGE,
    VerificationEngine, describe_failure,
};
