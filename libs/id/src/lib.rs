//! # cadence-id
//!
//! Typed identities for the records a schedule day is built from.
//!
//! ## Design Principles
//!
//! - IDs are issued by the booking system; the schedule core never invents
//!   identities for existing records
//! - All IDs have a canonical string representation with strict parsing
//! - IDs are typed so an instructor can never be passed where an engagement
//!   is expected
//!
//! ## ID Format
//!
//! All record IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `ins_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `eng_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `les_01HV4Z4NYPLTRS0JTUA8XDME5F`

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
