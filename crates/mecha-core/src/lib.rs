//! # MechaHelper Core
//! Shared building blocks for the homework bot: error type, configuration,
//! domain types and the `Transport` trait every chat backend implements.

pub mod config;
pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use config::MechaConfig;
pub use error::{MechaError, Result};
pub use traits::{Choice, Transport};
pub use types::{AssignmentRecord, Attachment, IncomingEvent, MediaKind, RecipientId};
