//! # MechaHelper Store
//!
//! File-backed state for the homework bot. Everything is plain JSON on disk,
//! human-readable and replaced atomically on every save.
//!
//! ```text
//! AssignmentService ──► RecordStore ──► homework.json
//!        │
//!        └──► MediaStore ──► media/<date>_<name>
//! SubscriberRegistry ──► subscribers.json
//! ```
//!
//! Stores are read-modify-write. The service and the registry each own a
//! lock so that one load-mutate-save sequence never interleaves with another.

pub mod assignments;
pub mod date_prefix;
pub mod media;
pub mod store;
pub mod subscribers;

pub use assignments::{AssignmentService, AttachmentUpload, Clock, DeleteOutcome, NewAssignment};
pub use date_prefix::{DatePrefix, parse_date_prefix};
pub use media::MediaStore;
pub use store::{Assignments, RecordStore};
pub use subscribers::{AddOutcome, RemoveOutcome, SubscriberRegistry};
