//! Repository traits for data access layer
//!
//! Services talk to storage only through these traits. Storage backends
//! (see `tollgate-storage-sqlite`) implement them.

pub mod attempt;

pub use attempt::AttemptRepository;
