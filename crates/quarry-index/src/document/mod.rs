//! Document accumulation and finalized document trees.

pub mod element;
pub mod stored;

pub use element::DocumentElement;
pub use stored::{StoredField, StoredObject};
