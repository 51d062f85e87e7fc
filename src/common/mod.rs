//! Common types shared by both document kinds.

pub mod error;
pub mod kind;
pub mod value;
pub mod xml;

pub use error::{ErrorClass, FailureKind};
pub use kind::DocumentKind;
pub use value::Value;
