//! Request context and identifier extraction.

mod identifiers;
mod request;

pub use identifiers::Identifiers;
pub use request::{QueryParam, RequestContext};
