mod document;
mod marker;
mod mutator;

pub use document::{Anchor, Document, Span};
pub use marker::{Marker, MarkerRegistry};
pub use mutator::DocumentMutator;
