//! Inputs the core reads but never owns: templates, matter data and
//! retrieved context.

mod context;
mod matter;
mod template;

pub use context::{ContextBundle, Passage, QueryMetadata};
pub use matter::{MatterContext, Party, ValidationReport};
pub use template::{DocumentType, Section, Template, UnknownDocumentType};
