pub mod draft;
pub mod schema;

pub use draft::{FieldRow, PipelineDraft};
pub use schema::ExtractionSchema;
