//! Ingestion payload binding
//!
//! Payload fields are looked up by the column each attribute maps to and
//! converted to the attribute's declared type. A bound [`Record`] compiles
//! into a single upsert request.

mod record;
mod upsert;

pub use record::{BoundField, FieldDescriptor, FieldRole, Record, RecordBinder};
pub use upsert::compile_upsert;
