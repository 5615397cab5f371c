//! Bulk CSV user import: tokenize, map headers, resolve classes, assemble
//! draft records, then preview and submit them as one batch.
//!
//! The CSV dialect is deliberately minimal: comma separated, first line is
//! the header, no quoting or escaping.

mod assemble;
mod classes;
mod csv;
mod fields;
mod report;
mod session;
mod templates;

pub use assemble::{RandomPhones, SubmitRecord};
pub use classes::ClassRef;
pub use fields::Role;
pub use report::{CreatedUser, ImportResult, RowError};
pub use session::{BulkCreate, BulkCreateError, ImportSession, ImportStage, SessionError};
pub use templates::TemplateKind;

#[allow(unused_imports)]
pub use assemble::{parse_import_text, ImportOptions, WarningCode};
