//! Document Layer
//!
//! Turns recognized text into a typed record: line splitting, field
//! normalization, type classification and record assembly.

pub mod fields;
pub mod record;

pub use fields::{split_lines, DocumentType, FieldSet, MIN_FIELDS};
pub use record::{DocumentRecord, DriverLicense, GenericId, ImageRef};

use tracing::debug;

/// Run the full text-to-record pipeline on one recognized text blob
pub fn extract_record(text: &str, min_fields: usize, image_ref: ImageRef) -> DocumentRecord {
    let fields = FieldSet::normalize(split_lines(text), min_fields);
    let doc_type = DocumentType::classify(&fields);

    debug!(
        "Classified document as {:?} ({} of {} fields present)",
        doc_type,
        fields.present_count(),
        fields.len()
    );

    DocumentRecord::build(doc_type, &fields, image_ref)
}
