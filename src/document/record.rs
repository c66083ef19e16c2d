//! Typed document records
//!
//! Maps positional fields onto the two record shapes. The positions form an
//! implicit contract with the text recognizer's line ordering; they are kept
//! in [`FieldLayout`] so the mapping lives in one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::trace;

use super::fields::{split_date_issuer, DocumentType, FieldSet};

/// Reference to a stored image (a file path in this tool)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field positions for one document shape
///
/// `address` lists every position whose text is concatenated into the address.
/// `issue_date`/`issuer` either name two separate positions or, when
/// `date_issuer` is set, a single composite position split at fixed offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub version: u32,
    pub doc_type: usize,
    pub license_type: Option<usize>,
    pub number: Option<usize>,
    pub name: usize,
    pub phone: usize,
    pub address: &'static [usize],
    pub issue_date: Option<usize>,
    pub issuer: Option<usize>,
    pub date_issuer: Option<usize>,
}

impl FieldLayout {
    pub const DRIVER_LICENSE_V1: FieldLayout = FieldLayout {
        version: 1,
        doc_type: 0,
        license_type: Some(1),
        number: Some(2),
        name: 3,
        phone: 4,
        address: &[5, 6],
        issue_date: None,
        issuer: None,
        date_issuer: Some(11),
    };

    pub const GENERIC_ID_V1: FieldLayout = FieldLayout {
        version: 1,
        doc_type: 0,
        license_type: None,
        number: None,
        name: 1,
        phone: 2,
        address: &[3, 4],
        issue_date: Some(5),
        issuer: Some(6),
        date_issuer: None,
    };

    /// Current layout for a document type
    pub fn for_type(doc_type: DocumentType) -> &'static FieldLayout {
        match doc_type {
            DocumentType::DriverLicense => &Self::DRIVER_LICENSE_V1,
            DocumentType::GenericId => &Self::GENERIC_ID_V1,
        }
    }
}

/// Driver license attributes (`drivecard` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverLicense {
    pub doc_type: Option<String>,
    pub license_type: Option<String>,
    pub number: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub issue_date: Option<String>,
    pub issuer: Option<String>,
    pub image_ref: ImageRef,
}

/// Generic identity card attributes (`idcard` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericId {
    pub doc_type: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub issue_date: Option<String>,
    pub issuer: Option<String>,
    pub image_ref: ImageRef,
}

/// One extracted document, tagged by type
///
/// `None` attributes mark positions the recognizer did not produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentRecord {
    DriverLicense(DriverLicense),
    GenericId(GenericId),
}

impl DocumentRecord {
    /// Assemble a record from normalized fields. Never fails: missing
    /// positions become absent attributes.
    pub fn build(doc_type: DocumentType, fields: &FieldSet, image_ref: ImageRef) -> Self {
        let layout = FieldLayout::for_type(doc_type);
        trace!("Mapping fields with {:?} layout v{}", doc_type, layout.version);
        let at = |idx: usize| fields.get(idx).map(str::to_string);
        let at_opt = |idx: Option<usize>| idx.and_then(at);

        let (issue_date, issuer) = match layout.date_issuer {
            Some(idx) => match fields.get(idx) {
                Some(composite) => {
                    let pair = split_date_issuer(composite);
                    (Some(pair.date), Some(pair.issuer))
                }
                None => (None, None),
            },
            None => (at_opt(layout.issue_date), at_opt(layout.issuer)),
        };

        let address = concat_present(fields, layout.address);

        match doc_type {
            DocumentType::DriverLicense => DocumentRecord::DriverLicense(DriverLicense {
                doc_type: at(layout.doc_type),
                license_type: at_opt(layout.license_type),
                number: at_opt(layout.number),
                name: at(layout.name),
                phone: at(layout.phone),
                address,
                issue_date,
                issuer,
                image_ref,
            }),
            DocumentType::GenericId => DocumentRecord::GenericId(GenericId {
                doc_type: at(layout.doc_type),
                name: at(layout.name),
                phone: at(layout.phone),
                address,
                issue_date,
                issuer,
                image_ref,
            }),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            DocumentRecord::DriverLicense(_) => DocumentType::DriverLicense,
            DocumentRecord::GenericId(_) => DocumentType::GenericId,
        }
    }

    pub fn image_ref(&self) -> &ImageRef {
        match self {
            DocumentRecord::DriverLicense(r) => &r.image_ref,
            DocumentRecord::GenericId(r) => &r.image_ref,
        }
    }

    /// Copy of this record pointing at a different image
    pub fn with_image_ref(&self, image_ref: ImageRef) -> Self {
        let mut record = self.clone();
        match &mut record {
            DocumentRecord::DriverLicense(r) => r.image_ref = image_ref,
            DocumentRecord::GenericId(r) => r.image_ref = image_ref,
        }
        record
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DocumentRecord::DriverLicense(r) => r.name.as_deref(),
            DocumentRecord::GenericId(r) => r.name.as_deref(),
        }
    }
}

/// Concatenate the present fields at `indices`; absent only if all are absent
fn concat_present(fields: &FieldSet, indices: &[usize]) -> Option<String> {
    let parts: Vec<&str> = indices.iter().filter_map(|&idx| fields.get(idx)).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fields::MIN_FIELDS;

    fn snapshot() -> ImageRef {
        ImageRef::new("snapshot.jpg")
    }

    #[test]
    fn test_build_driver_license_end_to_end() {
        let text = "2\nB\n12345\nKim\n010-1111\nSeoul\nGangnam\n\n\n\n\n2024.01.01 CityHall";
        let fields = FieldSet::from_text(text);
        let doc_type = DocumentType::classify(&fields);
        assert_eq!(doc_type, DocumentType::DriverLicense);

        let record = DocumentRecord::build(doc_type, &fields, snapshot());
        let DocumentRecord::DriverLicense(dl) = record else {
            panic!("expected driver license record");
        };

        assert_eq!(dl.doc_type.as_deref(), Some("2"));
        assert_eq!(dl.license_type.as_deref(), Some("B"));
        assert_eq!(dl.number.as_deref(), Some("12345"));
        assert_eq!(dl.name.as_deref(), Some("Kim"));
        assert_eq!(dl.phone.as_deref(), Some("010-1111"));
        assert_eq!(dl.address.as_deref(), Some("SeoulGangnam"));
        assert_eq!(dl.issue_date.as_deref(), Some("2024.01.01"));
        assert_eq!(dl.issuer.as_deref(), Some("CityHall"));
        assert_eq!(dl.image_ref, snapshot());
    }

    #[test]
    fn test_build_generic_id() {
        let text = "ID\nLee\n010-2222\nBusan\nHaeundae\n2019.07.07\nBusan Mayor";
        let fields = FieldSet::from_text(text);
        let record = DocumentRecord::build(DocumentType::classify(&fields), &fields, snapshot());

        let DocumentRecord::GenericId(id) = record else {
            panic!("expected generic id record");
        };
        assert_eq!(id.doc_type.as_deref(), Some("ID"));
        assert_eq!(id.name.as_deref(), Some("Lee"));
        assert_eq!(id.phone.as_deref(), Some("010-2222"));
        assert_eq!(id.address.as_deref(), Some("BusanHaeundae"));
        assert_eq!(id.issue_date.as_deref(), Some("2019.07.07"));
        assert_eq!(id.issuer.as_deref(), Some("Busan Mayor"));
    }

    #[test]
    fn test_build_with_missing_fields_never_fails() {
        let fields = FieldSet::normalize(vec!["1".to_string()], MIN_FIELDS);
        let record = DocumentRecord::build(DocumentType::DriverLicense, &fields, snapshot());

        let DocumentRecord::DriverLicense(dl) = record else {
            panic!("expected driver license record");
        };
        assert_eq!(dl.doc_type.as_deref(), Some("1"));
        assert!(dl.license_type.is_none());
        assert!(dl.number.is_none());
        assert!(dl.name.is_none());
        assert!(dl.address.is_none());
        assert!(dl.issue_date.is_none());
        assert!(dl.issuer.is_none());
    }

    #[test]
    fn test_build_empty_field_set() {
        let fields = FieldSet::normalize(vec![], MIN_FIELDS);
        let record = DocumentRecord::build(DocumentType::GenericId, &fields, snapshot());
        assert_eq!(record.document_type(), DocumentType::GenericId);
        assert!(record.name().is_none());
    }

    #[test]
    fn test_address_with_one_missing_part() {
        let fields = FieldSet::from_text("ID\nPark\n010\nIncheon");
        let record = DocumentRecord::build(DocumentType::GenericId, &fields, snapshot());
        let DocumentRecord::GenericId(id) = record else {
            panic!("expected generic id record");
        };
        assert_eq!(id.address.as_deref(), Some("Incheon"));
    }

    #[test]
    fn test_short_composite_field() {
        let mut lines: Vec<String> = vec!["1"; 11].into_iter().map(String::from).collect();
        lines.push("2024.".to_string());
        let fields = FieldSet::normalize(lines, MIN_FIELDS);
        let record = DocumentRecord::build(DocumentType::DriverLicense, &fields, snapshot());

        let DocumentRecord::DriverLicense(dl) = record else {
            panic!("expected driver license record");
        };
        assert_eq!(dl.issue_date.as_deref(), Some("2024."));
        assert_eq!(dl.issuer.as_deref(), Some(""));
    }

    #[test]
    fn test_with_image_ref_only_changes_image() {
        let fields = FieldSet::from_text("2\nB\n12345\nKim");
        let template = DocumentRecord::build(DocumentType::DriverLicense, &fields, snapshot());
        let replica = template.with_image_ref(ImageRef::new("face_0.jpg"));

        assert_eq!(replica.image_ref().as_str(), "face_0.jpg");
        assert_eq!(template.image_ref(), &snapshot());
        assert_eq!(replica.with_image_ref(snapshot()), template);
    }

    #[test]
    fn test_record_json_is_tagged() {
        let fields = FieldSet::from_text("ID\nLee");
        let record = DocumentRecord::build(DocumentType::GenericId, &fields, snapshot());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "generic_id");
        assert_eq!(json["name"], "Lee");
        assert_eq!(json["image_ref"], "snapshot.jpg");
        assert!(json["phone"].is_null());
    }

    #[test]
    fn test_layout_for_type() {
        assert_eq!(FieldLayout::for_type(DocumentType::DriverLicense).date_issuer, Some(11));
        assert_eq!(FieldLayout::for_type(DocumentType::GenericId).address, &[3, 4]);
    }
}
