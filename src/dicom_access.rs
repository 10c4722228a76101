use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);

/// Current values of the two identity fields a pseudonymized record carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
}

/// Small helper trait to read and overwrite the identity fields on different DICOM object shapes.
pub trait IdentityFields {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn put_str(&mut self, tag: Tag, vr: VR, value: &str);

    fn identity(&self) -> Identity {
        Identity {
            patient_name: self.element_str(PATIENT_NAME),
            patient_id: self.element_str(PATIENT_ID),
        }
    }

    /// Write the same pseudonym into PatientName and PatientID.
    fn set_identity(&mut self, pseudonym: &str) {
        self.put_str(PATIENT_NAME, VR::PN, pseudonym);
        self.put_str(PATIENT_ID, VR::LO, pseudonym);
    }
}

// Padding added on write must not leak into comparisons.
fn trim_padding(value: &str) -> String {
    value.trim_end_matches([' ', '\0']).to_string()
}

impl IdentityFields for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| trim_padding(&s))
    }

    fn put_str(&mut self, tag: Tag, vr: VR, value: &str) {
        self.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
    }
}

impl IdentityFields for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| trim_padding(&s))
    }

    fn put_str(&mut self, tag: Tag, vr: VR, value: &str) {
        self.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
    }
}
