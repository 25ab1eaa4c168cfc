use serde_json::Value;

use dcmrelay_types::ValidationOutcome;

/// Result of a single `SOPInstanceUID` lookup against the archive.
#[derive(Debug, Clone)]
pub struct InstanceQuery {
    pub outcome: ValidationOutcome,
    pub http_status: String,
    pub detail: String,
    pub dataset: Value,
}

impl InstanceQuery {
    #[must_use]
    pub fn api_found(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Ok)
    }
}

/// The seven DICOM report fields read out of a QIDO-RS instance dataset,
/// plus the study UID used to group per-study reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFields {
    pub patient_name: String,
    pub birth_date: String,
    pub patient_id: String,
    pub accession_number: String,
    pub sex: String,
    pub study_date: String,
    pub study_description: String,
    pub study_uid: String,
}

const TAG_PATIENT_NAME: &str = "00100010";
const TAG_BIRTH_DATE: &str = "00100030";
const TAG_PATIENT_ID: &str = "00100020";
const TAG_ACCESSION_NUMBER: &str = "00080050";
const TAG_SEX: &str = "00100040";
const TAG_STUDY_DATE: &str = "00080020";
const TAG_STUDY_DESCRIPTION: &str = "00081030";
const TAG_STUDY_UID: &str = "0020000D";

impl ReportFields {
    /// Extract the report fields from a QIDO-RS instance dataset (the JSON
    /// object keyed by DICOM tag, as returned by the archive's `rs/instances`
    /// endpoint).
    #[must_use]
    pub fn from_dataset(dataset: &Value) -> Self {
        Self {
            patient_name: dicom_text(dataset, TAG_PATIENT_NAME),
            birth_date: dicom_text(dataset, TAG_BIRTH_DATE),
            patient_id: dicom_text(dataset, TAG_PATIENT_ID),
            accession_number: dicom_text(dataset, TAG_ACCESSION_NUMBER),
            sex: dicom_text(dataset, TAG_SEX),
            study_date: dicom_text(dataset, TAG_STUDY_DATE),
            study_description: dicom_text(dataset, TAG_STUDY_DESCRIPTION),
            study_uid: dicom_text(dataset, TAG_STUDY_UID),
        }
    }
}

/// Read a single text value out of a QIDO-RS `{"Value": [...]}` element.
///
/// The first array entry is either a scalar (numbers, strings) or, for
/// `PN`-typed tags like patient name, an object with an `Alphabetic` key —
/// falling back to the first non-null value of that object when
/// `Alphabetic` is absent.
fn dicom_text(dataset: &Value, tag: &str) -> String {
    let Some(values) = dataset.get(tag).and_then(|elem| elem.get("Value")) else {
        return String::new();
    };
    let Some(first) = values.as_array().and_then(|arr| arr.first()) else {
        return String::new();
    };

    match first {
        Value::Object(map) => {
            if let Some(alphabetic) = map.get("Alphabetic") {
                return json_scalar_to_string(alphabetic).trim().to_string();
            }
            map.values()
                .find(|v| !v.is_null())
                .map(|v| json_scalar_to_string(v).trim().to_string())
                .unwrap_or_default()
        }
        other => json_scalar_to_string(other).trim().to_string(),
    }
}

fn json_scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
