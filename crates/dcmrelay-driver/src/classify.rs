//! DICOM-domain regex classifiers (spec §4.6/§4.7, grounded on
//! `domain/constants.py`'s `DCM4CHE_*`/`DCMTK_*` patterns).

use std::collections::HashMap;

use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::{BatchCorrelation, FileOutcome};
use dcmrelay_types::SendStatus;

static DCM4CHE_STORE_RQ: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<<\s+\d+:C-STORE-RQ\[.*?iuid=([0-9]+(?:\.[0-9]+)+)\s+-").unwrap()
});
static DCM4CHE_STORE_RSP_OK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)>>\s+\d+:C-STORE-RSP\[.*?status=0H.*?iuid=([0-9]+(?:\.[0-9]+)+)\s+-").unwrap()
});
// Python's `status=(?!0H)[A-F0-9]+H` lookahead has no `regex` crate
// equivalent; `0H` is filtered out of the capture loop instead.
static DCM4CHE_STORE_RSP_ERR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)>>\s+\d+:C-STORE-RSP\[.*?status=([A-F0-9]+H)\b.*?iuid=([0-9]+(?:\.[0-9]+)+)\s+-").unwrap()
});

static DCMTK_SENDING_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"I:\s+Sending file:\s+(.+)$").unwrap());
static DCMTK_BAD_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"E:\s+Bad DICOM file:\s+(.+?):\s*(.+)$").unwrap());
static DCMTK_STORE_RSP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"I:\s+Received Store Response\s+\((.+)\)$").unwrap());
static DCMTK_NO_SOP_UID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E:\s+No SOP Class or Instance UID in file:\s+(.+)$").unwrap());
static DCMTK_STORE_FAILED_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E:\s+Store Failed,\s*file:\s+(.+?):\s*$").unwrap());
static DCMTK_STORE_FAILED_REASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)E:\s+([0-9A-F]{4}:[0-9A-F]{4}\s+.+)$").unwrap());

static UID_TAG_0008_0018: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(0008,0018\)[^\[]*\[([^\]]*)\]").unwrap());
static UID_TAG_0002_0010: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(0002,0010\)[^\[]*\[([^\]]*)\]").unwrap());
static UID_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)+").unwrap());

/// The `dcm4che`-specific `<<`/`>>` RQ/RSP correlation, matched against the
/// whole output blob (spec §4.6: these spans can straddle line boundaries).
#[must_use]
pub fn classify_dcm4che_output(blob: &str) -> BatchCorrelation {
    let rq_iuids = DCM4CHE_STORE_RQ
        .captures_iter(blob)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let ok_iuids = DCM4CHE_STORE_RSP_OK
        .captures_iter(blob)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let mut err_iuids = Vec::new();
    let mut err_status_by_iuid = HashMap::new();
    for caps in DCM4CHE_STORE_RSP_ERR.captures_iter(blob) {
        let status = caps[1].trim().to_string();
        let iuid = caps[2].trim().to_string();
        if iuid.is_empty() || status.eq_ignore_ascii_case("0H") {
            continue;
        }
        err_iuids.push(iuid.clone());
        err_status_by_iuid.insert(iuid, status);
    }

    BatchCorrelation {
        rq_iuids,
        ok_iuids,
        err_iuids,
        err_status_by_iuid,
    }
}

/// Stateful per-line DCMTK classification: the current "Sending file"/"Store
/// Failed" file carries across lines until a response or reason line closes
/// it out (spec §4.7, grounded on `toolkit_drivers.py::DcmtkDriver.parse_send_output`).
#[must_use]
pub fn classify_dcmtk_output(lines: &[String], batch_files: &[&Utf8Path]) -> HashMap<String, FileOutcome> {
    let mut result: HashMap<String, FileOutcome> = HashMap::new();
    let mut current_file = String::new();
    let mut pending_failed_file = String::new();

    for line in lines {
        if let Some(caps) = DCMTK_SENDING_FILE.captures(line) {
            current_file = caps[1].trim().to_string();
            result.entry(current_file.clone()).or_insert(FileOutcome {
                send_status: SendStatus::SentUnknown,
                status_detail: "File sending initiated; awaiting response".to_string(),
            });
            pending_failed_file.clear();
            continue;
        }
        if let Some(caps) = DCMTK_BAD_FILE.captures(line) {
            let bad_file = caps[1].trim().to_string();
            let detail = caps[2].trim().to_string();
            result.insert(
                bad_file,
                FileOutcome {
                    send_status: SendStatus::NonDicom,
                    status_detail: detail,
                },
            );
            pending_failed_file.clear();
            continue;
        }
        if let Some(caps) = DCMTK_NO_SOP_UID.captures(line) {
            let bad_file = caps[1].trim().to_string();
            result.insert(
                bad_file.clone(),
                FileOutcome {
                    send_status: SendStatus::SentUnknown,
                    status_detail: "No SOP Class or Instance UID in file".to_string(),
                },
            );
            pending_failed_file.clear();
            current_file = bad_file;
            continue;
        }
        if let Some(caps) = DCMTK_STORE_FAILED_FILE.captures(line) {
            pending_failed_file = caps[1].trim().to_string();
            result.insert(
                pending_failed_file.clone(),
                FileOutcome {
                    send_status: SendStatus::SentUnknown,
                    status_detail: "Store failed; awaiting reason line".to_string(),
                },
            );
            current_file = pending_failed_file.clone();
            continue;
        }
        if let Some(caps) = DCMTK_STORE_FAILED_REASON.captures(line) {
            if !pending_failed_file.is_empty() {
                let detail = caps[1].trim().to_string();
                result.insert(
                    pending_failed_file.clone(),
                    FileOutcome {
                        send_status: SendStatus::SentUnknown,
                        status_detail: detail,
                    },
                );
                pending_failed_file.clear();
                continue;
            }
        }
        if let Some(caps) = DCMTK_STORE_RSP.captures(line) {
            if !current_file.is_empty() {
                let detail = caps[1].trim().to_string();
                let mut status = if detail.contains("Success") {
                    SendStatus::SentOk
                } else {
                    SendStatus::SendFail
                };
                let is_dicomdir = Utf8Path::new(&current_file)
                    .file_name()
                    .map(|name| name.eq_ignore_ascii_case("DICOMDIR"))
                    .unwrap_or(false);
                if detail.contains("Unknown Status: 0x110") && is_dicomdir {
                    status = SendStatus::UnsupportedDicomObject;
                }
                result.insert(
                    current_file.clone(),
                    FileOutcome {
                        send_status: status,
                        status_detail: detail,
                    },
                );
                pending_failed_file.clear();
            }
        }
    }

    for path in batch_files {
        let key = path.as_str().to_string();
        result.entry(key).or_insert(FileOutcome {
            send_status: SendStatus::SentUnknown,
            status_detail: "parse_status=UNKNOWN;reason=no_match_in_output".to_string(),
        });
    }

    result
}

/// Extract `(0008,0018)` (`SOP Instance UID`) from `dcmdump`-style text.
#[must_use]
pub fn extract_sop_instance_uid(dcmdump_text: &str) -> Option<String> {
    UID_TAG_0008_0018
        .captures(dcmdump_text)
        .map(|c| normalize_uid_candidate(&c[1]))
        .filter(|s| !s.is_empty())
}

/// Extract `(0002,0010)` (`Transfer Syntax UID`) from `dcmdump`-style text.
#[must_use]
pub fn extract_transfer_syntax_uid(dcmdump_text: &str) -> Option<String> {
    UID_TAG_0002_0010
        .captures(dcmdump_text)
        .map(|c| normalize_uid_candidate(&c[1]))
        .filter(|s| !s.is_empty())
}

/// The first dotted-numeric run in `value` (a DICOM UID shape), or empty.
#[must_use]
pub fn sanitize_uid(value: &str) -> String {
    UID_VALUE
        .find(value.trim())
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// `dcmdump` output sometimes wraps UID text across whitespace; collapse it
/// before extracting the dotted-numeric run.
#[must_use]
pub fn normalize_uid_candidate(value: &str) -> String {
    let compact: String = value.trim().split_whitespace().collect();
    sanitize_uid(&compact)
}

/// Does `path` look like an actual DICOM payload file rather than a sidecar
/// like `DICOMDIR`? Used to line up the dcm4che real-time RQ order against
/// the subset of batch files that generate a C-STORE-RQ at all (spec §4.6,
/// grounded on `shared/utils.py::looks_like_dicom_payload_file`).
#[must_use]
pub fn looks_like_dicom_payload_file(path: &Utf8Path) -> bool {
    let name_upper = path.file_name().unwrap_or_default().to_uppercase();
    if name_upper == "DICOMDIR" {
        return false;
    }
    match path.extension().map(str::to_lowercase) {
        Some(ext) if ["dcm", "dicom", "ima"].contains(&ext.as_str()) => true,
        Some(_) => false,
        None => !sanitize_uid(&name_upper).is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dcm4che_ok_response_is_extracted() {
        let blob = "<< 1:C-STORE-RQ[pcid=1\n  iuid=1.2.3.4 -\n>> 1:C-STORE-RSP[pcid=1\n  status=0H\n  iuid=1.2.3.4 -\n";
        let result = classify_dcm4che_output(blob);
        assert_eq!(result.rq_iuids, vec!["1.2.3.4"]);
        assert_eq!(result.ok_iuids, vec!["1.2.3.4"]);
        assert!(result.err_iuids.is_empty());
    }

    #[test]
    fn dcm4che_error_response_is_classified_with_status() {
        let blob = ">> 1:C-STORE-RSP[pcid=1\n  status=A700H\n  iuid=1.2.3.5 -\n";
        let result = classify_dcm4che_output(blob);
        assert_eq!(result.err_iuids, vec!["1.2.3.5"]);
        assert_eq!(result.err_status_by_iuid.get("1.2.3.5").unwrap(), "A700H");
    }

    #[test]
    fn dicomdir_is_not_a_payload_file() {
        assert!(!looks_like_dicom_payload_file(Utf8Path::new("/data/DICOMDIR")));
    }

    #[test]
    fn dcm_extension_is_a_payload_file() {
        assert!(looks_like_dicom_payload_file(Utf8Path::new("/data/a.dcm")));
    }

    #[test]
    fn extensionless_uid_named_file_is_a_payload_file() {
        assert!(looks_like_dicom_payload_file(Utf8Path::new(
            "/data/1.2.840.10008.1"
        )));
    }

    #[test]
    fn non_dicom_extension_is_not_a_payload_file() {
        assert!(!looks_like_dicom_payload_file(Utf8Path::new("/data/notes.txt")));
    }

    #[test]
    fn dcmtk_success_sequence_is_classified() {
        let lines: Vec<String> = vec![
            "I: Sending file: /data/a.dcm".to_string(),
            "I: Received Store Response (Success)".to_string(),
        ];
        let path = Utf8Path::new("/data/a.dcm");
        let result = classify_dcmtk_output(&lines, &[path]);
        assert_eq!(result["/data/a.dcm"].send_status, SendStatus::SentOk);
    }

    #[test]
    fn dcmtk_store_failed_with_reason_line() {
        let lines: Vec<String> = vec![
            "E: Store Failed, file: /data/b.dcm: ".to_string(),
            "E: 0006:0317 Some association reason".to_string(),
        ];
        let path = Utf8Path::new("/data/b.dcm");
        let result = classify_dcmtk_output(&lines, &[path]);
        assert_eq!(result["/data/b.dcm"].send_status, SendStatus::SentUnknown);
        assert!(result["/data/b.dcm"].status_detail.contains("0006:0317"));
    }

    #[test]
    fn dcmtk_unmatched_files_fall_back_to_unknown() {
        let lines: Vec<String> = Vec::new();
        let path = Utf8Path::new("/data/c.dcm");
        let result = classify_dcmtk_output(&lines, &[path]);
        assert_eq!(result["/data/c.dcm"].send_status, SendStatus::SentUnknown);
        assert!(result["/data/c.dcm"].status_detail.contains("no_match_in_output"));
    }

    #[test]
    fn dcmtk_dicomdir_unknown_status_is_unsupported() {
        let lines: Vec<String> = vec![
            "I: Sending file: /data/DICOMDIR".to_string(),
            "I: Received Store Response (Unknown Status: 0x110)".to_string(),
        ];
        let path = Utf8Path::new("/data/DICOMDIR");
        let result = classify_dcmtk_output(&lines, &[path]);
        assert_eq!(result["/data/DICOMDIR"].send_status, SendStatus::UnsupportedDicomObject);
    }

    #[test]
    fn uid_extraction_from_dcmdump_text() {
        let text = "(0008,0018) UI SOPInstanceUID                  [1.2.840.113619.2.55.3]\n(0002,0010) UI TransferSyntaxUID                [1.2.840.10008.1.2.1]";
        assert_eq!(extract_sop_instance_uid(text).unwrap(), "1.2.840.113619.2.55.3");
        assert_eq!(extract_transfer_syntax_uid(text).unwrap(), "1.2.840.10008.1.2.1");
    }

    #[test]
    fn sanitize_uid_finds_first_dotted_numeric_run() {
        assert_eq!(sanitize_uid("garbage 1.2.3.4 trailing"), "1.2.3.4");
        assert_eq!(sanitize_uid("no uid here"), "");
    }
}
