//! Telemetry event sink (`telemetry/events.csv`, spec §3/§4.9).

use camino::Utf8Path;
use dcmrelay_types::event::{Event, EventType};
use dcmrelay_util::clock::now_iso;

use crate::csv_io::append_csv_row;
use crate::error::ArtifactError;

/// Append one telemetry event, stamping `timestamp_iso` at call time.
pub fn write_telemetry_event(
    events_csv_path: &Utf8Path,
    run_id: &str,
    event_type: EventType,
    message: impl Into<String>,
    ref_: impl Into<String>,
) -> Result<(), ArtifactError> {
    let mut event = Event::new(run_id, event_type, message, ref_);
    event.timestamp_iso = now_iso();
    append_csv_row(events_csv_path, &event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::read_csv_rows;
    use camino::Utf8Path;
    use tempfile::tempdir;

    #[test]
    fn event_appended_and_readable() {
        let dir = tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("events.csv");
        write_telemetry_event(&path, "run1", EventType::AnalysisEnd, "done", "").unwrap();
        let rows: Vec<Event> = read_csv_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, EventType::AnalysisEnd);
        assert!(!rows[0].timestamp_iso.is_empty());
    }
}
