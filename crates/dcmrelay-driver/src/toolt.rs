//! The DCMTK family driver: `storescu`/`echoscu`/`dcmdump`, invoked directly
//! with a DCMTK-style `@argfile` for the file list. Grounded on
//! `toolkit_drivers.py::DcmtkDriver`.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_runner::CommandSpec;
use dcmrelay_types::Toolkit;

use crate::classify::{classify_dcmtk_output, extract_sop_instance_uid, extract_transfer_syntax_uid};
use crate::driver::{Driver, ExtractedMetadata, ParsedSendOutput};
use crate::error::DriverError;

#[derive(Debug, Clone)]
pub struct ToolTDriver {
    /// `toolkits/dcmtk-*/bin`, as resolved by [`crate::locate::find_toolkit_bin`].
    pub bin_dir: Option<Utf8PathBuf>,
    pub aet_source: String,
    pub aet_dest: String,
    pub pacs_host: String,
    pub pacs_port: u16,
}

impl ToolTDriver {
    fn binary_path(&self, name: &str) -> Result<Utf8PathBuf, DriverError> {
        let bin_dir = self.bin_dir.as_ref().ok_or_else(|| DriverError::ToolkitNotFound {
            prefix: "dcmtk".to_string(),
            binary: name.to_string(),
        })?;
        let exe = if cfg!(windows) {
            bin_dir.join(format!("{name}.exe"))
        } else {
            bin_dir.join(name)
        };
        if !exe.is_file() {
            return Err(DriverError::BinaryMissing { path: exe });
        }
        Ok(exe)
    }
}

impl Driver for ToolTDriver {
    fn toolkit(&self) -> Toolkit {
        Toolkit::ToolT
    }

    fn build_send_command(
        &self,
        _batch_files: &[Utf8PathBuf],
        args_file: &Utf8Path,
    ) -> Result<CommandSpec, DriverError> {
        let storescu = self.binary_path("storescu")?;
        Ok(CommandSpec::new(storescu.as_str())
            .arg("-v")
            .arg("-nh")
            .arg("-aet")
            .arg(&self.aet_source)
            .arg("-aec")
            .arg(&self.aet_dest)
            .arg(&self.pacs_host)
            .arg(self.pacs_port.to_string())
            .arg(format!("@{args_file}")))
    }

    fn build_echo_command(&self) -> Result<CommandSpec, DriverError> {
        let echoscu = self.binary_path("echoscu")?;
        Ok(CommandSpec::new(echoscu.as_str())
            .arg("-aet")
            .arg(&self.aet_source)
            .arg("-aec")
            .arg(&self.aet_dest)
            .arg(&self.pacs_host)
            .arg(self.pacs_port.to_string()))
    }

    fn extract_metadata(&self, file_path: &Utf8Path) -> ExtractedMetadata {
        let dcmdump = match self.binary_path("dcmdump") {
            Ok(path) => path,
            Err(e) => {
                return ExtractedMetadata {
                    error: e.to_string(),
                    ..Default::default()
                };
            }
        };

        let output = Command::new(dcmdump.as_std_path())
            .args(["+P", "0008,0018", "+P", "0002,0010"])
            .arg(file_path.as_str())
            .output();
        let text = match output {
            Ok(out) => format!(
                "{}\n{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            )
            .trim()
            .to_string(),
            Err(e) => {
                return ExtractedMetadata {
                    error: format!("failed to run dcmdump: {e}"),
                    ..Default::default()
                };
            }
        };

        let iuid = extract_sop_instance_uid(&text).unwrap_or_default();
        let ts_uid = extract_transfer_syntax_uid(&text).unwrap_or_default();
        ExtractedMetadata {
            sop_instance_uid: iuid,
            source_ts_uid: ts_uid.clone(),
            source_ts_name: ts_uid,
            error: String::new(),
        }
    }

    fn parse_send_output(&self, lines: &[String], batch_files: &[Utf8PathBuf]) -> ParsedSendOutput {
        let refs: Vec<&Utf8Path> = batch_files.iter().map(Utf8PathBuf::as_path).collect();
        ParsedSendOutput::PerFile(classify_dcmtk_output(lines, &refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(bin_dir: Option<Utf8PathBuf>) -> ToolTDriver {
        ToolTDriver {
            bin_dir,
            aet_source: "HMD_IMPORTER".to_string(),
            aet_dest: "HMD_IMPORTED".to_string(),
            pacs_host: "192.168.1.70".to_string(),
            pacs_port: 5555,
        }
    }

    #[test]
    fn missing_toolkit_surfaces_toolkit_not_found() {
        let d = driver(None);
        let err = d
            .build_send_command(&[], Utf8Path::new("args.txt"))
            .unwrap_err();
        assert!(matches!(err, DriverError::ToolkitNotFound { .. }));
    }

    #[test]
    fn parse_send_output_delegates_to_dcmtk_classifier() {
        let d = driver(None);
        let files = vec![Utf8PathBuf::from("/tmp/a.dcm")];
        let lines = vec![
            "Sending file: /tmp/a.dcm".to_string(),
            "I: Received Store Response (Success)".to_string(),
        ];
        match d.parse_send_output(&lines, &files) {
            ParsedSendOutput::PerFile(map) => assert!(map.contains_key("/tmp/a.dcm")),
            ParsedSendOutput::Batch(_) => panic!("expected per-file outcomes"),
        }
    }
}
