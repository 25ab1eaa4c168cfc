//! The dcm4che family driver: `storescu.bat`/`echoscu`/`dcmdump.bat` behind a
//! `cmd /c` wrapper (or invoked directly, matching the original's
//! "experimental path"). Grounded on `toolkit_drivers.py::Dcm4cheDriver`.

use std::process::Command;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_runner::CommandSpec;
use dcmrelay_types::Toolkit;

use crate::classify::{classify_dcm4che_output, extract_sop_instance_uid, extract_transfer_syntax_uid};
use crate::cmdlen::java_argfile_token;
use crate::driver::{Driver, ExtractedMetadata, ParsedSendOutput};
use crate::error::DriverError;

const DCMDUMP_TIMEOUT: Duration = Duration::from_secs(30);

/// The `storescu` main class invoked by ToolF's direct-Java send path
/// (grounded on `constants.py::DCM4CHE_JAVA_MAIN_CLASS`).
pub const DCM4CHE_JAVA_MAIN_CLASS: &str = "org.dcm4che3.tool.storescu.StoreSCU";

/// Jar name substrings that must each be present somewhere under
/// `<dcm4che_root>/lib/*.jar` for direct-Java invocation to stand a chance
/// of working (spec §4.6 pre-flight step 5, grounded on
/// `constants.py::DCM4CHE_CRITICAL_JAR_MARKERS`).
pub const DCM4CHE_CRITICAL_JAR_MARKERS: &[&str] =
    &["dcm4che-tool-storescu", "dcm4che-tool-common", "dcm4che-net", "dcm4che-core"];

/// Verify `bin_dir`'s sibling `lib/` directory carries a jar matching every
/// critical marker. Returns the list of markers with no matching jar
/// (empty on success) and the `lib/` directory that was scanned.
#[must_use]
pub fn check_critical_jars(bin_dir: &Utf8Path) -> (Vec<String>, Utf8PathBuf) {
    let lib_dir = bin_dir.join("..").join("lib");
    let Ok(entries) = std::fs::read_dir(lib_dir.as_std_path()) else {
        return (DCM4CHE_CRITICAL_JAR_MARKERS.iter().map(|m| (*m).to_string()).collect(), lib_dir);
    };

    let jar_names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.path()).ok())
        .filter(|path| path.extension().map(|e| e.eq_ignore_ascii_case("jar")).unwrap_or(false))
        .filter_map(|path| path.file_name().map(|n| n.to_lowercase()))
        .collect();

    let missing: Vec<String> = DCM4CHE_CRITICAL_JAR_MARKERS
        .iter()
        .filter(|marker| !jar_names.iter().any(|jar| jar.contains(&marker.to_lowercase())))
        .map(|m| (*m).to_string())
        .collect();

    (missing, lib_dir)
}

#[derive(Debug, Clone)]
pub struct ToolFDriver {
    /// `toolkits/dcm4che-*/bin`, as resolved by [`crate::locate::find_toolkit_bin`].
    pub bin_dir: Option<Utf8PathBuf>,
    pub aet_dest: String,
    pub pacs_host: String,
    pub pacs_port: u16,
    /// When `true`, invoke `storescu.bat` wrapped in `cmd /c` (the default,
    /// stable path). When `false`, run the `.bat` file directly — the
    /// original's "experimental path: run .bat directly without cmd
    /// wrapper". Only consulted by [`Self::build_send_command`];
    /// [`Self::build_echo_command`] always goes through `cmd /c`.
    pub use_shell_wrapper: bool,
}

impl ToolFDriver {
    fn storescu_path(&self) -> Result<Utf8PathBuf, DriverError> {
        let bin_dir = self.bin_dir.as_ref().ok_or_else(|| DriverError::ToolkitNotFound {
            prefix: "dcm4che".to_string(),
            binary: "storescu.bat".to_string(),
        })?;
        let storescu = bin_dir.join("storescu.bat");
        if !storescu.is_file() {
            return Err(DriverError::BinaryMissing { path: storescu });
        }
        Ok(storescu)
    }

    fn dcmdump_path(&self) -> Option<Utf8PathBuf> {
        let bin_dir = self.bin_dir.as_ref()?;
        let dcmdump = bin_dir.join("dcmdump.bat");
        dcmdump.is_file().then_some(dcmdump)
    }

    fn destination(&self) -> String {
        format!("{}@{}:{}", self.aet_dest, self.pacs_host, self.pacs_port)
    }
}

impl Driver for ToolFDriver {
    fn toolkit(&self) -> Toolkit {
        Toolkit::ToolF
    }

    fn build_send_command(
        &self,
        batch_files: &[Utf8PathBuf],
        _args_file: &Utf8Path,
    ) -> Result<CommandSpec, DriverError> {
        let storescu = self.storescu_path()?;
        let mut spec = if self.use_shell_wrapper {
            CommandSpec::new("cmd").arg("/c").arg(storescu.as_str())
        } else {
            CommandSpec::new(storescu.as_str())
        };
        spec = spec.arg("-c").arg(self.destination());
        spec = spec.args(batch_files.iter().map(|p| p.as_str().to_string()));
        Ok(spec)
    }

    fn build_echo_command(&self) -> Result<CommandSpec, DriverError> {
        let storescu = self.storescu_path()?;
        Ok(CommandSpec::new("cmd")
            .arg("/c")
            .arg(storescu.as_str())
            .arg("-c")
            .arg(self.destination()))
    }

    fn extract_metadata(&self, file_path: &Utf8Path) -> ExtractedMetadata {
        let Some(dcmdump) = self.dcmdump_path() else {
            return ExtractedMetadata {
                error: "dcmdump.bat not found in the internal toolkit".to_string(),
                ..Default::default()
            };
        };

        let output = Command::new("cmd")
            .args(["/c", dcmdump.as_str(), file_path.as_str()])
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
                    error: format!("failed to run dcmdump.bat: {e}"),
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

    fn parse_send_output(&self, lines: &[String], _batch_files: &[Utf8PathBuf]) -> ParsedSendOutput {
        let _ = DCMDUMP_TIMEOUT;
        let blob = lines.join("\n");
        ParsedSendOutput::Batch(classify_dcm4che_output(&blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(bin_dir: Option<Utf8PathBuf>) -> ToolFDriver {
        ToolFDriver {
            bin_dir,
            aet_dest: "HMD_IMPORTED".to_string(),
            pacs_host: "192.168.1.70".to_string(),
            pacs_port: 5555,
            use_shell_wrapper: true,
        }
    }

    #[test]
    fn missing_toolkit_surfaces_toolkit_not_found() {
        let d = driver(None);
        let err = d.build_send_command(&[], Utf8Path::new("args.txt")).unwrap_err();
        assert!(matches!(err, DriverError::ToolkitNotFound { .. }));
    }

    #[test]
    fn check_critical_jars_reports_missing_markers() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = Utf8Path::from_path(dir.path()).unwrap().join("bin");
        let lib_dir = Utf8Path::from_path(dir.path()).unwrap().join("lib");
        std::fs::create_dir_all(bin_dir.as_std_path()).unwrap();
        std::fs::create_dir_all(lib_dir.as_std_path()).unwrap();
        std::fs::write(lib_dir.join("dcm4che-tool-storescu-5.32.0.jar").as_std_path(), b"").unwrap();

        let (missing, _) = check_critical_jars(&bin_dir);
        assert_eq!(missing, vec!["dcm4che-tool-common", "dcm4che-net", "dcm4che-core"]);
    }

    #[test]
    fn check_critical_jars_all_present_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = Utf8Path::from_path(dir.path()).unwrap().join("bin");
        let lib_dir = Utf8Path::from_path(dir.path()).unwrap().join("lib");
        std::fs::create_dir_all(bin_dir.as_std_path()).unwrap();
        std::fs::create_dir_all(lib_dir.as_std_path()).unwrap();
        for marker in DCM4CHE_CRITICAL_JAR_MARKERS {
            std::fs::write(lib_dir.join(format!("{marker}-5.32.0.jar")).as_std_path(), b"").unwrap();
        }

        let (missing, _) = check_critical_jars(&bin_dir);
        assert!(missing.is_empty());
    }

    #[test]
    fn parse_send_output_delegates_to_dcm4che_classifier() {
        let d = driver(None);
        let lines = vec!["<< 1:C-STORE-RQ[pcid=1".to_string(), "  iuid=1.2.3.4 -".to_string()];
        match d.parse_send_output(&lines, &[]) {
            ParsedSendOutput::Batch(b) => assert_eq!(b.rq_iuids, vec!["1.2.3.4"]),
            ParsedSendOutput::PerFile(_) => panic!("expected batch correlation"),
        }
    }
}
