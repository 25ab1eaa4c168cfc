use dcmrelay_types::{Toolkit, ToolFIuidUpdateMode, ToolFSendMode, TsMode};

/// CLI-supplied overrides, applied on top of the file/defaults layer.
///
/// Every field is optional: only flags the user actually passed on the
/// command line are populated, so the merge in [`super::Config::discover`]
/// can tell "not set" apart from "set to the default value".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<camino::Utf8PathBuf>,
    pub toolkit: Option<Toolkit>,
    pub aet_source: Option<String>,
    pub aet_dest: Option<String>,
    pub pacs_host: Option<String>,
    pub pacs_port: Option<u16>,
    pub pacs_rest_host: Option<String>,
    pub runs_base_dir: Option<String>,
    pub batch_size_default: Option<u64>,
    pub allowed_extensions: Option<String>,
    pub restrict_extensions: Option<bool>,
    pub include_no_extension: Option<bool>,
    pub collect_size_bytes: Option<bool>,
    pub ts_mode: Option<TsMode>,
    pub toolf_send_mode: Option<ToolFSendMode>,
    pub toolf_iuid_update_mode: Option<ToolFIuidUpdateMode>,
    pub toolf_use_shell_wrapper: Option<bool>,
    pub toolf_prefer_java_direct: Option<bool>,
}
