use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder inside a mode template that is replaced by the association count
pub const PLACEHOLDER: char = 'x';

/// Suffix that marks the tree-depth sweep in log file names
pub const TREE_SUFFIX: &str = "tree";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("mode table is empty")]
    NoModes,

    #[error("mode name {0:?} is not usable in log file names")]
    BadModeName(String),

    #[error("template {template:?} for mode {mode} must contain 'x' exactly once")]
    BadTemplate { mode: String, template: String },

    #[error("association list is empty")]
    NoAssociations,

    #[error("association counts must be positive")]
    ZeroAssociations,

    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Paths of the external programs a campaign drives
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    /// The daemon under test
    pub subject: PathBuf,
    pub throughput: PathBuf,
    pub ping: PathBuf,
    pub kill: PathBuf,
    pub remove: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            subject: PathBuf::from("../alpha"),
            throughput: PathBuf::from("/usr/bin/iperf"),
            ping: PathBuf::from("/bin/ping"),
            kill: PathBuf::from("/usr/bin/killall"),
            remove: PathBuf::from("/bin/rm"),
        }
    }
}

/// Immutable description of a benchmark campaign.
///
/// Every field has a default, so a config file only needs to name what it
/// changes. Build it once, call [`CampaignConfig::validate`], and hand out
/// references.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignConfig {
    /// Hostname or IP of the server side (must match the subject's own config)
    pub server: String,

    /// Directory receiving the per-cell logs and the description log
    pub output: PathBuf,

    /// Config file handed to the subject with `-c`
    pub subject_config: PathBuf,

    pub tools: ToolPaths,

    /// Mode name -> association slot template, e.g. `N = "x:0:0"`
    pub modes: BTreeMap<String, String>,

    /// Association counts to sweep, in order
    pub associations: Vec<u32>,

    /// Runs per mode/association cell
    pub repeats: u32,

    /// Mode that additionally gets the tree depth sweep
    pub tree_mode: String,

    /// Association count used during the tree depth sweep (0 disables it)
    pub tree_associations: u32,

    /// Tree depths to sweep (empty disables it)
    pub tree_depths: Vec<u32>,

    /// Arguments for the throughput tool; `-c <server>` is added automatically
    pub throughput_args: String,

    /// Extra arguments for the subject
    pub subject_args: String,

    /// Ping packets sent for the handshake
    pub pings: u32,

    /// Control socket the subject leaves behind in the working directory
    pub socket_file: PathBuf,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let modes = [("N", "x:0:0"), ("C", "0:x:0"), ("M", "0:0:x")]
            .into_iter()
            .map(|(name, template)| (name.to_string(), template.to_string()))
            .collect();

        Self {
            server: "192.168.1.3".to_string(),
            output: PathBuf::from("logs"),
            subject_config: PathBuf::from("./test.conf"),
            tools: ToolPaths::default(),
            modes,
            associations: vec![1, 2, 5, 10],
            repeats: 5,
            tree_mode: "M".to_string(),
            tree_associations: 4,
            tree_depths: Vec::new(),
            throughput_args: "-f k -t 30".to_string(),
            subject_args: String::new(),
            pings: 5,
            socket_file: PathBuf::from("alpha.sock"),
        }
    }
}

impl CampaignConfig {
    /// Load and validate a TOML campaign file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CampaignConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modes.is_empty() {
            return Err(ConfigError::NoModes);
        }

        for (mode, template) in &self.modes {
            if !is_valid_mode_name(mode) {
                return Err(ConfigError::BadModeName(mode.clone()));
            }
            if template.matches(PLACEHOLDER).count() != 1 {
                return Err(ConfigError::BadTemplate {
                    mode: mode.clone(),
                    template: template.clone(),
                });
            }
        }

        if self.associations.is_empty() {
            return Err(ConfigError::NoAssociations);
        }
        if self.associations.contains(&0) {
            return Err(ConfigError::ZeroAssociations);
        }
        if self.repeats == 0 {
            return Err(ConfigError::NotPositive("repeats"));
        }
        if self.pings == 0 {
            return Err(ConfigError::NotPositive("pings"));
        }

        Ok(())
    }

    /// Whether the tree depth sweep runs for `mode`
    pub fn tree_sweep_enabled(&self, mode: &str) -> bool {
        mode == self.tree_mode && self.tree_associations > 0 && !self.tree_depths.is_empty()
    }

    /// Substitute the association count into the mode's slot template
    pub fn association_slot(&self, mode: &str, associations: u32) -> Option<String> {
        self.modes
            .get(mode)
            .map(|template| template.replacen(PLACEHOLDER, &associations.to_string(), 1))
    }

    /// Name the kill tool addresses the subject by
    pub fn subject_process_name(&self) -> String {
        self.tools
            .subject
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.tools.subject.to_string_lossy().into_owned())
    }
}

/// Mode names end up between dashes in log file names, so they must survive
/// the round trip through the file name grammar.
pub fn is_valid_mode_name(mode: &str) -> bool {
    !mode.is_empty()
        && !mode.ends_with(TREE_SUFFIX)
        && mode
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '/' | '\\'))
}

/// Split a flat argument string into separate arguments
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}
