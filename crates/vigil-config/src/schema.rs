use serde::{Deserialize, Serialize};

/// Settings of the setup tool itself: where the agent configuration lives,
/// which key file protects its secrets, and who owns the written files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub agent_config_file: String,
    pub key_file: String,
    pub log_file: String,
    /// Owner user applied to written files. Unset = leave as is.
    pub owner: Option<String>,
    /// Owner group applied to written files. Unset = leave as is.
    pub group: Option<String>,
    /// Text shown above every dialog.
    pub backtitle: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_config_file: "~/.vigil/agent_configuration.yaml".into(),
            key_file: "~/.vigil/key".into(),
            log_file: "~/.vigil/vigil.log".into(),
            owner: None,
            group: None,
            backtitle: "VIGIL-AGENT-CONFIGURATION".into(),
        }
    }
}
