//! Interactive management of the agent configuration file.
//!
//! Public operations never fail outward. Errors are shown to the user and
//! written to the audit log, a user cancel is absorbed silently, and the caller
//! always gets an [`Outcome`] back so it can return to its menu.

use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::Mapping;

use crate::audit::{AuditLog, LogLevel};
use crate::dialog::{ChoiceItem, Dialog, DialogError};
use crate::files::{self, Ownership, CONFIG_FILE_MODE};
use crate::record::{AgentConfiguration, Frequency, TimeUnit};
use crate::secrets::{self, Ciphertext};

const EXAMPLE_BOT_TOKEN: &str = "751988420:AAHrzn7RXWxVQQNha0tQUzyouE5lUcPde1g";
const EXAMPLE_CHAT_ID: &str = "-1002365478941";

const FIELD_FREQUENCY: &str = "Frequency Time";
const FIELD_BOT_TOKEN: &str = "Bot Token";
const FIELD_CHAT_ID: &str = "Chat ID";

const TAG_CREATE: &str = "__createAgentConfiguration";
const TAG_CREATE_ERROR: &str = "_createAgentConfiguration";
const TAG_MODIFY: &str = "_modifyAgentConfiguration";
const TAG_DISPLAY: &str = "_displayAgentConfiguration";

const NOTIFICATION_TITLE: &str = "Notification Message";
const ERROR_TITLE: &str = "Error Message";

/// Result of a public operation. Every variant means "back to the menu".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Modified,
    Unchanged,
    Displayed,
    Cancelled,
    Failed,
}

pub struct AgentConfigManager<D> {
    dialog: D,
    config: AgentConfiguration,
}

impl<D: Dialog> AgentConfigManager<D> {
    pub fn new(dialog: D) -> Self {
        Self {
            dialog,
            config: AgentConfiguration::default(),
        }
    }

    pub fn config(&self) -> &AgentConfiguration {
        &self.config
    }

    pub fn dialog(&self) -> &D {
        &self.dialog
    }

    pub fn dialog_mut(&mut self) -> &mut D {
        &mut self.dialog
    }

    pub fn define_frequency_time(&mut self) -> Result<()> {
        self.config.frequency_time = self.ask_frequency(Frequency::default())?;
        Ok(())
    }

    pub fn define_telegram_bot_token(&mut self, key_file: &Path) -> Result<()> {
        self.config.telegram_bot_token =
            self.ask_secret(key_file, "Enter the Telegram Bot Token:", EXAMPLE_BOT_TOKEN)?;
        Ok(())
    }

    pub fn define_telegram_chat_id(&mut self, key_file: &Path) -> Result<()> {
        self.config.telegram_chat_id =
            self.ask_secret(key_file, "Enter the Telegram Chat ID:", EXAMPLE_CHAT_ID)?;
        Ok(())
    }

    pub fn to_mapping(&self) -> Result<Mapping> {
        self.config.to_mapping()
    }

    pub fn from_mapping(&mut self, mapping: &Mapping) -> Result<()> {
        self.config = AgentConfiguration::from_mapping(mapping)?;
        Ok(())
    }

    /// First-run flow: ask for every field, then write the file.
    pub fn create_agent_configuration(
        &mut self,
        config_file: &Path,
        key_file: &Path,
        log: &AuditLog,
        ownership: &Ownership,
    ) -> Outcome {
        let defined = self
            .define_frequency_time()
            .and_then(|_| self.define_telegram_bot_token(key_file))
            .and_then(|_| self.define_telegram_chat_id(key_file))
            .and_then(|_| self.to_mapping());
        match defined {
            Ok(mapping) => self.create_file(&mapping, config_file, log, ownership),
            Err(e) => self.fail(
                e,
                "\nError creating Agent configuration. For more information, see the logs.",
                log,
                TAG_CREATE_ERROR,
            ),
        }
    }

    /// Write `data` as the agent configuration file.
    pub fn create_file(
        &mut self,
        data: &Mapping,
        config_file: &Path,
        log: &AuditLog,
        ownership: &Ownership,
    ) -> Outcome {
        let written = files::create_yaml_file(data, config_file, ownership, CONFIG_FILE_MODE)
            .and_then(|_| {
                if config_file.exists() {
                    Ok(())
                } else {
                    anyhow::bail!("'{}' missing after write", config_file.display())
                }
            });

        match written {
            Ok(()) => {
                self.notify("\nAgent configuration created.", NOTIFICATION_TITLE);
                log.create_log("Agent configuration created", LogLevel::Info, TAG_CREATE);
                Outcome::Created
            }
            Err(e) => self.fail(
                e,
                "\nError creating Agent configuration. For more information, see the logs.",
                log,
                TAG_CREATE_ERROR,
            ),
        }
    }

    pub fn modify_agent_configuration(
        &mut self,
        config_file: &Path,
        key_file: &Path,
        log: &AuditLog,
        ownership: &Ownership,
    ) -> Outcome {
        match self.try_modify(config_file, key_file, log, ownership) {
            Ok(changed) => {
                if changed {
                    self.notify("\nAgent Configuration modified.", NOTIFICATION_TITLE);
                    Outcome::Modified
                } else {
                    self.notify("\nAgent Configuration not modified.", NOTIFICATION_TITLE);
                    Outcome::Unchanged
                }
            }
            Err(e) => self.fail(
                e,
                "\nError modifying Agent configuration. For more information, see the logs.",
                log,
                TAG_MODIFY,
            ),
        }
    }

    fn try_modify(
        &mut self,
        config_file: &Path,
        key_file: &Path,
        log: &AuditLog,
        ownership: &Ownership,
    ) -> Result<bool> {
        let fields = [
            ChoiceItem::new(
                FIELD_FREQUENCY,
                "Frequency at which the service is validated",
                false,
            ),
            ChoiceItem::new(FIELD_BOT_TOKEN, "Telegram Bot Token", false),
            ChoiceItem::new(FIELD_CHAT_ID, "Telegram channel identifier", false),
        ];
        let options = self.dialog.checklist(
            "Select one or more options:",
            &fields,
            "Agent Configuration Fields",
        )?;

        let data: Mapping = files::read_yaml_file(config_file)?;
        self.from_mapping(&data)?;
        let original_hash = files::get_hash_from_file(config_file)?;

        let mut changes = Vec::new();
        if options.iter().any(|o| o == FIELD_FREQUENCY) {
            changes.push(self.modify_frequency_time()?);
        }
        if options.iter().any(|o| o == FIELD_BOT_TOKEN) {
            changes.push(self.modify_telegram_bot_token(key_file)?);
        }
        if options.iter().any(|o| o == FIELD_CHAT_ID) {
            changes.push(self.modify_telegram_chat_id(key_file)?);
        }

        files::create_yaml_file(&self.to_mapping()?, config_file, ownership, CONFIG_FILE_MODE)?;
        // Audit only what actually reached the file.
        for change in &changes {
            log.create_log(change, LogLevel::Warning, TAG_MODIFY);
        }
        let new_hash = files::get_hash_from_file(config_file)?;
        Ok(new_hash != original_hash)
    }

    /// Edit the frequency in memory. Returns the audit line to record once
    /// the file has been written.
    pub fn modify_frequency_time(&mut self) -> Result<String> {
        self.config.frequency_time = self.ask_frequency(self.config.frequency_time)?;
        Ok(format!("Frequency time modified: {}", self.config.frequency_time))
    }

    pub fn modify_telegram_bot_token(&mut self, key_file: &Path) -> Result<String> {
        let current = self.config.telegram_bot_token.clone();
        self.config.telegram_bot_token =
            self.edit_secret(key_file, "Enter the Telegram Bot Token:", &current)?;
        Ok("Telegram Bot Token modified.".to_string())
    }

    pub fn modify_telegram_chat_id(&mut self, key_file: &Path) -> Result<String> {
        let current = self.config.telegram_chat_id.clone();
        self.config.telegram_chat_id =
            self.edit_secret(key_file, "Enter the Telegram Chat ID:", &current)?;
        Ok("Telegram Chat ID modified.".to_string())
    }

    pub fn display_agent_configuration(&mut self, config_file: &Path, log: &AuditLog) -> Outcome {
        let shown = files::convert_yaml_to_str(config_file).and_then(|data| {
            let text = format!("\nData:\n\n{data}");
            self.dialog.scrollbox(&text, "Agent Configuration")?;
            Ok(())
        });
        match shown {
            Ok(()) => Outcome::Displayed,
            Err(e) => self.fail(
                e,
                "\nError displaying Agent configuration. For more information, see the logs.",
                log,
                TAG_DISPLAY,
            ),
        }
    }

    /// Radio list of units with `current.unit` pre-selected, then the count.
    fn ask_frequency(&mut self, current: Frequency) -> Result<Frequency> {
        let units: Vec<ChoiceItem> = TimeUnit::ALL
            .iter()
            .map(|u| ChoiceItem::new(u.as_str(), u.description(), *u == current.unit))
            .collect();
        let option = self.dialog.radiolist("Select a option:", &units, "Unit Time")?;
        let unit =
            TimeUnit::parse(&option).with_context(|| format!("unknown time unit '{option}'"))?;
        let total = self.dialog.integer_inputbox(
            &format!("Enter the total in {unit} each time the service status is validated:"),
            &current.total.to_string(),
        )?;
        Frequency::new(unit, total)
    }

    fn ask_secret(&mut self, key_file: &Path, prompt: &str, init: &str) -> Result<Ciphertext> {
        let passphrase = secrets::get_passphrase(key_file)?;
        let value = self.dialog.inputbox(prompt, init)?;
        secrets::encrypt_data(value.as_bytes(), &passphrase)
    }

    /// Same as `ask_secret`, pre-filled with the decrypted current value.
    fn edit_secret(
        &mut self,
        key_file: &Path,
        prompt: &str,
        current: &Ciphertext,
    ) -> Result<Ciphertext> {
        let passphrase = secrets::get_passphrase(key_file)?;
        let plain = String::from_utf8(secrets::decrypt_data(current, &passphrase)?)
            .context("stored secret is not valid UTF-8")?;
        let value = self.dialog.inputbox(prompt, &plain)?;
        // Re-encrypting an unchanged value would still change the file (fresh nonce).
        if value == plain {
            return Ok(current.clone());
        }
        secrets::encrypt_data(value.as_bytes(), &passphrase)
    }

    fn notify(&mut self, text: &str, title: &str) {
        if let Err(e) = self.dialog.message(text, title) {
            tracing::warn!("Failed to show message: {e}");
        }
    }

    /// Report a failed operation, unless the user cancelled it.
    fn fail(&mut self, error: anyhow::Error, text: &str, log: &AuditLog, tag: &str) -> Outcome {
        if is_cancelled(&error) {
            tracing::debug!("Operation cancelled by user");
            return Outcome::Cancelled;
        }
        self.notify(text, ERROR_TITLE);
        log.create_log(format!("{error:#}"), LogLevel::Error, tag);
        Outcome::Failed
    }
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<DialogError>(),
            Some(DialogError::Cancelled)
        )
    })
}
