mod terminal;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use vigil_config::{find_config_path, load_config, resolve_path, save_config, Settings};
use vigil_core::secrets::generate_key_file;
use vigil_core::{AgentConfigManager, AuditLog, ChoiceItem, Dialog, DialogError, Outcome, Ownership};

use crate::terminal::TerminalDialog;

#[derive(Parser)]
#[command(name = "vigil", about = "Agent configuration setup tool", version)]
struct Cli {
    /// Path to settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Agent configuration file (overrides settings)
    #[arg(long)]
    agent_config: Option<PathBuf>,

    /// Key file used to encrypt secrets (overrides settings)
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Audit log file (overrides settings)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Owner user of written files
    #[arg(long)]
    owner: Option<String>,

    /// Owner group of written files
    #[arg(long)]
    group: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive main menu (default)
    Menu,
    /// Create the agent configuration
    Create,
    /// Modify fields of the agent configuration
    Modify,
    /// Show the agent configuration
    Show,
    /// Generate the key file that protects the secrets
    Keygen,
}

/// Files and ownership an operation works on, after applying CLI overrides.
struct Target {
    agent_config: PathBuf,
    key_file: PathBuf,
    log: AuditLog,
    ownership: Ownership,
}

impl Target {
    fn resolve(cli: &Cli, settings: &Settings) -> Self {
        let ownership = Ownership::new(
            cli.owner.clone().or_else(|| settings.owner.clone()),
            cli.group.clone().or_else(|| settings.group.clone()),
        );
        let log_file = cli
            .log_file
            .clone()
            .unwrap_or_else(|| resolve_path(&settings.log_file));
        Self {
            agent_config: cli
                .agent_config
                .clone()
                .unwrap_or_else(|| resolve_path(&settings.agent_config_file)),
            key_file: cli
                .key_file
                .clone()
                .unwrap_or_else(|| resolve_path(&settings.key_file)),
            log: AuditLog::new(log_file, ownership.clone()),
            ownership,
        }
    }

    /// Settings that point at this target, keeping the rest of `base`.
    fn to_settings(&self, base: &Settings) -> Settings {
        Settings {
            agent_config_file: self.agent_config.to_string_lossy().into_owned(),
            key_file: self.key_file.to_string_lossy().into_owned(),
            log_file: self.log.path().to_string_lossy().into_owned(),
            owner: self.ownership.user.clone(),
            group: self.ownership.group.clone(),
            ..base.clone()
        }
    }
}

fn main() -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(find_config_path);
    let settings = load_config(&config_path)?;
    let target = Target::resolve(&cli, &settings);

    if let Some(Commands::Keygen) = cli.command {
        run_keygen(&target)?;
        return write_settings_if_missing(&config_path, &target.to_settings(&settings));
    }

    let dialog = TerminalDialog::new(&settings.backtitle)?;
    let mut manager = AgentConfigManager::new(dialog);

    let outcome = match cli.command.unwrap_or(Commands::Menu) {
        Commands::Create => run_create(&mut manager, &target),
        Commands::Modify => run_modify(&mut manager, &target),
        Commands::Show => run_show(&mut manager, &target),
        Commands::Menu | Commands::Keygen => {
            run_menu(&mut manager, &target);
            return Ok(());
        }
    };
    tracing::debug!("Operation finished: {outcome:?}");
    Ok(())
}

fn run_keygen(target: &Target) -> Result<()> {
    generate_key_file(&target.key_file, &target.ownership)?;
    target.log.create_log(
        format!("Key file created: {}", target.key_file.display()),
        vigil_core::LogLevel::Info,
        "_generateKeyFile",
    );
    println!("Created key file: {}", target.key_file.display());
    Ok(())
}

/// Record the paths just used so later runs find the key file without flags.
fn write_settings_if_missing(path: &Path, settings: &Settings) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    save_config(path, settings)?;
    println!("Wrote settings: {}", path.display());
    Ok(())
}

fn run_create<D: Dialog>(manager: &mut AgentConfigManager<D>, target: &Target) -> Outcome {
    if target.agent_config.exists() {
        let text = format!(
            "\nAgent configuration already exists: {}",
            target.agent_config.display()
        );
        if let Err(e) = manager.dialog_mut().message(&text, "Notification Message") {
            tracing::warn!("Failed to show message: {e}");
        }
        return Outcome::Unchanged;
    }
    manager.create_agent_configuration(
        &target.agent_config,
        &target.key_file,
        &target.log,
        &target.ownership,
    )
}

fn run_modify<D: Dialog>(manager: &mut AgentConfigManager<D>, target: &Target) -> Outcome {
    manager.modify_agent_configuration(
        &target.agent_config,
        &target.key_file,
        &target.log,
        &target.ownership,
    )
}

fn run_show<D: Dialog>(manager: &mut AgentConfigManager<D>, target: &Target) -> Outcome {
    manager.display_agent_configuration(&target.agent_config, &target.log)
}

/// Main menu. Every operation returns here until the user quits or cancels.
fn run_menu<D: Dialog>(manager: &mut AgentConfigManager<D>, target: &Target) {
    let options = [
        ChoiceItem::new("Create", "Create the agent configuration", true),
        ChoiceItem::new("Modify", "Modify the agent configuration", false),
        ChoiceItem::new("Show", "Display the agent configuration", false),
        ChoiceItem::new("Quit", "Exit", false),
    ];
    loop {
        let choice = match manager
            .dialog_mut()
            .radiolist("Select a option:", &options, "Main Menu")
        {
            Ok(choice) => choice,
            Err(DialogError::Cancelled) => break,
            Err(e) => {
                tracing::error!("Menu failed: {e}");
                break;
            }
        };
        let outcome = match choice.as_str() {
            "Create" => run_create(manager, target),
            "Modify" => run_modify(manager, target),
            "Show" => run_show(manager, target),
            _ => break,
        };
        tracing::debug!("{choice} finished: {outcome:?}");
    }
}
