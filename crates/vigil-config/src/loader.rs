use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::Settings;

/// Expand a leading `~` to the home directory. Other paths pass through.
pub fn resolve_path(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Environment variable that points at the settings file.
pub const CONFIG_ENV: &str = "VIGIL_CONFIG";

/// Find the settings file: `$VIGIL_CONFIG`, then `./vigil.json`, then
/// `~/.vigil/vigil.json`. Falls back to the home location even if missing.
pub fn find_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    let home_config = dirs::home_dir().map(|h| h.join(".vigil").join("vigil.json"));
    let candidates = std::iter::once(PathBuf::from("vigil.json")).chain(home_config.clone());
    for candidate in candidates {
        if candidate.exists() {
            return candidate;
        }
    }

    home_config.unwrap_or_else(|| PathBuf::from("vigil.json"))
}

/// Load settings from a JSON file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<Settings> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read settings '{}'", path.display()))
        }
    };
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse settings '{}'", path.display()))
}

/// Write settings as pretty JSON, replacing the file in one rename.
pub fn save_config(path: &Path, settings: &Settings) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create settings directory '{}'", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, settings)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write settings '{}'", path.display()))?;
    Ok(())
}
