use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use nix::unistd::{Group, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Mode applied to the agent configuration file and the audit log.
pub const CONFIG_FILE_MODE: u32 = 0o640;

/// Owner user and group applied to written files. `None` leaves that part untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Ownership {
    pub fn new(user: Option<String>, group: Option<String>) -> Self {
        Self { user, group }
    }
}

/// Serialize `data` as YAML into `path` with the given ownership and mode.
///
/// The document is written to a temporary file in the same directory, which
/// gets its owner and mode before it is renamed over the target. On any error
/// the previous file (or no file) stays in place.
pub fn create_yaml_file<T: Serialize>(
    data: &T,
    path: &Path,
    ownership: &Ownership,
    mode: u32,
) -> Result<()> {
    let yaml = serde_yaml::to_string(data)
        .with_context(|| format!("failed to serialize '{}'", path.display()))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory '{}'", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in '{}'", parent.display()))?;
    tmp.write_all(yaml.as_bytes())?;
    tmp.as_file().sync_all()?;
    // Dropping the temp file on error removes it.
    change_owner(tmp.path(), ownership, mode)?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

pub fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("failed to parse '{}'", path.display()))
}

/// Load a YAML file and render it back as normalized text for display.
pub fn convert_yaml_to_str(path: &Path) -> Result<String> {
    let value: serde_yaml::Value = read_yaml_file(path)?;
    Ok(serde_yaml::to_string(&value)?)
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn get_hash_from_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Apply ownership (when given) and permission bits to `path`.
pub fn change_owner(path: &Path, ownership: &Ownership, mode: u32) -> Result<()> {
    let uid = match ownership.user.as_deref() {
        Some(name) => Some(
            User::from_name(name)
                .with_context(|| format!("failed to look up user '{name}'"))?
                .with_context(|| format!("unknown user '{name}'"))?
                .uid,
        ),
        None => None,
    };
    let gid = match ownership.group.as_deref() {
        Some(name) => Some(
            Group::from_name(name)
                .with_context(|| format!("failed to look up group '{name}'"))?
                .with_context(|| format!("unknown group '{name}'"))?
                .gid,
        ),
        None => None,
    };

    if uid.is_some() || gid.is_some() {
        nix::unistd::chown(path, uid, gid)
            .with_context(|| format!("failed to change owner of '{}'", path.display()))?;
    }

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to change mode of '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_create_and_read_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("data.yaml");

        let mut data = BTreeMap::new();
        data.insert("alpha".to_string(), 1u32);
        data.insert("beta".to_string(), 2u32);
        create_yaml_file(&data, &path, &Ownership::default(), CONFIG_FILE_MODE).unwrap();

        let loaded: BTreeMap<String, u32> = read_yaml_file(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_create_yaml_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        let data = vec![1, 2, 3];
        create_yaml_file(&data, &path, &Ownership::default(), CONFIG_FILE_MODE).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_create_yaml_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        let owner = Ownership::default();
        create_yaml_file(&"old", &path, &owner, CONFIG_FILE_MODE).unwrap();
        create_yaml_file(&"new", &path, &owner, CONFIG_FILE_MODE).unwrap();

        let loaded: String = read_yaml_file(&path).unwrap();
        assert_eq!(loaded, "new");
    }

    #[test]
    fn test_create_yaml_applies_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        create_yaml_file(&"a", &path, &Ownership::default(), CONFIG_FILE_MODE).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_create_yaml_unknown_owner_keeps_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        create_yaml_file(&"old", &path, &Ownership::default(), CONFIG_FILE_MODE).unwrap();

        let ownership = Ownership::new(Some("no-such-user-vigil-test".into()), None);
        assert!(create_yaml_file(&"new", &path, &ownership, CONFIG_FILE_MODE).is_err());

        let loaded: String = read_yaml_file(&path).unwrap();
        assert_eq!(loaded, "old");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_yaml_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = read_yaml_file::<serde_yaml::Value>(&missing).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_convert_yaml_to_str() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        std::fs::write(&path, "key:   value\nlist: [1, 2]\n").unwrap();

        let text = convert_yaml_to_str(&path).unwrap();
        assert!(text.contains("key: value"));
        assert!(text.contains("- 1"));
    }

    #[test]
    fn test_convert_yaml_to_str_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        std::fs::write(&path, "key: [unclosed").unwrap();
        assert!(convert_yaml_to_str(&path).is_err());
    }

    #[test]
    fn test_hash_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();

        let hash = get_hash_from_file(&path).unwrap();
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hash_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "one").unwrap();
        let first = get_hash_from_file(&path).unwrap();
        std::fs::write(&path, "two").unwrap();
        assert_ne!(first, get_hash_from_file(&path).unwrap());
    }

    #[test]
    fn test_change_owner_sets_mode_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.yaml");
        std::fs::write(&path, "a: 1").unwrap();

        change_owner(&path, &Ownership::default(), CONFIG_FILE_MODE).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_change_owner_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.yaml");
        std::fs::write(&path, "a: 1").unwrap();

        let ownership = Ownership::new(Some("no-such-user-vigil-test".into()), None);
        let err = change_owner(&path, &ownership, CONFIG_FILE_MODE).unwrap_err();
        assert!(err.to_string().contains("no-such-user-vigil-test"));
    }
}
