//! Locate and read the manifest of the package under test

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PackTestError, Result};
use crate::manifest::{SourceManifest, MANIFEST_FILE};

/// Nearest directory at or above `start` holding a manifest file.
///
/// `None` starts from the current working directory; relative paths are
/// taken relative to it.
pub async fn find_package_root(start: Option<&Path>) -> Result<PathBuf> {
    let root = absolute_start(start)?;

    for dir in root.ancestors() {
        let candidate = dir.join(MANIFEST_FILE);
        let found = tokio::fs::try_exists(&candidate)
            .await
            .map_err(|source| PackTestError::Read {
                path: candidate.clone(),
                source,
            })?;
        if found {
            debug!("Found {} in {}", MANIFEST_FILE, dir.display());
            return Ok(dir.to_path_buf());
        }
    }

    Err(PackTestError::NotFound { root })
}

/// Find and parse the nearest manifest, starting at `root_dir`.
pub async fn load_source_manifest(root_dir: Option<&Path>) -> Result<SourceManifest> {
    let root = absolute_start(root_dir)?;
    let package_root = find_package_root(Some(&root)).await?;
    let path = package_root.join(MANIFEST_FILE);

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| PackTestError::Read {
            path: path.clone(),
            source,
        })?;

    serde_json::from_str(&content).map_err(|source| PackTestError::Parse { root, path, source })
}

fn absolute_start(start: Option<&Path>) -> Result<PathBuf> {
    let cwd = || {
        std::env::current_dir().map_err(|source| PackTestError::Read {
            path: PathBuf::from("."),
            source,
        })
    };
    match start {
        Some(path) if path.is_absolute() => Ok(path.to_path_buf()),
        Some(path) => Ok(cwd()?.join(path)),
        None => cwd(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_finds_manifest_in_start_directory() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{ "name": "here", "version": "0.1.0" }"#,
        )?;

        let root = find_package_root(Some(temp.path())).await?;
        assert_eq!(root, temp.path());
        Ok(())
    }

    #[tokio::test]
    async fn test_walks_up_to_nearest_ancestor() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{ "name": "outer", "version": "0.1.0" }"#,
        )?;
        let nested = temp.path().join("packages").join("inner");
        fs::create_dir_all(nested.join("src"))?;
        fs::write(
            nested.join(MANIFEST_FILE),
            r#"{ "name": "inner", "version": "0.2.0" }"#,
        )?;

        let manifest = load_source_manifest(Some(&nested.join("src"))).await?;
        assert_eq!(manifest.name, "inner");
        assert_eq!(manifest.version, "0.2.0");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_directory_stops_the_walk() -> std::result::Result<(), Box<dyn std::error::Error>> {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new()?;
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{ "name": "outer", "version": "0.1.0" }"#,
        )?;
        let locked = temp.path().join("locked");
        fs::create_dir(&locked)?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

        // Privileged users can still look inside; nothing to check then.
        let readable = fs::read_dir(&locked).is_ok();
        let result = find_package_root(Some(&locked.join("pkg"))).await;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
        if readable {
            return Ok(());
        }

        match result {
            Err(PackTestError::Read { path, .. }) => {
                assert_eq!(path, locked.join("pkg").join(MANIFEST_FILE));
            }
            other => return Err(format!("expected read error, got {:?}", other).into()),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_error_carries_root_and_path() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let path = temp.path().join(MANIFEST_FILE);
        fs::write(&path, "not JSON in package.json")?;

        match load_source_manifest(Some(temp.path())).await {
            Err(err @ PackTestError::Parse { .. }) => {
                let message = err.to_string();
                assert!(message.starts_with("Problem loading package.json, check 'rootDir' option"));
                assert!(message.contains(&path.display().to_string()));
            }
            other => return Err(format!("expected parse error, got {:?}", other).into()),
        }
        Ok(())
    }
}
