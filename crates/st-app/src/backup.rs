//! Backups of settings and network files, and cleanup of engine leftovers.
//!
//! A backup of `name.ext` lives next to it as `name.bak`. Only `.ini` and
//! `.inp` files are backed up, so the extension can be recovered on restore.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const BACKUP_EXTENSION: &str = "bak";
const BACKED_UP: [&str; 2] = ["ini", "inp"];
const ENGINE_LEFTOVERS: [&str; 2] = ["out", "rpt"];

pub fn backup_path(path: &Path) -> PathBuf {
    path.with_extension(BACKUP_EXTENSION)
}

/// Copy `path` to its backup, replacing an older backup.
pub fn create_backup(path: &Path) -> AppResult<PathBuf> {
    let backup = backup_path(path);
    fs::copy(path, &backup)?;
    tracing::debug!(path = %path.display(), backup = %backup.display(), "created backup");
    Ok(backup)
}

/// Overwrite `path` with its backup. The backup is kept.
pub fn restore_backup(path: &Path) -> AppResult<()> {
    let backup = backup_path(path);
    if !backup.exists() {
        return Err(AppError::BackupUnavailable {
            path: path.to_path_buf(),
        });
    }
    fs::copy(&backup, path)?;
    tracing::debug!(path = %path.display(), "restored backup");
    Ok(())
}

fn files_with_extension(dir: &Path, extension: &str) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Restore every backup in `dir` and delete the backup files.
///
/// A backup whose stem matches an existing `.ini` or `.inp` file restores
/// that file; otherwise it becomes `.inp` when it starts with a network
/// section header and `.ini` when it does not.
pub fn restore_all_backups(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut restored = Vec::new();
    for backup in files_with_extension(dir, BACKUP_EXTENSION)? {
        let existing = BACKED_UP
            .iter()
            .map(|ext| backup.with_extension(ext))
            .find(|p| p.exists());
        let target = match existing {
            Some(target) => target,
            None => {
                let text = fs::read_to_string(&backup)?;
                let is_network = text.trim_start().starts_with('[');
                backup.with_extension(if is_network { "inp" } else { "ini" })
            }
        };
        fs::copy(&backup, &target)?;
        fs::remove_file(&backup)?;
        tracing::info!(path = %target.display(), "restored from backup");
        restored.push(target);
    }
    Ok(restored)
}

/// Remove engine output and report files beside network files, plus all
/// stored checkpoints under `dir`.
pub fn clean_simulation_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for network in files_with_extension(dir, "inp")? {
        for ext in ENGINE_LEFTOVERS {
            let leftover = network.with_extension(ext);
            if leftover.exists() {
                fs::remove_file(&leftover)?;
                removed.push(leftover);
            }
        }
    }
    let runs = dir.join(".stormtrap").join("runs");
    if runs.exists() {
        fs::remove_dir_all(&runs)?;
        removed.push(runs);
    }
    tracing::info!(files = removed.len(), "cleaned simulation files");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("{}_{}", prefix, nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn backup_then_restore() {
        let dir = unique_temp_dir("st_backup");
        let net = dir.join("net.inp");
        fs::write(&net, "[JUNCTIONS]\nJ1 1\n").unwrap();
        assert_eq!(create_backup(&net).unwrap(), dir.join("net.bak"));
        fs::write(&net, "changed").unwrap();
        restore_backup(&net).unwrap();
        assert_eq!(fs::read_to_string(&net).unwrap(), "[JUNCTIONS]\nJ1 1\n");

        let missing = dir.join("other.inp");
        assert!(matches!(
            restore_backup(&missing),
            Err(AppError::BackupUnavailable { .. })
        ));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn restore_all_picks_extension() {
        let dir = unique_temp_dir("st_restore_all");
        fs::write(dir.join("settings.ini"), "pollutant = X\n").unwrap();
        fs::write(dir.join("settings.bak"), "pollutant = TSS\n").unwrap();
        fs::write(dir.join("orphan.bak"), "[TITLE]\n").unwrap();

        let restored = restore_all_backups(&dir).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.join("settings.ini")).unwrap(),
            "pollutant = TSS\n"
        );
        assert!(dir.join("orphan.inp").exists());
        assert!(!dir.join("settings.bak").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn clean_removes_leftovers_only() {
        let dir = unique_temp_dir("st_clean");
        fs::write(dir.join("net.inp"), "[TITLE]\n").unwrap();
        fs::write(dir.join("net.out"), "x").unwrap();
        fs::write(dir.join("net.rpt"), "x").unwrap();
        fs::write(dir.join("notes.rpt"), "x").unwrap();
        fs::create_dir_all(dir.join(".stormtrap/runs/abc")).unwrap();

        let removed = clean_simulation_files(&dir).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(dir.join("net.inp").exists());
        assert!(dir.join("notes.rpt").exists());
        assert!(!dir.join(".stormtrap/runs").exists());
        fs::remove_dir_all(&dir).ok();
    }
}
