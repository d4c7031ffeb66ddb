use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BackupSettings;

/// Copy the data file into the backup directory with a timestamp suffix,
/// then prune copies beyond the retention count. A missing source file is
/// not an error; there is simply nothing to back up yet.
pub fn backup_data_file(
    source: &Path,
    backup_dir: &Path,
    policy: &BackupSettings,
) -> Result<Option<PathBuf>> {
    if !source.exists() {
        return Ok(None);
    }
    fs::create_dir_all(backup_dir)?;
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("bak");
    let ts = Local::now().format("%Y%m%d%H%M%S");
    let dest = backup_dir.join(format!("{stem}_{ts}.{ext}"));
    fs::copy(source, &dest)?;
    prune_old(backup_dir, stem, policy.keep_recent)?;
    Ok(Some(dest))
}

/// Keep the newest `keep` copies (at least one) whose name starts with
/// `stem`; remove the rest.
fn prune_old(dir: &Path, stem: &str, keep: usize) -> Result<()> {
    let mut copies: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(stem))
                    .unwrap_or(false)
        })
        .collect();

    copies.sort_by_key(|p| fs::metadata(p).and_then(|m| m.modified()).ok());
    copies.reverse();

    for stale in copies.into_iter().skip(keep.max(1)) {
        let _ = fs::remove_file(stale);
    }
    Ok(())
}
