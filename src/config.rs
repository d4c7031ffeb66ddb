use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which persistence backend holds the expense table.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Csv,
    Sqlite,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageSettings {
    pub backend: Backend,
    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupSettings {
    pub keep_recent: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UiSettings {
    pub date_format: String,
    pub currency_symbol: String,
    pub theme: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub storage: StorageSettings,
    pub backup: BackupSettings,
    pub ui: UiSettings,
}

impl Settings {
    /// Path of the file the active backend persists to.
    pub fn data_path(&self) -> &Path {
        match self.storage.backend {
            Backend::Csv => &self.storage.csv_path,
            Backend::Sqlite => &self.storage.db_path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub base_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let dirs = project_dirs()?;
        let base_dir = dirs.data_dir().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        let settings_path = base_dir.join("settings.json");
        let settings: Settings = load_or_write(&settings_path, default_settings(&base_dir))?;

        fs::create_dir_all(settings.storage.backup_dir.as_path())?;
        if let Some(parent) = settings.data_path().parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(AppConfig { settings, base_dir })
    }
}

fn load_or_write<T>(path: &Path, default: T) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        let data = serde_json::to_string_pretty(&default)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        return Ok(default);
    }
    let bytes =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value)
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "example", "expense_tracker")
        .context("Unable to determine platform data directory")
}

fn default_settings(base_dir: &Path) -> Settings {
    let data_dir = base_dir.join("data");
    Settings {
        storage: StorageSettings {
            backend: Backend::Sqlite,
            csv_path: data_dir.join("expenses.csv"),
            db_path: data_dir.join("expenses.db"),
            backup_dir: base_dir.join("backups"),
        },
        backup: BackupSettings { keep_recent: 5 },
        ui: UiSettings {
            date_format: "%Y-%m-%d".into(),
            currency_symbol: "R$".into(),
            theme: "light".into(),
        },
    }
}
