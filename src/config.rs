//! Настройки прогона

use std::path::PathBuf;
use std::time::Duration;

use crate::extract::{CleanupPolicy, DEFAULT_CLEANUP_ATTEMPTS};
use crate::report::REPORT_FILE;

/// Переменная окружения с паролем архивов
pub const PASSWORD_ENV_VAR: &str = "rdl_pw";
/// Переменная окружения с путём к 7z
pub const SEVEN_ZIP_ENV_VAR: &str = "SEVEN_ZIP";
/// Программа распаковки по умолчанию
pub const DEFAULT_SEVEN_ZIP: &str = "7z";
/// Папка результатов по умолчанию
pub const DEFAULT_OUTPUT_DIR: &str = "gpkgs";
/// Пауза между попытками удаления временных файлов
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_millis(50);

/// Настройки конвертации
#[derive(Debug, Clone)]
pub struct Config {
    /// Пароль архивов (None - распаковка без пароля)
    pub password: Option<String>,
    /// Корень для .gpkg
    pub output_dir: PathBuf,
    /// Путь к report.csv
    pub report_path: PathBuf,
    /// Временная папка распаковки; None - создаётся на время прогона
    pub work_dir: Option<PathBuf>,
    pub cleanup_attempts: u32,
    pub cleanup_delay: Duration,
    /// Программа 7z
    pub seven_zip: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            password: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            report_path: PathBuf::from(REPORT_FILE),
            work_dir: None,
            cleanup_attempts: DEFAULT_CLEANUP_ATTEMPTS,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
            seven_zip: PathBuf::from(DEFAULT_SEVEN_ZIP),
        }
    }
}

impl Config {
    /// Настройки из окружения (пароль и путь к 7z)
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Настройки из произвольного источника переменных
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let password = var(PASSWORD_ENV_VAR).filter(|p| !p.is_empty());
        if password.is_none() {
            log::warn!(
                "Пароль не задан ({}), архивы распаковываются без пароля",
                PASSWORD_ENV_VAR
            );
        }

        let seven_zip = var(SEVEN_ZIP_ENV_VAR)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SEVEN_ZIP));

        Self {
            password,
            seven_zip,
            ..Self::default()
        }
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            attempts: self.cleanup_attempts,
            delay: self.cleanup_delay,
        }
    }
}
