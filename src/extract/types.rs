//! Типы для модуля распаковки

use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// Тип архива
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    SevenZip,
    Zip,
    Tar,
    TarGz,
    Unknown,
}

impl ArchiveType {
    /// Определить тип архива по имени файла
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();

        if lower.ends_with(".7z") {
            Self::SevenZip
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else {
            Self::Unknown
        }
    }

    /// Определить тип архива по пути
    pub fn from_path(path: &Path) -> Self {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(Self::from_filename)
            .unwrap_or(Self::Unknown)
    }

    /// Имя формата
    pub fn name(&self) -> &'static str {
        match self {
            Self::SevenZip => "7z",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::Unknown => "unknown",
        }
    }
}

/// Открытый только на чтение архив вместе с паролем
///
/// Живёт ровно столько, сколько длится листинг или распаковка.
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    path: PathBuf,
    kind: ArchiveType,
    password: Option<String>,
}

impl ArchiveHandle {
    /// Открыть архив: проверяет, что файл существует и формат известен
    pub fn open(path: &Path, password: Option<&str>) -> Result<Self, ArchiveError> {
        let kind = ArchiveType::from_path(path);
        if kind == ArchiveType::Unknown {
            return Err(ArchiveError::Unsupported(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ArchiveError::Open {
                path: path.to_path_buf(),
                message: "файл не найден".to_string(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            password: password.map(str::to_string),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArchiveType {
        self.kind
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

/// Результат одного запуска внешнего распаковщика
///
/// Каждый вариант несёт сырой вывод утилиты для диагностики.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Всё распаковано
    Success { output: String },
    /// Запрошенных файлов в архиве нет
    NoMatchingEntries { output: String },
    /// Архив повреждён или пароль неверный
    PasswordOrCorruption {
        output: String,
        /// Вывод указывает именно на пароль, а не на повреждение данных
        password_suspected: bool,
    },
    /// Всё остальное
    OtherFailure { output: String },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Сырой вывод утилиты
    pub fn output(&self) -> &str {
        match self {
            Self::Success { output }
            | Self::NoMatchingEntries { output }
            | Self::PasswordOrCorruption { output, .. }
            | Self::OtherFailure { output } => output,
        }
    }

    /// Короткое описание для сообщений об ошибках
    pub fn describe(&self) -> String {
        match self {
            Self::Success { .. } => "успешно".to_string(),
            Self::NoMatchingEntries { .. } => "нет подходящих файлов".to_string(),
            Self::PasswordOrCorruption {
                password_suspected: true,
                ..
            } => "неверный пароль".to_string(),
            Self::PasswordOrCorruption { .. } => "архив повреждён".to_string(),
            Self::OtherFailure { output } => {
                let last = output
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .last()
                    .unwrap_or("нет вывода");
                format!("распаковщик завершился с ошибкой ({})", last)
            }
        }
    }
}
