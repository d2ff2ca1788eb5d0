//! Типы ошибок

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::extract::ExtractionOutcome;

/// Ошибки открытия и чтения архива (без распаковки)
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Архив не открывается: неверный пароль, повреждение, неизвестный формат
    #[error("не удалось открыть архив {path}: {message}")]
    Open { path: PathBuf, message: String },
    /// Не удалось получить список записей
    #[error("не удалось прочитать список файлов архива {path}: {message}")]
    Read { path: PathBuf, message: String },
    /// Формат архива не поддерживается
    #[error("неподдерживаемый формат архива: {0}")]
    Unsupported(PathBuf),
}

/// Ошибки команды распаковки
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("ошибка распаковки {archive}: нет подходящих файлов")]
    NoMatchingEntries { archive: PathBuf },
    #[error("ошибка распаковки {archive}: {}", .outcome.describe())]
    Failed {
        archive: PathBuf,
        outcome: ExtractionOutcome,
    },
}

/// Ошибки чтения MID/MIF
#[derive(Debug, Error)]
pub enum MapInfoError {
    #[error("ошибка ввода-вывода: {0}")]
    Io(#[from] io::Error),
    /// Некорректный заголовок MIF
    #[error("заголовок MIF, строка {line}: {message}")]
    Header { line: usize, message: String },
    /// Некорректный графический объект
    #[error("объект #{feature}: {message}")]
    Geometry { feature: usize, message: String },
    /// Некорректная запись MID
    #[error("запись MID #{row}: {message}")]
    Attributes { row: usize, message: String },
    /// Разное количество объектов в MIF и записей в MID
    #[error("в MIF {features} объектов, в MID {rows} записей")]
    RowCountMismatch { features: usize, rows: usize },
}

impl From<csv::Error> for MapInfoError {
    fn from(e: csv::Error) -> Self {
        let row = e
            .position()
            .map(|p| p.record() as usize + 1)
            .unwrap_or(0);
        Self::Attributes {
            row,
            message: e.to_string(),
        }
    }
}

/// Ошибки записи GeoPackage
#[derive(Debug, Error)]
pub enum GpkgError {
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ошибка ввода-вывода: {0}")]
    Io(#[from] io::Error),
}

/// Ошибки конвертации одной пары файлов
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    Read(#[from] MapInfoError),
    #[error("{0}")]
    Write(#[from] GpkgError),
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Фатальные ошибки запуска: прерывают весь прогон
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// Пароль не подошёл - считаем, что остальные файлы тоже не распакуются
    #[error("ошибка распаковки {base_name}: архив повреждён или неверный пароль")]
    PasswordRejected { base_name: String, output: String },
    /// Неклассифицированная ошибка распаковки
    #[error("ошибка распаковки {base_name}: {message}")]
    ExtractionFailed { base_name: String, message: String },
    /// Источник не является ни папкой, ни поддерживаемым архивом
    #[error("{0} не является папкой или поддерживаемым архивом")]
    UnsupportedSource(PathBuf),
    #[error("не удалось записать отчёт: {0}")]
    Report(#[from] csv::Error),
    #[error("ошибка ввода-вывода: {0}")]
    Io(#[from] io::Error),
}
