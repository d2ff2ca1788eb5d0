//! Модуль работы с архивами
//!
//! - `list` - список MID/MIF без распаковки (7z, zip, tar, tar.gz)
//! - `sevenzip` - запуск внешнего 7z и разбор его вывода
//! - `tar` - распаковка tar и tar.gz, выбор распаковщика по типу архива
//! - `manager` - распаковка пар во временную папку
//! - `cleanup` - удаление временных файлов с повторами

mod cleanup;
mod list;
mod manager;
mod sevenzip;
mod tar;
mod types;

pub use cleanup::{attempt_remove, cleanup_pair, cleanup_targets, CleanupPolicy, DEFAULT_CLEANUP_ATTEMPTS};
pub use list::{list_archive, list_entry_names};
pub use manager::{extract_files, ExtractionManager};
pub use sevenzip::{classify_output, Extractor, SevenZipTool, ToolOutput};
pub use tar::{ArchiveExtractor, TarExtractor};
pub use types::{ArchiveHandle, ArchiveType, ExtractionOutcome};

/// Проверить, является ли файл поддерживаемым архивом
pub fn is_archive(filename: &str) -> bool {
    !matches!(ArchiveType::from_filename(filename), ArchiveType::Unknown)
}
