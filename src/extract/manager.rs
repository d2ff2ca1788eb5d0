//! Распаковка пар и уборка за ними

use std::path::{Path, PathBuf};

use super::cleanup::{cleanup_pair, CleanupPolicy};
use super::sevenzip::{classify_output, Extractor};
use super::types::{ArchiveHandle, ExtractionOutcome};
use crate::error::ExtractError;
use crate::pairing::CandidatePair;

/// Распаковывает пары во временную папку и убирает за собой
pub struct ExtractionManager<E: Extractor> {
    tool: E,
    work_dir: PathBuf,
    cleanup: CleanupPolicy,
}

impl<E: Extractor> ExtractionManager<E> {
    pub fn new(tool: E, work_dir: impl Into<PathBuf>, cleanup: CleanupPolicy) -> Self {
        Self {
            tool,
            work_dir: work_dir.into(),
            cleanup,
        }
    }

    /// Временная папка, куда распаковываются пары
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Распаковать ровно два файла пары
    ///
    /// При любом исходе кроме успеха временные файлы пары удаляются.
    pub fn extract_pair(&self, archive: &ArchiveHandle, pair: &CandidatePair) -> ExtractionOutcome {
        let entries = [pair.attribute_path.as_str(), pair.geometry_path.as_str()];
        let outcome = self.extract(archive, &entries, &self.work_dir);

        if !outcome.is_success() {
            self.cleanup(pair);
        }

        outcome
    }

    /// Распаковать произвольные записи (все, если список пуст)
    pub fn extract(&self, archive: &ArchiveHandle, entries: &[&str], out_dir: &Path) -> ExtractionOutcome {
        match self.tool.run(archive.path(), entries, out_dir) {
            Ok(output) => classify_output(output.success, &output.text),
            Err(e) => ExtractionOutcome::OtherFailure {
                output: format!("не удалось запустить распаковщик: {}", e),
            },
        }
    }

    /// Удалить временные файлы пары (без ошибок наружу)
    pub fn cleanup(&self, pair: &CandidatePair) -> bool {
        cleanup_pair(&self.work_dir, pair, self.cleanup)
    }
}

/// Распаковать один файл или весь архив
pub fn extract_files<E: Extractor>(
    tool: &E,
    archive: &ArchiveHandle,
    filename: Option<&str>,
    out_dir: &Path,
) -> Result<ExtractionOutcome, ExtractError> {
    let entries: Vec<&str> = filename.into_iter().collect();
    let outcome = match tool.run(archive.path(), &entries, out_dir) {
        Ok(output) => classify_output(output.success, &output.text),
        Err(e) => ExtractionOutcome::OtherFailure {
            output: format!("не удалось запустить распаковщик: {}", e),
        },
    };

    match outcome {
        ExtractionOutcome::Success { .. } => Ok(outcome),
        ExtractionOutcome::NoMatchingEntries { .. } => Err(ExtractError::NoMatchingEntries {
            archive: archive.path().to_path_buf(),
        }),
        other => Err(ExtractError::Failed {
            archive: archive.path().to_path_buf(),
            outcome: other,
        }),
    }
}
