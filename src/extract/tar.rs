//! Распаковка tar и tar.gz без внешней утилиты
//!
//! 7z снимает с tar.gz только слой gzip, поэтому tar-архивы
//! распаковываются здесь. Вывод повторяет маркеры 7z, чтобы
//! результат разбирал тот же `classify_output`.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use super::sevenzip::{Extractor, SevenZipTool, ToolOutput, MARKER_ARCHIVE_ERRORS, MARKER_NO_FILES, MARKER_OK};
use super::types::ArchiveType;

/// Распаковщик tar и tar.gz
#[derive(Debug, Clone, Copy, Default)]
pub struct TarExtractor;

impl Extractor for TarExtractor {
    fn run(&self, archive: &Path, entries: &[&str], out_dir: &Path) -> io::Result<ToolOutput> {
        let reader = BufReader::new(File::open(archive)?);
        let unpacked = match ArchiveType::from_path(archive) {
            ArchiveType::TarGz => unpack_entries(tar::Archive::new(GzDecoder::new(reader)), entries, out_dir),
            _ => unpack_entries(tar::Archive::new(reader), entries, out_dir),
        };

        let name = archive.display();
        let output = match unpacked {
            Ok(0) => ToolOutput {
                success: true,
                text: format!("Extracting archive: {}\n\n{}\n{}\n", name, MARKER_NO_FILES, MARKER_OK),
            },
            Ok(files) => ToolOutput {
                success: true,
                text: format!("Extracting archive: {}\n\n{}\n\nFiles: {}\n", name, MARKER_OK, files),
            },
            // Битый gzip или tar - как повреждённый архив у 7z
            Err(e) => ToolOutput {
                success: false,
                text: format!("Extracting archive: {}\n\nERROR: {}\n\n{}: 1\n", name, e, MARKER_ARCHIVE_ERRORS),
            },
        };
        Ok(output)
    }
}

/// Распаковать из tar запрошенные файлы (все, если список пуст)
fn unpack_entries<R: Read>(mut archive: tar::Archive<R>, entries: &[&str], out_dir: &Path) -> io::Result<usize> {
    let mut files = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        if !entries.is_empty() && !entries.contains(&name.as_str()) {
            continue;
        }
        // unpack_in создаёт родительские папки и не выходит за out_dir
        if entry.unpack_in(out_dir)? {
            files += 1;
        }
    }

    Ok(files)
}

/// Распаковщик по типу архива: tar и tar.gz сами, остальное через 7z
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    seven_zip: SevenZipTool,
    tar: TarExtractor,
}

impl ArchiveExtractor {
    pub fn new(seven_zip: SevenZipTool) -> Self {
        Self {
            seven_zip,
            tar: TarExtractor,
        }
    }
}

impl Extractor for ArchiveExtractor {
    fn run(&self, archive: &Path, entries: &[&str], out_dir: &Path) -> io::Result<ToolOutput> {
        match ArchiveType::from_path(archive) {
            ArchiveType::Tar | ArchiveType::TarGz => self.tar.run(archive, entries, out_dir),
            _ => self.seven_zip.run(archive, entries, out_dir),
        }
    }
}
