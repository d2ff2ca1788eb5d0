//! Просмотр содержимого архива без распаковки

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::types::{ArchiveHandle, ArchiveType};
use crate::error::ArchiveError;
use crate::pairing::RoleLists;

/// Список MID и MIF файлов в архиве (в порядке следования в архиве)
pub fn list_archive(handle: &ArchiveHandle) -> Result<RoleLists, ArchiveError> {
    let names = list_entry_names(handle)?;
    log::debug!("{}: {} записей", handle.path().display(), names.len());
    Ok(RoleLists::from_names(names))
}

/// Имена всех файлов архива (папки пропускаются)
///
/// При ошибке частичный список не возвращается.
pub fn list_entry_names(handle: &ArchiveHandle) -> Result<Vec<String>, ArchiveError> {
    let path = handle.path();
    match handle.kind() {
        ArchiveType::SevenZip => list_7z(path, handle.password()),
        ArchiveType::Zip => list_zip(path),
        ArchiveType::Tar => {
            let file = File::open(path).map_err(|e| open_error(path, e))?;
            list_tar(path, BufReader::new(file))
        }
        ArchiveType::TarGz => {
            let file = File::open(path).map_err(|e| open_error(path, e))?;
            let gz = flate2::read::GzDecoder::new(BufReader::new(file));
            list_tar(path, gz)
        }
        ArchiveType::Unknown => Err(ArchiveError::Unsupported(path.to_path_buf())),
    }
}

fn list_7z(path: &Path, password: Option<&str>) -> Result<Vec<String>, ArchiveError> {
    let password = match password {
        Some(pw) => sevenz_rust::Password::from(pw),
        None => sevenz_rust::Password::empty(),
    };
    let reader =
        sevenz_rust::SevenZReader::open(path, password).map_err(|e| open_error(path, e))?;

    Ok(reader
        .archive()
        .files
        .iter()
        .filter(|entry| !entry.is_directory())
        .map(|entry| entry.name().to_string())
        .collect())
}

fn list_zip(path: &Path) -> Result<Vec<String>, ArchiveError> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| open_error(path, e))?;

    // Имена в zip не шифруются - пароль для листинга не нужен
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(|e| read_error(path, e))?;
        if entry.is_dir() {
            continue;
        }
        names.push(entry.name().to_string());
    }

    Ok(names)
}

fn list_tar<R: Read>(path: &Path, reader: R) -> Result<Vec<String>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let mut names = Vec::new();

    for entry in archive.entries().map_err(|e| read_error(path, e))? {
        let entry = entry.map_err(|e| read_error(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().map_err(|e| read_error(path, e))?;
        names.push(name.to_string_lossy().into_owned());
    }

    Ok(names)
}

fn open_error(path: &Path, e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn make_zip(dir: &Path, entries: &[&str]) -> std::path::PathBuf {
        let path = dir.join("data.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .add_directory("roads/", SimpleFileOptions::default())
            .unwrap();
        for name in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(b"content").unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn make_tar_gz(dir: &Path, entries: &[&str]) -> std::path::PathBuf {
        let path = dir.join("data.tar.gz");
        let gz = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(gz);
        for name in entries {
            let data = b"content";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, &data[..]).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    // === Тесты list_archive ===

    #[test]
    fn test_list_zip_classifies_entries() {
        let dir = TempDir::new().unwrap();
        let path = make_zip(
            dir.path(),
            &["roads/A.mid", "roads/A.mif", "roads/readme.txt", "roads/B.MID"],
        );

        let handle = ArchiveHandle::open(&path, None).unwrap();
        let lists = list_archive(&handle).unwrap();

        assert_eq!(lists.attribute, vec!["roads/A.mid", "roads/B.MID"]);
        assert_eq!(lists.geometry, vec!["roads/A.mif"]);
    }

    #[test]
    fn test_list_zip_skips_directories() {
        let dir = TempDir::new().unwrap();
        let path = make_zip(dir.path(), &["roads/A.mid"]);

        let handle = ArchiveHandle::open(&path, Some("secret")).unwrap();
        let names = list_entry_names(&handle).unwrap();

        assert_eq!(names, vec!["roads/A.mid"]);
    }

    #[test]
    fn test_list_tar_gz() {
        let dir = TempDir::new().unwrap();
        let path = make_tar_gz(dir.path(), &["x/A.mid", "x/A.mif"]);

        let handle = ArchiveHandle::open(&path, None).unwrap();
        let lists = list_archive(&handle).unwrap();

        assert_eq!(lists.attribute, vec!["x/A.mid"]);
        assert_eq!(lists.geometry, vec!["x/A.mif"]);
    }

    #[test]
    fn test_list_corrupted_zip_is_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        let handle = ArchiveHandle::open(&path, None).unwrap();
        let err = list_archive(&handle).unwrap_err();

        assert!(matches!(err, ArchiveError::Open { .. }));
    }

    #[test]
    fn test_list_corrupted_7z_is_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.7z");
        std::fs::write(&path, b"not a 7z archive at all").unwrap();

        let handle = ArchiveHandle::open(&path, Some("pw")).unwrap();
        let err = list_archive(&handle).unwrap_err();

        assert!(matches!(err, ArchiveError::Open { .. }));
    }

    #[test]
    fn test_open_unknown_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.rar");
        std::fs::write(&path, b"rar").unwrap();

        let err = ArchiveHandle::open(&path, None).unwrap_err();
        assert!(matches!(err, ArchiveError::Unsupported(_)));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ArchiveHandle::open(&dir.path().join("missing.7z"), None).unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }));
    }
}
