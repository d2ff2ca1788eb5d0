//! Пакетная конвертация: архив или папка целиком
//!
//! Пары обрабатываются строго по одной в порядке сопоставления:
//! распаковка -> конвертация -> строка отчёта -> уборка.
//! Прогон прерывается только на ошибке пароля или неизвестной ошибке
//! распаковки; отчёт в этом случае не пишется.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::config::Config;
use crate::convert::ConversionEngine;
use crate::error::PipelineError;
use crate::extract::{
    is_archive, list_archive, ArchiveExtractor, ArchiveHandle, ExtractionManager, ExtractionOutcome, Extractor,
    SevenZipTool,
};
use crate::mapinfo::{GeoBackend, MapInfoBackend};
use crate::pairing::{scan_directory, CandidatePair};
use crate::report::Report;

/// Префикс временной папки распаковки
const WORK_DIR_PREFIX: &str = ".mid2gpkg-";

/// Состояние прогона
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Чтение списка файлов
    Listing,
    /// Обработка пары index из total
    PerPairLoop { index: usize, total: usize },
    /// Отчёт записан
    Finalized,
    /// Прогон прерван, отчёт не записан
    Aborted,
}

/// Итоги прогона
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Найдено пар
    pub pairs: usize,
    pub converted: usize,
    /// Строки отчёта с ошибкой
    pub failed: usize,
    /// Пропущены при распаковке (в отчёт не попали)
    pub skipped: usize,
    pub report_path: PathBuf,
}

/// События конвертации для прогресса в CLI
#[derive(Debug, Clone)]
pub enum ConvertEvent {
    /// Найдено пар
    Started(usize),
    /// Начата пара (индекс, имя)
    PairStarted(usize, String),
    /// Пара распакована (имя)
    Extracted(String),
    /// Пара сконвертирована (имя, объектов, атрибутов)
    Converted(String, usize, usize),
    /// Ошибка конвертации, записана в отчёт (имя, ошибка)
    ConversionFailed(String, String),
    /// Пара пропущена при распаковке (имя, причина)
    Skipped(String, String),
    /// Отчёт записан
    Finished(RunSummary),
}

/// Пакетный конвертер
pub struct BatchConverter<E: Extractor, B: GeoBackend> {
    config: Config,
    extractor: E,
    engine: ConversionEngine<B>,
    state: RunState,
    event_tx: Option<mpsc::Sender<ConvertEvent>>,
}

impl BatchConverter<ArchiveExtractor, MapInfoBackend> {
    /// Конвертер с внешним 7z (tar и tar.gz без него) и встроенным бэкендом MapInfo
    pub fn from_config(config: Config) -> Self {
        let tool = ArchiveExtractor::new(SevenZipTool::new(&config.seven_zip, config.password.clone()));
        Self::new(config, tool, MapInfoBackend)
    }
}

impl<E: Extractor, B: GeoBackend> BatchConverter<E, B> {
    pub fn new(config: Config, extractor: E, backend: B) -> Self {
        let engine = ConversionEngine::new(backend, &config.output_dir);
        Self {
            config,
            extractor,
            engine,
            state: RunState::Idle,
            event_tx: None,
        }
    }

    /// Отправлять события в канал
    pub fn with_events(mut self, tx: mpsc::Sender<ConvertEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn emit(&self, event: ConvertEvent) {
        if let Some(tx) = &self.event_tx {
            // Получатель мог уже закрыться - это не повод падать
            let _ = tx.send(event);
        }
    }

    /// Папка - рекурсивно, архив - через распаковку; иначе ошибка
    pub fn convert_source(&mut self, source: &Path) -> Result<RunSummary, PipelineError> {
        if source.is_dir() {
            return self.convert_directory(source);
        }

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if source.is_file() && is_archive(&name) {
            return self.convert_archive(source);
        }

        self.state = RunState::Aborted;
        Err(PipelineError::UnsupportedSource(source.to_path_buf()))
    }

    /// Сконвертировать пары из папки без распаковки
    pub fn convert_directory(&mut self, dir: &Path) -> Result<RunSummary, PipelineError> {
        self.state = RunState::Listing;
        let pairs = match scan_directory(dir) {
            Ok(lists) => lists.pair(),
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e.into());
            }
        };
        log::info!("{}: найдено пар MID/MIF: {}", dir.display(), pairs.len());
        self.emit(ConvertEvent::Started(pairs.len()));

        let mut report = Report::new();
        for (index, pair) in pairs.iter().enumerate() {
            self.state = RunState::PerPairLoop { index, total: pairs.len() };
            self.begin_pair(index, pairs.len(), pair);
            // Пути уже содержат папку-источник
            self.convert_pair(pair, Path::new(""), &mut report);
        }

        self.finish(&report, pairs.len(), 0)
    }

    /// Распаковать и сконвертировать все пары архива
    pub fn convert_archive(&mut self, archive: &Path) -> Result<RunSummary, PipelineError> {
        self.state = RunState::Listing;
        let listed = ArchiveHandle::open(archive, self.config.password.as_deref())
            .and_then(|handle| list_archive(&handle).map(|lists| (handle, lists)));
        let (handle, lists) = match listed {
            Ok(listed) => listed,
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e.into());
            }
        };
        let pairs = lists.pair();
        log::info!(
            "{}: найдено пар MID/MIF: {} (MID: {}, MIF: {})",
            archive.display(),
            pairs.len(),
            lists.attribute.len(),
            lists.geometry.len()
        );

        // Временная папка удаляется при выходе, если не задана явно
        let (_temp, work_dir) = match self.prepare_work_dir() {
            Ok(dirs) => dirs,
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e.into());
            }
        };
        log::debug!("Временная папка: {}", work_dir.display());

        self.emit(ConvertEvent::Started(pairs.len()));

        let manager = ExtractionManager::new(&self.extractor, &work_dir, self.config.cleanup_policy());
        let mut report = Report::new();
        let mut skipped = 0;

        for (index, pair) in pairs.iter().enumerate() {
            self.state = RunState::PerPairLoop { index, total: pairs.len() };
            self.begin_pair(index, pairs.len(), pair);

            match manager.extract_pair(&handle, pair) {
                ExtractionOutcome::Success { .. } => {
                    self.emit(ConvertEvent::Extracted(pair.base_name.clone()));
                    self.convert_pair(pair, manager.work_dir(), &mut report);
                    if !manager.cleanup(pair) {
                        log::warn!("{}: временные файлы остались в {}", pair.base_name, manager.work_dir().display());
                    }
                }
                ExtractionOutcome::NoMatchingEntries { .. } => {
                    log::warn!("Ошибка распаковки {}: файлы не найдены в архиве", pair.base_name);
                    skipped += 1;
                    self.emit(ConvertEvent::Skipped(
                        pair.base_name.clone(),
                        "нет подходящих файлов".to_string(),
                    ));
                }
                ExtractionOutcome::PasswordOrCorruption {
                    output,
                    password_suspected: true,
                } => {
                    self.state = RunState::Aborted;
                    return Err(PipelineError::PasswordRejected {
                        base_name: pair.base_name.clone(),
                        output,
                    });
                }
                ExtractionOutcome::PasswordOrCorruption { .. } => {
                    log::warn!("Ошибка распаковки {}: архив повреждён, пропускаем", pair.base_name);
                    skipped += 1;
                    self.emit(ConvertEvent::Skipped(
                        pair.base_name.clone(),
                        "повреждённые данные".to_string(),
                    ));
                }
                ExtractionOutcome::OtherFailure { output } => {
                    self.state = RunState::Aborted;
                    return Err(PipelineError::ExtractionFailed {
                        base_name: pair.base_name.clone(),
                        message: output.trim().to_string(),
                    });
                }
            }
        }

        self.finish(&report, pairs.len(), skipped)
    }

    fn prepare_work_dir(&self) -> std::io::Result<(Option<tempfile::TempDir>, PathBuf)> {
        match &self.config.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok((None, dir.clone()))
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(WORK_DIR_PREFIX)
                    .tempdir_in(".")?;
                let path = temp.path().to_path_buf();
                Ok((Some(temp), path))
            }
        }
    }

    fn begin_pair(&self, index: usize, total: usize, pair: &CandidatePair) {
        log::debug!("[{}/{}] {}", index + 1, total, pair.base_name);
        self.emit(ConvertEvent::PairStarted(index, pair.base_name.clone()));
    }

    fn convert_pair(&self, pair: &CandidatePair, source_root: &Path, report: &mut Report) {
        let result = self.engine.convert_to_row(pair, source_root);
        match &result.result {
            Ok(stats) => self.emit(ConvertEvent::Converted(
                pair.base_name.clone(),
                stats.features,
                stats.attributes,
            )),
            Err(e) => self.emit(ConvertEvent::ConversionFailed(pair.base_name.clone(), e.to_string())),
        }
        report.append(result.row);
    }

    fn finish(&mut self, report: &Report, pairs: usize, skipped: usize) -> Result<RunSummary, PipelineError> {
        if report.is_empty() && pairs > 0 {
            log::warn!("Ни одна из {} пар не дошла до конвертации", pairs);
        }
        if let Err(e) = report.finalize(&self.config.report_path) {
            self.state = RunState::Aborted;
            return Err(e.into());
        }
        self.state = RunState::Finalized;

        let summary = RunSummary {
            pairs,
            converted: report.len() - report.failures(),
            failed: report.failures(),
            skipped,
            report_path: self.config.report_path.clone(),
        };
        log::info!(
            "Готово: {} сконвертировано, {} с ошибками, {} пропущено. Отчёт: {}",
            summary.converted,
            summary.failed,
            summary.skipped,
            summary.report_path.display()
        );
        self.emit(ConvertEvent::Finished(summary.clone()));
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GpkgError, MapInfoError};
    use crate::extract::ToolOutput;
    use crate::mapinfo::Dataset;
    use std::cell::RefCell;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    const MIF: &str = "Version 300\nCharset \"Neutral\"\nColumns 1\n  ID Integer\nData\nPoint 1 1\nPoint 2 2\n";

    /// Распаковщик, который отвечает по сценарию на каждый вызов
    struct Scripted {
        responses: RefCell<Vec<(bool, &'static str)>>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl Scripted {
        fn new(responses: &[(bool, &'static str)]) -> Self {
            Self {
                responses: RefCell::new(responses.iter().rev().copied().collect()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Extractor for Scripted {
        fn run(&self, _archive: &Path, entries: &[&str], out_dir: &Path) -> std::io::Result<ToolOutput> {
            self.calls
                .borrow_mut()
                .push(entries.iter().map(|e| e.to_string()).collect());
            let (success, text) = self
                .responses
                .borrow_mut()
                .pop()
                .unwrap_or((true, "Everything is Ok"));
            if success && text.contains("Everything is Ok") && !text.contains("No files") {
                for entry in entries {
                    let path = out_dir.join(entry);
                    std::fs::create_dir_all(path.parent().unwrap())?;
                    let body = if entry.ends_with(".mif") { MIF } else { "1\n2\n" };
                    std::fs::write(path, body)?;
                }
            }
            Ok(ToolOutput {
                success,
                text: text.to_string(),
            })
        }
    }

    fn zip_archive(dir: &Path, names: &[&str]) -> PathBuf {
        let path = dir.join("data.zip");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        for name in names {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"x").unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn config(dir: &Path) -> Config {
        Config {
            output_dir: dir.join("out"),
            report_path: dir.join("report.csv"),
            work_dir: Some(dir.join("work")),
            cleanup_attempts: 2,
            cleanup_delay: Duration::ZERO,
            ..Config::default()
        }
    }

    #[test]
    fn test_archive_run_converts_pairs() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["r/A.mid", "r/A.mif", "r/B.mid"]);
        let mut converter = BatchConverter::new(config(dir.path()), Scripted::new(&[]), MapInfoBackend);

        let summary = converter.convert_archive(&archive).unwrap();

        assert_eq!(summary.pairs, 1);
        assert_eq!(summary.converted, 1);
        assert_eq!(converter.state(), RunState::Finalized);
        assert!(dir.path().join("out/r/A.gpkg").exists());
        // Временные файлы убраны
        assert!(!dir.path().join("work/r").exists());
        assert!(dir.path().join("report.csv").exists());
    }

    #[test]
    fn test_password_rejected_aborts_without_report() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["A.mid", "A.mif", "B.mid", "B.mif"]);
        let tool = Scripted::new(&[(false, "ERROR: Wrong password : A.mid\nArchives with Errors: 1")]);
        let mut converter = BatchConverter::new(config(dir.path()), tool, MapInfoBackend);

        let err = converter.convert_archive(&archive).unwrap_err();

        assert!(matches!(err, PipelineError::PasswordRejected { ref base_name, .. } if base_name == "A"));
        assert_eq!(converter.state(), RunState::Aborted);
        assert!(!dir.path().join("report.csv").exists());
        // B даже не пытались распаковать
        assert_eq!(converter.extractor.calls.borrow().len(), 1);
    }

    #[test]
    fn test_no_matching_entries_skips_pair() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["A.mid", "A.mif", "B.mid", "B.mif"]);
        let tool = Scripted::new(&[(true, "No files to process\nEverything is Ok")]);
        let mut converter = BatchConverter::new(config(dir.path()), tool, MapInfoBackend);

        let summary = converter.convert_archive(&archive).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.converted, 1);
        let report = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        assert_eq!(report.lines().count(), 2);
        assert!(report.lines().nth(1).unwrap().starts_with("B,"));
    }

    #[test]
    fn test_corruption_without_password_hint_skips_pair() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["A.mid", "A.mif", "B.mid", "B.mif"]);
        let tool = Scripted::new(&[(false, "ERROR: CRC Failed : A.mid\nArchives with Errors: 1")]);
        let mut converter = BatchConverter::new(config(dir.path()), tool, MapInfoBackend);

        let summary = converter.convert_archive(&archive).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.converted, 1);
    }

    #[test]
    fn test_other_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["A.mid", "A.mif"]);
        let tool = Scripted::new(&[(false, "ERROR: something unexpected")]);
        let mut converter = BatchConverter::new(config(dir.path()), tool, MapInfoBackend);

        let err = converter.convert_archive(&archive).unwrap_err();

        assert!(matches!(err, PipelineError::ExtractionFailed { .. }));
        assert!(!dir.path().join("report.csv").exists());
    }

    #[test]
    fn test_events_are_sent() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["A.mid", "A.mif"]);
        let (tx, rx) = mpsc::channel();
        let mut converter =
            BatchConverter::new(config(dir.path()), Scripted::new(&[]), MapInfoBackend).with_events(tx);

        converter.convert_archive(&archive).unwrap();
        drop(converter);

        let events: Vec<ConvertEvent> = rx.iter().collect();
        assert!(matches!(events[0], ConvertEvent::Started(1)));
        assert!(matches!(events[1], ConvertEvent::PairStarted(0, _)));
        assert!(matches!(events[2], ConvertEvent::Extracted(_)));
        assert!(matches!(events[3], ConvertEvent::Converted(_, 2, 1)));
        assert!(matches!(events[4], ConvertEvent::Finished(_)));
    }

    #[test]
    fn test_unsupported_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.rar");
        std::fs::write(&path, b"rar").unwrap();
        let mut converter = BatchConverter::new(config(dir.path()), Scripted::new(&[]), MapInfoBackend);

        let err = converter.convert_source(&path).unwrap_err();

        assert!(matches!(err, PipelineError::UnsupportedSource(_)));
        assert!(!dir.path().join("report.csv").exists());
    }

    #[test]
    fn test_directory_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src/roads");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("A.mif"), MIF).unwrap();
        std::fs::write(src.join("A.mid"), "1\n2\n").unwrap();
        let mut converter = BatchConverter::new(config(dir.path()), Scripted::new(&[]), MapInfoBackend);

        let summary = converter.convert_source(&dir.path().join("src")).unwrap();

        assert_eq!(summary.converted, 1);
        assert!(dir.path().join("out/roads/A.gpkg").exists());
        // Распаковщик в режиме папки не вызывается
        assert!(converter.extractor.calls.borrow().is_empty());
    }

    #[test]
    fn test_tar_gz_source_converts_pairs() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("data.tar.gz");
        let gz = flate2::write::GzEncoder::new(
            std::fs::File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(gz);
        for (name, body) in [("x/A.mid", "1\n2\n"), ("x/A.mif", MIF)] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        // 7z не нужен: tar.gz распаковывается без него
        let tool = ArchiveExtractor::new(SevenZipTool::new("/nonexistent/7z-binary", None));
        let mut converter = BatchConverter::new(config(dir.path()), tool, MapInfoBackend);

        let summary = converter.convert_source(&archive).unwrap();

        assert_eq!(summary.pairs, 1);
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped, 0);
        assert!(dir.path().join("out/x/A.gpkg").exists());
        assert!(!dir.path().join("work/x").exists());
        let report = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        assert!(report.lines().nth(1).unwrap().starts_with("x/A,"));
    }

    /// Бэкенд, после чтения подменяющий временную папку обычным файлом
    struct BlockingCleanup {
        work_dir: PathBuf,
    }

    impl GeoBackend for BlockingCleanup {
        fn read(&self, attribute: &Path, geometry: &Path, name: &str) -> Result<Dataset, MapInfoError> {
            let dataset = MapInfoBackend.read(attribute, geometry, name)?;
            std::fs::remove_dir_all(&self.work_dir)?;
            std::fs::write(&self.work_dir, "busy")?;
            Ok(dataset)
        }

        fn write(&self, dataset: &Dataset, out: &Path) -> Result<(), GpkgError> {
            MapInfoBackend.write(dataset, out)
        }
    }

    #[test]
    fn test_cleanup_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let archive = zip_archive(dir.path(), &["r/A.mid", "r/A.mif"]);
        let backend = BlockingCleanup {
            work_dir: dir.path().join("work"),
        };
        let mut converter = BatchConverter::new(config(dir.path()), Scripted::new(&[]), backend);

        let summary = converter.convert_archive(&archive).unwrap();

        assert_eq!(converter.state(), RunState::Finalized);
        assert_eq!(summary.converted, 1);
        assert!(dir.path().join("out/r/A.gpkg").exists());
        // work/r удалить невозможно: work теперь файл
        assert!(dir.path().join("work").is_file());
        assert!(dir.path().join("report.csv").exists());
    }
}
