//! Распаковка через внешний 7z
//!
//! Результат определяется по тексту вывода утилиты: строки вида
//! "Everything is Ok" или "No files to process" и есть протокол.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::types::ExtractionOutcome;

/// Всё распаковано
pub const MARKER_OK: &str = "Everything is Ok";
/// Запрошенных файлов нет
pub const MARKER_NO_FILES: &str = "No files to process";
/// Ошибки архива (пароль или повреждение)
pub const MARKER_ARCHIVE_ERRORS: &str = "Archives with Errors";

/// Признаки проблемы именно с паролем (в нижнем регистре)
const PASSWORD_HINTS: &[&str] = &[
    "wrong password",
    "can not open encrypted archive",
    "cannot open encrypted archive",
    "enter password",
];

/// Сырой результат запуска распаковщика
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Код возврата 0
    pub success: bool,
    /// stdout + stderr
    pub text: String,
}

/// Внешний распаковщик
pub trait Extractor {
    /// Распаковать `entries` (все файлы, если пусто) в `out_dir`
    fn run(&self, archive: &Path, entries: &[&str], out_dir: &Path) -> std::io::Result<ToolOutput>;
}

impl<E: Extractor + ?Sized> Extractor for &E {
    fn run(&self, archive: &Path, entries: &[&str], out_dir: &Path) -> std::io::Result<ToolOutput> {
        (**self).run(archive, entries, out_dir)
    }
}

/// Консольный 7-Zip
#[derive(Debug, Clone)]
pub struct SevenZipTool {
    program: PathBuf,
    password: Option<String>,
}

impl SevenZipTool {
    pub fn new(program: impl Into<PathBuf>, password: Option<String>) -> Self {
        Self {
            program: program.into(),
            password,
        }
    }

    /// Аргументы командной строки (без имени программы)
    pub fn args(&self, archive: &Path, entries: &[&str], out_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "x".to_string(),
            "-y".to_string(),
            format!("-o{}", out_dir.display()),
            // Пустой -p, чтобы 7z не спрашивал пароль интерактивно
            format!("-p{}", self.password.as_deref().unwrap_or("")),
            // Дальше только пути: имя вида "-x.mid" не станет ключом
            "--".to_string(),
            archive.display().to_string(),
        ];
        args.extend(entries.iter().map(|e| e.to_string()));
        args
    }
}

impl Extractor for SevenZipTool {
    fn run(&self, archive: &Path, entries: &[&str], out_dir: &Path) -> std::io::Result<ToolOutput> {
        let output = Command::new(&self.program)
            .args(self.args(archive, entries, out_dir))
            .stdin(Stdio::null())
            .output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            text.push('\n');
            text.push_str(&stderr);
        }

        Ok(ToolOutput {
            success: output.status.success(),
            text,
        })
    }
}

/// Разобрать вывод распаковщика
pub fn classify_output(success: bool, text: &str) -> ExtractionOutcome {
    let lower = text.to_lowercase();
    let password_suspected = PASSWORD_HINTS.iter().any(|hint| lower.contains(hint));

    if text.contains(MARKER_ARCHIVE_ERRORS) || password_suspected {
        return ExtractionOutcome::PasswordOrCorruption {
            output: text.to_string(),
            password_suspected,
        };
    }

    // 7z пишет "Everything is Ok" даже когда ничего не нашёл
    if text.contains(MARKER_NO_FILES) {
        return ExtractionOutcome::NoMatchingEntries {
            output: text.to_string(),
        };
    }

    if success && text.contains(MARKER_OK) {
        return ExtractionOutcome::Success {
            output: text.to_string(),
        };
    }

    ExtractionOutcome::OtherFailure {
        output: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_OUTPUT: &str = "7-Zip 23.01 (x64)\n\nScanning the drive for archives:\n1 file, 1024 bytes\n\nExtracting archive: data.7z\n--\nPath = data.7z\nType = 7z\n\nEverything is Ok\n\nFiles: 2\nSize:       2048\n";

    const NO_FILES_OUTPUT: &str = "Extracting archive: data.7z\n--\nPath = data.7z\nType = 7z\n\nNo files to process\nEverything is Ok\n\nFiles: 0\n";

    const WRONG_PASSWORD_OUTPUT: &str = "Extracting archive: data.7z\n\nERROR: Data Error in encrypted file. Wrong password? : roads/A.mid\n\nSub items Errors: 1\n\nArchives with Errors: 1\n";

    const CRC_OUTPUT: &str = "Extracting archive: data.7z\n\nERROR: CRC Failed : roads/A.mid\n\nSub items Errors: 1\n\nArchives with Errors: 1\n";

    // === Тесты classify_output ===

    #[test]
    fn test_classify_success() {
        let outcome = classify_output(true, OK_OUTPUT);
        assert!(outcome.is_success());
        assert_eq!(outcome.output(), OK_OUTPUT);
    }

    #[test]
    fn test_classify_no_files_wins_over_ok() {
        let outcome = classify_output(true, NO_FILES_OUTPUT);
        assert!(matches!(outcome, ExtractionOutcome::NoMatchingEntries { .. }));
    }

    #[test]
    fn test_classify_wrong_password() {
        let outcome = classify_output(false, WRONG_PASSWORD_OUTPUT);
        assert!(matches!(
            outcome,
            ExtractionOutcome::PasswordOrCorruption {
                password_suspected: true,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_corruption_without_password_hint() {
        let outcome = classify_output(false, CRC_OUTPUT);
        assert!(matches!(
            outcome,
            ExtractionOutcome::PasswordOrCorruption {
                password_suspected: false,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_encrypted_headers() {
        let text = "ERROR: data.7z\nCan not open encrypted archive. Wrong password?\n";
        let outcome = classify_output(false, text);
        assert!(matches!(
            outcome,
            ExtractionOutcome::PasswordOrCorruption {
                password_suspected: true,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_ok_marker_with_failed_exit_code() {
        let outcome = classify_output(false, OK_OUTPUT);
        assert!(matches!(outcome, ExtractionOutcome::OtherFailure { .. }));
    }

    #[test]
    fn test_classify_unknown_output() {
        let outcome = classify_output(false, "System ERROR:\nNot enough memory\n");
        assert!(matches!(outcome, ExtractionOutcome::OtherFailure { .. }));
        assert!(outcome.describe().contains("Not enough memory"));
    }

    // === Тесты SevenZipTool ===

    #[test]
    fn test_args_with_password() {
        let tool = SevenZipTool::new("7z", Some("secret".to_string()));
        let args = tool.args(
            Path::new("data.7z"),
            &["r/A.mid", "r/A.mif"],
            Path::new("tmp"),
        );

        assert_eq!(
            args,
            vec!["x", "-y", "-otmp", "-psecret", "--", "data.7z", "r/A.mid", "r/A.mif"]
        );
    }

    #[test]
    fn test_args_without_password() {
        let tool = SevenZipTool::new("7z", None);
        let args = tool.args(Path::new("data.7z"), &[], Path::new("out"));

        assert_eq!(args, vec!["x", "-y", "-oout", "-p", "--", "data.7z"]);
    }

    #[test]
    fn test_args_entry_looking_like_switch() {
        let tool = SevenZipTool::new("7z", None);
        let args = tool.args(Path::new("data.7z"), &["-r.mid"], Path::new("out"));

        let separator = args.iter().position(|a| a == "--").unwrap();
        let entry = args.iter().position(|a| a == "-r.mid").unwrap();
        assert!(separator < entry);
        assert_eq!(args.last().map(String::as_str), Some("-r.mid"));
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let tool = SevenZipTool::new("/nonexistent/7z-binary", None);
        let result = tool.run(Path::new("data.7z"), &[], Path::new("."));
        assert!(result.is_err());
    }
}
