//! Удаление временно распакованных файлов

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::pairing::CandidatePair;

/// Сколько раз пытаться удалить по умолчанию
pub const DEFAULT_CLEANUP_ATTEMPTS: u32 = 10;

/// Политика повторов при удалении
#[derive(Debug, Clone, Copy)]
pub struct CleanupPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CLEANUP_ATTEMPTS,
            delay: Duration::from_millis(50),
        }
    }
}

/// Что удалять после обработки пары
///
/// Если пара лежит в папке - верхнюю папку целиком, иначе два файла.
pub fn cleanup_targets(work_dir: &Path, pair: &CandidatePair) -> Vec<PathBuf> {
    match pair.top_level_dir() {
        Some(top) => vec![work_dir.join(top)],
        None => vec![
            work_dir.join(&pair.attribute_path),
            work_dir.join(&pair.geometry_path),
        ],
    }
}

/// Удалить временные файлы пары
///
/// Возвращает false, если что-то удалить так и не удалось.
pub fn cleanup_pair(work_dir: &Path, pair: &CandidatePair, policy: CleanupPolicy) -> bool {
    cleanup_targets(work_dir, pair)
        .iter()
        .fold(true, |ok, target| attempt_remove(target, policy) && ok)
}

/// Удалить файл или папку с повторами
///
/// "Уже удалено" считается успехом.
pub fn attempt_remove(target: &Path, policy: CleanupPolicy) -> bool {
    let mut last_error = None;

    for attempt in 0..policy.attempts {
        if attempt > 0 && !policy.delay.is_zero() {
            thread::sleep(policy.delay);
        }

        match remove_path(target) {
            Ok(()) => return true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) => {
                log::debug!(
                    "Попытка {} удалить {}: {}",
                    attempt + 1,
                    target.display(),
                    e
                );
                last_error = Some(e);
            }
        }
    }

    log::warn!(
        "Не удалось удалить {} за {} попыток: {}",
        target.display(),
        policy.attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    );
    false
}

fn remove_path(target: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(target)?;
    if metadata.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    }
}
