//! Вспомогательные утилиты

use std::path::Path;

/// Безопасно обрезает строку до max_chars символов (не байт!) с начала
/// Если строка длиннее - показывает "..." и конец строки
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let skip = char_count.saturating_sub(max_chars.saturating_sub(3));
        format!("...{}", s.chars().skip(skip).collect::<String>())
    }
}

/// Форматирование размера файла в человекочитаемый вид
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} ГБ", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} МБ", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} КБ", size as f64 / KB as f64)
    } else {
        format!("{} Б", size)
    }
}

/// Размер в мегабайтах (1024 * 1024), округлённый до 4 знаков
pub fn size_in_mb(size: u64) -> f64 {
    let mb = size as f64 / (1024.0 * 1024.0);
    (mb * 10_000.0).round() / 10_000.0
}

/// Размер файла в МБ; 0 если файл недоступен
pub fn file_size_mb(path: &Path) -> f64 {
    std::fs::metadata(path)
        .map(|m| size_in_mb(m.len()))
        .unwrap_or(0.0)
}
