//! Отчёт о конвертации (report.csv)
//!
//! Одна строка на каждую обработанную пару в порядке обработки.
//! Файл пишется целиком в конце прогона и перезаписывает старый.

use std::path::Path;

use serde::Serialize;

/// Имя файла отчёта по умолчанию
pub const REPORT_FILE: &str = "report.csv";

/// Строка отчёта
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Имя пары или "имя: ошибка"
    #[serde(rename = "filename")]
    pub filename_or_error: String,
    #[serde(rename = "mid_filesize")]
    pub mid_size_mb: f64,
    #[serde(rename = "mif_filesize")]
    pub mif_size_mb: f64,
    /// None - конвертация не удалась
    #[serde(rename = "num_features")]
    pub feature_count: Option<usize>,
    #[serde(rename = "num_attributes")]
    pub attribute_count: Option<usize>,
}

impl ReportRow {
    pub fn success(
        name: &str,
        mid_size_mb: f64,
        mif_size_mb: f64,
        feature_count: usize,
        attribute_count: usize,
    ) -> Self {
        Self {
            filename_or_error: name.to_string(),
            mid_size_mb,
            mif_size_mb,
            feature_count: Some(feature_count),
            attribute_count: Some(attribute_count),
        }
    }

    pub fn failure(name: &str, error: &str, mid_size_mb: f64, mif_size_mb: f64) -> Self {
        Self {
            filename_or_error: format!("{}: {}", name, error),
            mid_size_mb,
            mif_size_mb,
            feature_count: None,
            attribute_count: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.feature_count.is_none()
    }
}

/// Накопитель строк отчёта
#[derive(Debug, Clone, Default)]
pub struct Report {
    rows: Vec<ReportRow>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить строку (вызывается ровно один раз на пару)
    pub fn append(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Количество строк с ошибкой
    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|r| r.is_failure()).count()
    }

    /// Записать CSV, перезаписав прежний файл
    pub fn finalize(&self, path: &Path) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        if self.rows.is_empty() {
            // serde не пишет заголовок без строк
            writer.write_record([
                "filename",
                "mid_filesize",
                "mif_filesize",
                "num_features",
                "num_attributes",
            ])?;
        }
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
