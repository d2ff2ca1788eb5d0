//! Конвертация одной пары MID/MIF в GeoPackage
//!
//! Ошибка чтения или записи не прерывает прогон: она попадает в строку
//! отчёта, а обработка переходит к следующей паре.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;
use crate::mapinfo::{ColumnType, Dataset, GeoBackend, GPKG_EXT};
use crate::pairing::CandidatePair;
use crate::report::ReportRow;
use crate::utils::file_size_mb;

/// Результат успешной конвертации
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertStats {
    pub features: usize,
    /// Без колонки геометрии
    pub attributes: usize,
    pub output: PathBuf,
}

/// Строка отчёта вместе с исходом конвертации
#[derive(Debug)]
pub struct PairReport {
    pub row: ReportRow,
    pub result: Result<ConvertStats, ConvertError>,
}

/// Привести к тексту колонки, где встречаются сырые байты
///
/// Возвращает имена изменённых колонок.
pub fn normalize_columns(dataset: &mut Dataset) -> Vec<String> {
    let mut coerced = Vec::new();

    for column in &mut dataset.columns {
        if !column.values.iter().any(|v| v.is_bytes()) {
            continue;
        }
        column.values = std::mem::take(&mut column.values)
            .into_iter()
            .map(|v| v.into_text())
            .collect();
        column.kind = ColumnType::Text;
        coerced.push(column.name.clone());
    }

    coerced
}

/// `<output_root>/<container>/<stem>.gpkg`, папка создаётся при необходимости
pub fn output_path(output_root: &Path, pair: &CandidatePair) -> std::io::Result<PathBuf> {
    let dir = output_root.join(pair.container());
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!("{}.{}", pair.stem(), GPKG_EXT)))
}

/// Конвертер пар через заданный бэкенд
pub struct ConversionEngine<B: GeoBackend> {
    backend: B,
    output_root: PathBuf,
}

impl<B: GeoBackend> ConversionEngine<B> {
    pub fn new(backend: B, output_root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            output_root: output_root.into(),
        }
    }

    /// Прочитать, нормализовать и записать пару, лежащую в `source_root`
    pub fn convert(&self, pair: &CandidatePair, source_root: &Path) -> Result<ConvertStats, ConvertError> {
        let (mid, mif) = pair.resolve(source_root);

        let mut dataset = self.backend.read(&mid, &mif, pair.stem())?;
        let coerced = normalize_columns(&mut dataset);
        if !coerced.is_empty() {
            log::debug!("{}: колонки приведены к тексту: {}", pair.base_name, coerced.join(", "));
        }

        let output = output_path(&self.output_root, pair)?;
        self.backend.write(&dataset, &output)?;

        Ok(ConvertStats {
            features: dataset.feature_count(),
            attributes: dataset.attribute_count(),
            output,
        })
    }

    /// Конвертировать пару и собрать строку отчёта (без ошибок наружу)
    pub fn convert_to_row(&self, pair: &CandidatePair, source_root: &Path) -> PairReport {
        let (mid, mif) = pair.resolve(source_root);
        let mid_size = file_size_mb(&mid);
        let mif_size = file_size_mb(&mif);

        let result = self.convert(pair, source_root);
        let row = match &result {
            Ok(stats) => {
                log::info!(
                    "{} -> {} ({} объектов, {} атрибутов)",
                    pair.base_name,
                    stats.output.display(),
                    stats.features,
                    stats.attributes
                );
                ReportRow::success(&pair.base_name, mid_size, mif_size, stats.features, stats.attributes)
            }
            Err(e) => {
                log::error!("{}: {}", pair.base_name, e);
                ReportRow::failure(&pair.base_name, &e.to_string(), mid_size, mif_size)
            }
        };

        PairReport { row, result }
    }
}
