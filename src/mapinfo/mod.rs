//! Чтение MapInfo MID/MIF и запись GeoPackage
//!
//! Конвертер работает с этим модулем через [`GeoBackend`], поэтому
//! чтение и запись можно подменить в тестах.

mod dataset;
mod gpkg;
mod mid;
mod mif;

use std::path::Path;

pub use dataset::{Bounds, Column, ColumnType, Coord, Dataset, Geometry, Ring, Value};
pub use gpkg::{geometry_blob, srs_for_coord_sys, write_gpkg, FID_COLUMN, GEOMETRY_COLUMN};
pub use mid::{parse_mid, read_mid};
pub use mif::{encoding_for_charset, parse_mif, read_mif, ColumnDef, MifFile, MifHeader};

use crate::error::{GpkgError, MapInfoError};

/// Расширение выходного файла
pub const GPKG_EXT: &str = "gpkg";

/// Чтение пары и запись результата
pub trait GeoBackend {
    /// Прочитать пару MID/MIF в слой с именем `name`
    fn read(&self, attribute: &Path, geometry: &Path, name: &str) -> Result<Dataset, MapInfoError>;

    /// Записать слой в файл (существующий файл заменяется)
    fn write(&self, dataset: &Dataset, out: &Path) -> Result<(), GpkgError>;
}

/// Встроенный бэкенд: MIF/MID -> GeoPackage
#[derive(Debug, Clone, Copy, Default)]
pub struct MapInfoBackend;

impl GeoBackend for MapInfoBackend {
    fn read(&self, attribute: &Path, geometry: &Path, name: &str) -> Result<Dataset, MapInfoError> {
        let mif = read_mif(geometry)?;
        let features = mif.geometries.len();

        // MID без колонок может быть пустым файлом
        let rows = if mif.header.columns.is_empty() {
            vec![Vec::new(); features]
        } else {
            read_mid(attribute, &mif.header)?
        };

        if rows.len() != features {
            return Err(MapInfoError::RowCountMismatch {
                features,
                rows: rows.len(),
            });
        }

        Ok(build_dataset(name, mif, rows))
    }

    fn write(&self, dataset: &Dataset, out: &Path) -> Result<(), GpkgError> {
        write_gpkg(dataset, out)
    }
}

/// Переложить строки MID в колонки
fn build_dataset(name: &str, mif: MifFile, rows: Vec<Vec<Value>>) -> Dataset {
    let MifFile { header, geometries } = mif;

    let mut columns: Vec<Column> = header
        .columns
        .into_iter()
        .map(|def| Column {
            name: def.name,
            kind: def.kind,
            values: Vec::with_capacity(rows.len()),
        })
        .collect();

    for row in rows {
        for (column, value) in columns.iter_mut().zip(row) {
            column.values.push(value);
        }
    }

    Dataset {
        name: name.to_string(),
        coord_sys: header.coord_sys,
        geometries,
        columns,
    }
}
