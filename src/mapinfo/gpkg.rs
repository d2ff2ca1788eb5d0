//! Запись GeoPackage (SQLite)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;

use super::dataset::{ColumnType, Coord, Dataset, Geometry, Value};
use crate::error::GpkgError;

/// PRAGMA application_id = "GPKG"
pub const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;
/// GeoPackage 1.3
pub const GPKG_USER_VERSION: i32 = 10300;
/// Первичный ключ таблицы объектов
pub const FID_COLUMN: &str = "fid";
/// Колонка геометрии
pub const GEOMETRY_COLUMN: &str = "geom";

const WGS84_WKT: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]";

const SCHEMA: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT uk_gc_table_name UNIQUE (table_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
INSERT INTO gpkg_spatial_ref_sys VALUES
    ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
    ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');
";

/// SRS по строке CoordSys (без перепроецирования)
pub fn srs_for_coord_sys(coord_sys: Option<&str>) -> i32 {
    let Some(coord_sys) = coord_sys else {
        return 0;
    };
    let normalized: String = coord_sys
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.starts_with("earth projection 1, 104") {
        4326
    } else if normalized.starts_with("nonearth") {
        -1
    } else {
        0
    }
}

/// Записать слой в GeoPackage, заменив существующий файл
///
/// Пишется во временный файл рядом и переименовывается после commit.
/// При ошибке не остаётся ни временного, ни прежнего файла.
pub fn write_gpkg(dataset: &Dataset, path: &Path) -> Result<(), GpkgError> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp = PathBuf::from(temp_name);
    remove_if_exists(&temp)?;

    if let Err(e) = write_layer(dataset, &temp) {
        for leftover in [temp.as_path(), path] {
            if let Err(err) = remove_if_exists(leftover) {
                log::warn!("Не удалось удалить {}: {}", leftover.display(), err);
            }
        }
        return Err(e);
    }

    fs::rename(&temp, path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn write_layer(dataset: &Dataset, path: &Path) -> Result<(), GpkgError> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(&format!(
        "PRAGMA application_id = {}; PRAGMA user_version = {};",
        GPKG_APPLICATION_ID, GPKG_USER_VERSION
    ))?;

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;

    let srs_id = srs_for_coord_sys(dataset.coord_sys.as_deref());
    if srs_id == 4326 {
        tx.execute(
            "INSERT INTO gpkg_spatial_ref_sys VALUES ('WGS 84 geodetic', 4326, 'EPSG', 4326, ?1, 'longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid')",
            [WGS84_WKT],
        )?;
    }

    let column_names = attribute_column_names(dataset);
    let mut create = format!(
        "CREATE TABLE {} ({} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, {} {}",
        quote(&dataset.name),
        quote(FID_COLUMN),
        quote(GEOMETRY_COLUMN),
        geometry_type_name(dataset)
    );
    for (name, column) in column_names.iter().zip(&dataset.columns) {
        create.push_str(&format!(", {} {}", quote(name), sql_type(column.kind)));
    }
    create.push(')');
    tx.execute(&create, [])?;

    let bounds = dataset.bounds();
    tx.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, description, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            dataset.name,
            dataset.coord_sys.as_deref().unwrap_or(""),
            bounds.map(|b| b.min_x),
            bounds.map(|b| b.min_y),
            bounds.map(|b| b.max_x),
            bounds.map(|b| b.max_y),
            srs_id,
        ],
    )?;
    tx.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, ?2, ?3, ?4, 0, 0)",
        rusqlite::params![
            dataset.name,
            GEOMETRY_COLUMN,
            geometry_type_name(dataset),
            srs_id
        ],
    )?;

    {
        let mut insert = format!("INSERT INTO {} ({}", quote(&dataset.name), quote(GEOMETRY_COLUMN));
        for name in &column_names {
            insert.push_str(&format!(", {}", quote(name)));
        }
        insert.push_str(") VALUES (?1");
        for i in 0..column_names.len() {
            insert.push_str(&format!(", ?{}", i + 2));
        }
        insert.push(')');

        let mut stmt = tx.prepare(&insert)?;
        for (index, geometry) in dataset.geometries.iter().enumerate() {
            let blob = geometry.as_ref().map(|g| geometry_blob(g, srs_id));
            let mut params: Vec<&dyn ToSql> = Vec::with_capacity(column_names.len() + 1);
            params.push(&blob);
            params.extend(dataset.row(index).map(|v| v as &dyn ToSql));
            stmt.execute(params.as_slice())?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Имена колонок атрибутов без конфликтов с fid/geom
fn attribute_column_names(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns
        .iter()
        .map(|c| {
            if c.name.eq_ignore_ascii_case(FID_COLUMN) || c.name.eq_ignore_ascii_case(GEOMETRY_COLUMN) {
                format!("{}_attr", c.name)
            } else {
                c.name.clone()
            }
        })
        .collect()
}

/// Общий тип геометрии слоя или GEOMETRY, если типы разные
pub fn geometry_type_name(dataset: &Dataset) -> &'static str {
    let mut names = dataset.geometries.iter().flatten().map(Geometry::type_name);
    let Some(first) = names.next() else {
        return "GEOMETRY";
    };
    if names.all(|n| n == first) {
        first
    } else {
        "GEOMETRY"
    }
}

fn sql_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::Text | ColumnType::DateTime => "TEXT",
        ColumnType::Integer => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Date => "DATE",
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

// === Бинарный формат геометрии GeoPackage ===

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;

/// Заголовок "GP" + конверт XY + WKB, всё little-endian
pub fn geometry_blob(geometry: &Geometry, srs_id: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(b"GP");
    buf.push(0); // версия
    // бит 0: little-endian, биты 1-3: конверт [minx, maxx, miny, maxy]
    buf.push(0b0000_0011);
    buf.extend_from_slice(&srs_id.to_le_bytes());

    if let Some(b) = geometry.bounds() {
        for v in [b.min_x, b.max_x, b.min_y, b.max_y] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    write_wkb(&mut buf, geometry);
    buf
}

fn write_wkb(buf: &mut Vec<u8>, geometry: &Geometry) {
    match geometry {
        Geometry::Point(c) => {
            wkb_header(buf, WKB_POINT);
            write_coord(buf, c);
        }
        Geometry::LineString(coords) => {
            wkb_header(buf, WKB_LINESTRING);
            write_coords(buf, coords);
        }
        Geometry::Polygon(rings) => {
            wkb_header(buf, WKB_POLYGON);
            write_rings(buf, rings);
        }
        Geometry::MultiPoint(points) => {
            wkb_header(buf, WKB_MULTIPOINT);
            write_count(buf, points.len());
            for c in points {
                wkb_header(buf, WKB_POINT);
                write_coord(buf, c);
            }
        }
        Geometry::MultiLineString(lines) => {
            wkb_header(buf, WKB_MULTILINESTRING);
            write_count(buf, lines.len());
            for line in lines {
                wkb_header(buf, WKB_LINESTRING);
                write_coords(buf, line);
            }
        }
        Geometry::MultiPolygon(polygons) => {
            wkb_header(buf, WKB_MULTIPOLYGON);
            write_count(buf, polygons.len());
            for rings in polygons {
                wkb_header(buf, WKB_POLYGON);
                write_rings(buf, rings);
            }
        }
    }
}

fn wkb_header(buf: &mut Vec<u8>, kind: u32) {
    buf.push(1);
    buf.extend_from_slice(&kind.to_le_bytes());
}

fn write_count(buf: &mut Vec<u8>, n: usize) {
    buf.extend_from_slice(&(n as u32).to_le_bytes());
}

fn write_coord(buf: &mut Vec<u8>, c: &Coord) {
    buf.extend_from_slice(&c.x.to_le_bytes());
    buf.extend_from_slice(&c.y.to_le_bytes());
}

fn write_coords(buf: &mut Vec<u8>, coords: &[Coord]) {
    write_count(buf, coords.len());
    for c in coords {
        write_coord(buf, c);
    }
}

fn write_rings(buf: &mut Vec<u8>, rings: &[Vec<Coord>]) {
    write_count(buf, rings.len());
    for ring in rings {
        write_coords(buf, ring);
    }
}
