//! Чтение MID: атрибуты, одна строка на объект MIF

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use encoding_rs::Encoding;

use super::dataset::{ColumnType, Value};
use super::mif::MifHeader;
use crate::error::MapInfoError;

/// Прочитать MID с диска
pub fn read_mid(path: &Path, header: &MifHeader) -> Result<Vec<Vec<Value>>, MapInfoError> {
    let file = File::open(path)?;
    parse_mid(BufReader::new(file), header)
}

/// Разобрать записи MID по схеме из заголовка MIF
///
/// Одна физическая строка - одна запись. Пустая строка - запись из
/// одного пустого поля (NULL или пустой текст в единственной колонке).
pub fn parse_mid<R: Read>(mut reader: R, header: &MifHeader) -> Result<Vec<Vec<Value>>, MapInfoError> {
    let encoding = header.encoding();
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let mut lines: Vec<&[u8]> = data.split(|&b| b == b'\n').collect();
    // После завершающего перевода строки записи нет
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut rows = Vec::with_capacity(lines.len());
    for (index, line) in lines.into_iter().enumerate() {
        let row_no = index + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let record = split_record(line, header.delimiter)?;

        if record.len() != header.columns.len() {
            return Err(MapInfoError::Attributes {
                row: row_no,
                message: format!(
                    "ожидалось {} полей, найдено {}",
                    header.columns.len(),
                    record.len()
                ),
            });
        }

        let row = record
            .iter()
            .zip(&header.columns)
            .map(|(raw, column)| decode_field(raw, column.kind, encoding, row_no, &column.name))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    Ok(rows)
}

/// Поля одной строки с учётом кавычек
fn split_record(line: &[u8], delimiter: u8) -> Result<csv::ByteRecord, MapInfoError> {
    let mut record = csv::ByteRecord::new();
    if line.is_empty() {
        record.push_field(b"");
        return Ok(record);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line);
    reader.read_byte_record(&mut record)?;
    Ok(record)
}

/// Декодировать текст; None - байты не соответствуют кодировке
fn decode_text(raw: &[u8], encoding: Option<&'static Encoding>) -> Option<String> {
    match encoding {
        Some(encoding) => encoding
            .decode_without_bom_handling_and_without_replacement(raw)
            .map(|s| s.into_owned()),
        None => std::str::from_utf8(raw).ok().map(str::to_string),
    }
}

fn decode_field(
    raw: &[u8],
    kind: ColumnType,
    encoding: Option<&'static Encoding>,
    row: usize,
    column: &str,
) -> Result<Value, MapInfoError> {
    let Some(text) = decode_text(raw, encoding) else {
        // Так и остаётся байтами - см. нормализацию колонок при конвертации
        return Ok(Value::Bytes(raw.to_vec()));
    };

    let invalid = |text: &str| MapInfoError::Attributes {
        row,
        message: format!("{}: некорректное значение {:?}", column, text),
    };

    if kind == ColumnType::Text {
        return Ok(Value::Text(text));
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    let value = match kind {
        ColumnType::Integer => Value::Integer(trimmed.parse().map_err(|_| invalid(trimmed))?),
        ColumnType::Real => Value::Real(trimmed.parse().map_err(|_| invalid(trimmed))?),
        ColumnType::Boolean => match trimmed {
            "T" | "t" | "1" => Value::Boolean(true),
            "F" | "f" | "0" => Value::Boolean(false),
            other => return Err(invalid(other)),
        },
        ColumnType::Date => Value::Text(iso_date(trimmed)),
        ColumnType::DateTime | ColumnType::Text => Value::Text(trimmed.to_string()),
    };

    Ok(value)
}

/// YYYYMMDD -> YYYY-MM-DD, остальное как есть
fn iso_date(value: &str) -> String {
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &value[..4], &value[4..6], &value[6..])
    } else {
        value.to_string()
    }
}
