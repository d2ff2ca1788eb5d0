//! Чтение MIF: заголовок, схема и геометрия

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;

use super::dataset::{ColumnType, Coord, Geometry, Ring};
use crate::error::MapInfoError;

/// Разделитель MID по умолчанию
pub const DEFAULT_DELIMITER: u8 = b'\t';

/// Описание колонки из секции Columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnType,
}

/// Заголовок MIF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MifHeader {
    pub version: Option<String>,
    pub charset: Option<String>,
    pub delimiter: u8,
    pub coord_sys: Option<String>,
    pub columns: Vec<ColumnDef>,
}

impl Default for MifHeader {
    fn default() -> Self {
        Self {
            version: None,
            charset: None,
            delimiter: DEFAULT_DELIMITER,
            coord_sys: None,
            columns: Vec::new(),
        }
    }
}

impl MifHeader {
    /// Кодировка текста по Charset (None - строгий UTF-8)
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.charset.as_deref().and_then(encoding_for_charset)
    }
}

/// Прочитанный MIF
#[derive(Debug, Clone, PartialEq)]
pub struct MifFile {
    pub header: MifHeader,
    pub geometries: Vec<Option<Geometry>>,
}

/// Кодировка по имени Charset из MapInfo
pub fn encoding_for_charset(name: &str) -> Option<&'static Encoding> {
    let encoding = match name.to_ascii_lowercase().as_str() {
        "neutral" => return None,
        "windowslatin1" | "iso8859_1" => encoding_rs::WINDOWS_1252,
        "windowslatin2" => encoding_rs::WINDOWS_1250,
        "windowscyrillic" => encoding_rs::WINDOWS_1251,
        "windowsgreek" => encoding_rs::WINDOWS_1253,
        "windowsturkish" => encoding_rs::WINDOWS_1254,
        "windowshebrew" => encoding_rs::WINDOWS_1255,
        "windowsarabic" => encoding_rs::WINDOWS_1256,
        "windowsbalticrim" => encoding_rs::WINDOWS_1257,
        "windowsvietnamese" => encoding_rs::WINDOWS_1258,
        "windowsthai" => encoding_rs::WINDOWS_874,
        "windowsjapanese" => encoding_rs::SHIFT_JIS,
        "windowssimpchinese" => encoding_rs::GBK,
        "windowstradchinese" | "windowsbig5" => encoding_rs::BIG5,
        "windowskorean" => encoding_rs::EUC_KR,
        "utf-8" | "utf8" => encoding_rs::UTF_8,
        other => return Encoding::for_label(other.as_bytes()),
    };
    Some(encoding)
}

/// Прочитать MIF с диска
pub fn read_mif(path: &Path) -> Result<MifFile, MapInfoError> {
    let bytes = fs::read(path)?;

    // Charset нужен до декодирования - ищем его в ASCII-проекции
    let charset = find_charset(&String::from_utf8_lossy(&bytes));
    let text = match charset.as_deref().and_then(encoding_for_charset) {
        Some(encoding) => encoding.decode_without_bom_handling(&bytes).0.into_owned(),
        None => String::from_utf8_lossy(&bytes).into_owned(),
    };

    parse_mif(&text)
}

fn find_charset(text: &str) -> Option<String> {
    text.lines()
        .take_while(|line| !line.trim().eq_ignore_ascii_case("data"))
        .find_map(|line| {
            let (keyword, rest) = split_keyword(line.trim());
            keyword
                .eq_ignore_ascii_case("charset")
                .then(|| unquote(rest).to_string())
        })
}

/// Разобрать текст MIF
pub fn parse_mif(text: &str) -> Result<MifFile, MapInfoError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut header = MifHeader::default();
    let mut index = 0;
    let mut data_start = None;

    while index < lines.len() {
        let line = lines[index].trim();
        index += 1;
        if line.is_empty() {
            continue;
        }

        let (keyword, rest) = split_keyword(line);
        match keyword.to_ascii_lowercase().as_str() {
            "version" => header.version = Some(rest.to_string()),
            "charset" => header.charset = Some(unquote(rest).to_string()),
            "delimiter" => {
                header.delimiter = *unquote(rest).as_bytes().first().ok_or_else(|| {
                    MapInfoError::Header {
                        line: index,
                        message: "пустой Delimiter".to_string(),
                    }
                })?;
            }
            "coordsys" => header.coord_sys = Some(rest.to_string()),
            "columns" => {
                let count: usize = rest.parse().map_err(|_| MapInfoError::Header {
                    line: index,
                    message: format!("некорректное число колонок: {}", rest),
                })?;
                while header.columns.len() < count {
                    let Some(column_line) = lines.get(index) else {
                        return Err(MapInfoError::Header {
                            line: index,
                            message: format!(
                                "ожидалось {} колонок, найдено {}",
                                count,
                                header.columns.len()
                            ),
                        });
                    };
                    index += 1;
                    if column_line.trim().is_empty() {
                        continue;
                    }
                    header.columns.push(parse_column(column_line, index)?);
                }
            }
            "data" => {
                data_start = Some(index);
                break;
            }
            // Unique, Index, Transform и прочее на результат не влияют
            _ => log::debug!("MIF: пропущена строка заголовка {}: {}", index, line),
        }
    }

    let data_start = data_start.ok_or_else(|| MapInfoError::Header {
        line: lines.len(),
        message: "нет секции Data".to_string(),
    })?;

    let geometries = parse_objects(&lines[data_start..])?;
    Ok(MifFile { header, geometries })
}

fn split_keyword(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_column(line: &str, line_no: usize) -> Result<ColumnDef, MapInfoError> {
    let (name, kind) = split_keyword(line.trim());
    if kind.is_empty() {
        return Err(MapInfoError::Header {
            line: line_no,
            message: format!("у колонки {} нет типа", name),
        });
    }

    let type_name = kind
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let kind = match type_name.as_str() {
        "char" => ColumnType::Text,
        "integer" | "smallint" | "largeint" => ColumnType::Integer,
        "float" | "decimal" => ColumnType::Real,
        "logical" => ColumnType::Boolean,
        "date" => ColumnType::Date,
        "datetime" | "time" => ColumnType::DateTime,
        other => {
            return Err(MapInfoError::Header {
                line: line_no,
                message: format!("неизвестный тип колонки {}: {}", name, other),
            })
        }
    };

    Ok(ColumnDef {
        name: unquote(name).to_string(),
        kind,
    })
}

/// Ключевые слова графических объектов
const OBJECT_KEYWORDS: &[&str] = &[
    "none",
    "point",
    "line",
    "pline",
    "region",
    "rect",
    "roundrect",
    "multipoint",
    "ellipse",
    "arc",
    "text",
    "collection",
];

/// Поток токенов секции Data
struct Tokens<'a> {
    items: Vec<&'a str>,
    pos: usize,
    /// Номер текущего объекта (с 1) для сообщений об ошибках
    feature: usize,
}

impl<'a> Tokens<'a> {
    fn new(lines: &[&'a str]) -> Self {
        Self {
            items: lines.iter().flat_map(|l| l.split_whitespace()).collect(),
            pos: 0,
            feature: 0,
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        let item = self.items.get(self.pos).copied();
        self.pos += 1;
        item
    }

    fn peek(&self) -> Option<&'a str> {
        self.items.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> MapInfoError {
        MapInfoError::Geometry {
            feature: self.feature,
            message: message.into(),
        }
    }

    fn number(&mut self) -> Result<f64, MapInfoError> {
        let token = self.next().ok_or_else(|| self.error("неожиданный конец файла"))?;
        token
            .parse()
            .map_err(|_| self.error(format!("ожидалось число, найдено {}", token)))
    }

    fn count(&mut self) -> Result<usize, MapInfoError> {
        let token = self.next().ok_or_else(|| self.error("неожиданный конец файла"))?;
        token
            .parse()
            .map_err(|_| self.error(format!("ожидалось количество, найдено {}", token)))
    }

    fn coord(&mut self) -> Result<Coord, MapInfoError> {
        Ok(Coord::new(self.number()?, self.number()?))
    }

    fn coords(&mut self, n: usize) -> Result<Vec<Coord>, MapInfoError> {
        (0..n).map(|_| self.coord()).collect()
    }
}

fn parse_objects(lines: &[&str]) -> Result<Vec<Option<Geometry>>, MapInfoError> {
    let mut tokens = Tokens::new(lines);
    let mut geometries = Vec::new();

    while let Some(token) = tokens.next() {
        let keyword = token.to_ascii_lowercase();
        if !OBJECT_KEYWORDS.contains(&keyword.as_str()) {
            // Pen, Brush, Symbol, Smooth, Center и их аргументы
            continue;
        }

        tokens.feature = geometries.len() + 1;
        let geometry = match keyword.as_str() {
            "none" => None,
            "point" => Some(Geometry::Point(tokens.coord()?)),
            "line" => Some(Geometry::LineString(tokens.coords(2)?)),
            "pline" => Some(parse_pline(&mut tokens)?),
            "region" => {
                let rings = tokens.count()?;
                let rings = (0..rings)
                    .map(|_| {
                        let n = tokens.count()?;
                        tokens.coords(n)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(build_region(rings).ok_or_else(|| tokens.error("пустой Region"))?)
            }
            "rect" | "roundrect" => {
                let a = tokens.coord()?;
                let b = tokens.coord()?;
                if keyword == "roundrect" {
                    tokens.number()?;
                }
                Some(Geometry::Polygon(vec![rect_ring(a, b)]))
            }
            "multipoint" => {
                let n = tokens.count()?;
                Some(Geometry::MultiPoint(tokens.coords(n)?))
            }
            other => return Err(tokens.error(format!("объект {} не поддерживается", other))),
        };
        geometries.push(geometry);
    }

    Ok(geometries)
}

fn parse_pline(tokens: &mut Tokens<'_>) -> Result<Geometry, MapInfoError> {
    let multiple = tokens
        .peek()
        .is_some_and(|t| t.eq_ignore_ascii_case("multiple"));

    if !multiple {
        let n = tokens.count()?;
        return Ok(Geometry::LineString(tokens.coords(n)?));
    }

    tokens.next();
    let sections = tokens.count()?;
    let lines = (0..sections)
        .map(|_| {
            let n = tokens.count()?;
            tokens.coords(n)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Geometry::MultiLineString(lines))
}

fn rect_ring(a: Coord, b: Coord) -> Ring {
    vec![
        Coord::new(a.x, a.y),
        Coord::new(b.x, a.y),
        Coord::new(b.x, b.y),
        Coord::new(a.x, b.y),
        Coord::new(a.x, a.y),
    ]
}

/// Собрать полигоны из колец Region
///
/// Кольцо внутри уже найденного внешнего кольца становится дырой,
/// остальные - новыми полигонами.
fn build_region(rings: Vec<Ring>) -> Option<Geometry> {
    let mut polygons: Vec<Vec<Ring>> = Vec::new();

    for mut ring in rings.into_iter().filter(|r| !r.is_empty()) {
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        let first = ring[0];
        match polygons
            .iter_mut()
            .find(|polygon| point_in_ring(first, &polygon[0]))
        {
            Some(polygon) => polygon.push(ring),
            None => polygons.push(vec![ring]),
        }
    }

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(polygons)),
    }
}

/// Чётно-нечётное правило
fn point_in_ring(p: Coord, ring: &[Coord]) -> bool {
    let mut inside = false;
    let mut j = ring.len().saturating_sub(1);
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Version 300\nCharset \"WindowsLatin1\"\nDelimiter \",\"\nCoordSys Earth Projection 1, 104\nColumns 3\n  ID Integer\n  NAME Char(20)\n  AREA Decimal(10, 2)\nData\n";

    // === Тесты заголовка ===

    #[test]
    fn test_parse_header() {
        let mif = parse_mif(HEADER).unwrap();

        assert_eq!(mif.header.version.as_deref(), Some("300"));
        assert_eq!(mif.header.charset.as_deref(), Some("WindowsLatin1"));
        assert_eq!(mif.header.delimiter, b',');
        assert_eq!(mif.header.coord_sys.as_deref(), Some("Earth Projection 1, 104"));
        assert_eq!(
            mif.header.columns,
            vec![
                ColumnDef { name: "ID".to_string(), kind: ColumnType::Integer },
                ColumnDef { name: "NAME".to_string(), kind: ColumnType::Text },
                ColumnDef { name: "AREA".to_string(), kind: ColumnType::Real },
            ]
        );
        assert!(mif.geometries.is_empty());
    }

    #[test]
    fn test_default_delimiter_is_tab() {
        let mif = parse_mif("Version 300\nColumns 1\n  ID Integer\nData\nnone\n").unwrap();
        assert_eq!(mif.header.delimiter, b'\t');
        assert_eq!(mif.geometries, vec![None]);
    }

    #[test]
    fn test_missing_data_section() {
        let err = parse_mif("Version 300\nColumns 1\n  ID Integer\n").unwrap_err();
        assert!(matches!(err, MapInfoError::Header { .. }));
    }

    #[test]
    fn test_unknown_column_type() {
        let err = parse_mif("Columns 1\n  ID Blob\nData\n").unwrap_err();
        assert!(matches!(err, MapInfoError::Header { line: 2, .. }));
    }

    #[test]
    fn test_datetime_is_not_date() {
        let mif = parse_mif("Columns 2\n  D Date\n  T DateTime\nData\n").unwrap();
        assert_eq!(mif.header.columns[0].kind, ColumnType::Date);
        assert_eq!(mif.header.columns[1].kind, ColumnType::DateTime);
    }

    // === Тесты геометрии ===

    #[test]
    fn test_parse_objects_with_styles() {
        let text = format!(
            "{}Point 1.5 2.5\n    Symbol (35,0,12)\nLine 0 0 1 1\n    Pen (1,2,0)\nPline 3\n0 0\n1 1\n2 0\n    Pen (1,2,0)\n    Smooth\nnone\n",
            HEADER
        );
        let mif = parse_mif(&text).unwrap();

        assert_eq!(mif.geometries.len(), 4);
        assert_eq!(mif.geometries[0], Some(Geometry::Point(Coord::new(1.5, 2.5))));
        assert!(matches!(&mif.geometries[1], Some(Geometry::LineString(c)) if c.len() == 2));
        assert!(matches!(&mif.geometries[2], Some(Geometry::LineString(c)) if c.len() == 3));
        assert_eq!(mif.geometries[3], None);
    }

    #[test]
    fn test_parse_pline_multiple() {
        let text = format!("{}Pline Multiple 2\n  2\n0 0\n1 1\n  3\n5 5\n6 6\n7 5\n", HEADER);
        let mif = parse_mif(&text).unwrap();

        match &mif.geometries[0] {
            Some(Geometry::MultiLineString(lines)) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[1].len(), 3);
            }
            other => panic!("unexpected geometry: {:?}", other),
        }
    }

    #[test]
    fn test_region_with_hole() {
        let text = format!(
            "{}Region 2\n  4\n0 0\n10 0\n10 10\n0 10\n  4\n2 2\n4 2\n4 4\n2 4\n    Brush (2,16777215,16777215)\n    Center 5 5\n",
            HEADER
        );
        let mif = parse_mif(&text).unwrap();

        match &mif.geometries[0] {
            Some(Geometry::Polygon(rings)) => {
                assert_eq!(rings.len(), 2);
                // Кольца замкнуты
                assert_eq!(rings[0].first(), rings[0].last());
                assert_eq!(rings[0].len(), 5);
            }
            other => panic!("unexpected geometry: {:?}", other),
        }
    }

    #[test]
    fn test_region_disjoint_rings_is_multipolygon() {
        let text = format!(
            "{}Region 2\n 4\n0 0\n1 0\n1 1\n0 1\n 4\n5 5\n6 5\n6 6\n5 6\n",
            HEADER
        );
        let mif = parse_mif(&text).unwrap();

        assert!(matches!(&mif.geometries[0], Some(Geometry::MultiPolygon(p)) if p.len() == 2));
    }

    #[test]
    fn test_rect_and_multipoint() {
        let text = format!("{}Rect 0 0 2 1\nMultiPoint 2\n1 1\n2 2\n", HEADER);
        let mif = parse_mif(&text).unwrap();

        assert!(matches!(&mif.geometries[0], Some(Geometry::Polygon(r)) if r[0].len() == 5));
        assert!(matches!(&mif.geometries[1], Some(Geometry::MultiPoint(p)) if p.len() == 2));
    }

    #[test]
    fn test_unsupported_object() {
        let text = format!("{}Point 0 0\nEllipse 0 0 1 1\n", HEADER);
        let err = parse_mif(&text).unwrap_err();
        assert!(matches!(err, MapInfoError::Geometry { feature: 2, .. }));
    }

    #[test]
    fn test_truncated_coordinates() {
        let text = format!("{}Pline 3\n0 0\n1 1\n", HEADER);
        let err = parse_mif(&text).unwrap_err();
        assert!(matches!(err, MapInfoError::Geometry { feature: 1, .. }));
    }

    // === Тесты кодировок ===

    #[test]
    fn test_encoding_for_charset() {
        assert_eq!(encoding_for_charset("WindowsLatin1"), Some(encoding_rs::WINDOWS_1252));
        assert_eq!(encoding_for_charset("WindowsCyrillic"), Some(encoding_rs::WINDOWS_1251));
        assert_eq!(encoding_for_charset("Neutral"), None);
        assert_eq!(encoding_for_charset("NoSuchCharset"), None);
    }
}
