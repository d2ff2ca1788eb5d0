//! Таблица объектов в памяти: геометрия + атрибуты

/// Точка
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Кольцо или линия
pub type Ring = Vec<Coord>;

/// Геометрия объекта
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    /// Внешнее кольцо + дыры
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Имя типа для gpkg_geometry_columns
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "POINT",
            Self::MultiPoint(_) => "MULTIPOINT",
            Self::LineString(_) => "LINESTRING",
            Self::MultiLineString(_) => "MULTILINESTRING",
            Self::Polygon(_) => "POLYGON",
            Self::MultiPolygon(_) => "MULTIPOLYGON",
        }
    }

    /// Все вершины
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Self::Point(c) => Box::new(std::iter::once(c)),
            Self::MultiPoint(cs) | Self::LineString(cs) => Box::new(cs.iter()),
            Self::MultiLineString(lines) | Self::Polygon(lines) => Box::new(lines.iter().flatten()),
            Self::MultiPolygon(polys) => Box::new(polys.iter().flatten().flatten()),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_coords(self.coords())
    }
}

/// Охватывающий прямоугольник
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_coords<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Option<Self> {
        coords.into_iter().fold(None, |acc, c| {
            let point = Self {
                min_x: c.x,
                min_y: c.y,
                max_x: c.x,
                max_y: c.y,
            };
            Some(match acc {
                Some(b) => b.union(&point),
                None => point,
            })
        })
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Тип колонки атрибутов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    /// ISO дата YYYY-MM-DD
    Date,
    /// Дата/время как есть
    DateTime,
}

/// Значение атрибута
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
    /// Строка, которую не удалось декодировать
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// Текстовое представление (Null остаётся Null)
    pub fn into_text(self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Integer(i) => Self::Text(i.to_string()),
            Self::Real(f) => Self::Text(f.to_string()),
            Self::Boolean(b) => Self::Text(b.to_string()),
            Self::Text(s) => Self::Text(s),
            Self::Bytes(b) => Self::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

/// Колонка атрибутов
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub values: Vec<Value>,
}

/// Слой: одна колонка геометрии и колонки атрибутов одинаковой длины
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Имя слоя (имя файла без расширения)
    pub name: String,
    /// Строка CoordSys из MIF как есть
    pub coord_sys: Option<String>,
    /// None - объект без геометрии
    pub geometries: Vec<Option<Geometry>>,
    pub columns: Vec<Column>,
}

impl Dataset {
    /// Количество объектов
    pub fn feature_count(&self) -> usize {
        self.geometries.len()
    }

    /// Количество атрибутов (без геометрии)
    pub fn attribute_count(&self) -> usize {
        self.columns.len()
    }

    /// Охват всех геометрий
    pub fn bounds(&self) -> Option<Bounds> {
        self.geometries
            .iter()
            .flatten()
            .filter_map(Geometry::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// Значения одной строки
    pub fn row(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(move |c| &c.values[index])
    }
}
