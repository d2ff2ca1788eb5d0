//! Поиск пар MID/MIF
//!
//! MID хранит атрибуты, MIF - геометрию и схему. Пара собирается по общему
//! имени файла без расширения; MID без MIF молча пропускается.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Расширение файла атрибутов
pub const ATTRIBUTE_EXT: &str = "mid";
/// Расширение файла геометрии
pub const GEOMETRY_EXT: &str = "mif";

/// Роль файла в паре
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Attribute,
    Geometry,
}

impl FileRole {
    /// Определить роль по расширению (без учёта регистра)
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = split_extension(name);
        let ext = ext?;
        if ext.eq_ignore_ascii_case(ATTRIBUTE_EXT) {
            Some(Self::Attribute)
        } else if ext.eq_ignore_ascii_case(GEOMETRY_EXT) {
            Some(Self::Geometry)
        } else {
            None
        }
    }
}

/// Списки MID и MIF файлов в исходном порядке
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleLists {
    pub attribute: Vec<String>,
    pub geometry: Vec<String>,
}

impl RoleLists {
    /// Разложить имена по ролям, остальные файлы игнорируются
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lists = Self::default();
        for name in names {
            let name = name.into();
            match FileRole::from_name(&name) {
                Some(FileRole::Attribute) => lists.attribute.push(name),
                Some(FileRole::Geometry) => lists.geometry.push(name),
                None => {}
            }
        }
        lists
    }

    /// Собрать пары
    pub fn pair(&self) -> Vec<CandidatePair> {
        pair_files(&self.attribute, &self.geometry)
    }
}

/// Пара файлов-кандидатов на конвертацию
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePair {
    /// Путь без расширения (внутри архива или на диске)
    pub base_name: String,
    pub attribute_path: String,
    pub geometry_path: String,
}

impl CandidatePair {
    /// Имя файла без папок и расширения
    pub fn stem(&self) -> &str {
        let sep = self.base_name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
        &self.base_name[sep..]
    }

    /// Имя папки, в которой лежит пара (пусто, если папки нет)
    pub fn container(&self) -> &str {
        let Some(end) = self.base_name.rfind(['/', '\\']) else {
            return "";
        };
        let parent = &self.base_name[..end];
        let start = parent.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
        &parent[start..]
    }

    /// Первая компонента пути (верхняя папка, куда распакуется пара)
    pub fn top_level_dir(&self) -> Option<&str> {
        let end = self.base_name.find(['/', '\\'])?;
        let top = &self.base_name[..end];
        (!top.is_empty()).then_some(top)
    }

    /// Пути к файлам пары относительно корня
    pub fn resolve(&self, root: &Path) -> (PathBuf, PathBuf) {
        (root.join(&self.attribute_path), root.join(&self.geometry_path))
    }
}

/// Имя без расширения и само расширение
///
/// Точка в имени папки расширением не считается.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    let file_start = name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    match name[file_start..].rfind('.') {
        Some(0) | None => (name, None),
        Some(dot) => {
            let dot = file_start + dot;
            (&name[..dot], Some(&name[dot + 1..]))
        }
    }
}

/// Сопоставить MID и MIF по общему имени
///
/// Для каждого MID берётся первый MIF с тем же именем без расширения.
/// Порядок пар совпадает с порядком MID.
pub fn pair_files(attribute: &[String], geometry: &[String]) -> Vec<CandidatePair> {
    let mut pairs = Vec::with_capacity(attribute.len());

    for mid in attribute {
        let (base, _) = split_extension(mid);
        let mif = geometry
            .iter()
            .find(|mif| mif.contains(base) && split_extension(mif).0 == base);

        match mif {
            Some(mif) => pairs.push(CandidatePair {
                base_name: base.to_string(),
                attribute_path: mid.clone(),
                geometry_path: mif.clone(),
            }),
            None => log::debug!("{}: нет парного MIF, пропускаем", mid),
        }
    }

    pairs
}

/// Рекурсивно собрать MID и MIF файлы из папки
pub fn scan_directory(dir: &Path) -> std::io::Result<RoleLists> {
    let mut names = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_file() {
            names.push(entry.path().to_string_lossy().into_owned());
        }
    }

    Ok(RoleLists::from_names(names))
}
