//! mid2gpkg - пакетная конвертация MapInfo MID/MIF в GeoPackage
//!
//! Файлы берутся из папки или из архива (в том числе запароленного),
//! по итогам прогона пишется report.csv.
//!
//! # Модули
//! - `extract` - список файлов архива, распаковка (7z или tar), уборка
//! - `pairing` - сопоставление MID и MIF
//! - `mapinfo` - чтение MID/MIF и запись GeoPackage
//! - `convert` - конвертация одной пары
//! - `report` - отчёт о конвертации
//! - `pipeline` - пакетный прогон
//! - `config` - настройки
//! - `error` - типы ошибок
//! - `utils` - вспомогательные функции

pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod mapinfo;
pub mod pairing;
pub mod pipeline;
pub mod report;
pub mod utils;
