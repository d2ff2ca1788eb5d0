//! mid2gpkg CLI - конвертация MapInfo MID/MIF в GeoPackage

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mid2gpkg::config::Config;
use mid2gpkg::error::PipelineError;
use mid2gpkg::extract::{extract_files, list_archive, ArchiveExtractor, ArchiveHandle, SevenZipTool};
use mid2gpkg::pipeline::{BatchConverter, ConvertEvent, RunSummary};
use mid2gpkg::utils::{format_size, truncate_string};

#[derive(Parser)]
#[command(name = "mid2gpkg")]
#[command(author = "toolza")]
#[command(version = "1.0")]
#[command(about = "Конвертация MapInfo MID/MIF (в том числе из архивов) в GeoPackage", long_about = None)]
struct Cli {
    /// Путь к 7z (по умолчанию 7z или $SEVEN_ZIP)
    #[arg(long, global = true)]
    seven_zip: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Показать пары MID/MIF в архиве
    #[command(name = "list_files", visible_alias = "list-files")]
    ListFiles {
        /// Архив (7z, zip, tar, tar.gz)
        archive: PathBuf,
    },

    /// Распаковать один файл или весь архив
    #[command(name = "extract_files", visible_alias = "extract-files")]
    ExtractFiles {
        /// Архив
        archive: PathBuf,

        /// Файл внутри архива (по умолчанию - всё)
        filename: Option<String>,

        /// Куда распаковать (по умолчанию текущая папка)
        outdir: Option<PathBuf>,
    },

    /// Сконвертировать все пары из папки или архива
    #[command(name = "convert_to_gpkg", visible_alias = "convert-to-gpkg")]
    ConvertToGpkg {
        /// Папка или архив
        source: PathBuf,

        /// Папка для .gpkg
        #[arg(default_value = "./gpkgs")]
        outdir: PathBuf,

        /// Путь к отчёту
        #[arg(long, default_value = "report.csv")]
        report: PathBuf,

        /// Временная папка распаковки (по умолчанию создаётся в текущей)
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(seven_zip) = cli.seven_zip {
        config.seven_zip = seven_zip;
    }

    match cli.command {
        Commands::ListFiles { archive } => list_files(&config, archive),
        Commands::ExtractFiles {
            archive,
            filename,
            outdir,
        } => extract(&config, archive, filename, outdir),
        Commands::ConvertToGpkg {
            source,
            outdir,
            report,
            work_dir,
        } => {
            config.output_dir = outdir;
            config.report_path = report;
            config.work_dir = work_dir;
            convert(config, source)
        }
    }
}

fn list_files(config: &Config, archive: PathBuf) -> anyhow::Result<()> {
    let handle = ArchiveHandle::open(&archive, config.password.as_deref())?;
    let lists = list_archive(&handle)?;
    let pairs = lists.pair();

    println!();
    println!(
        "📦 {} ({}): MID {}, MIF {}, пар {}",
        archive.display(),
        handle.kind().name(),
        lists.attribute.len(),
        lists.geometry.len(),
        pairs.len()
    );
    for pair in &pairs {
        println!("   {}  <->  {}", pair.attribute_path, pair.geometry_path);
    }
    Ok(())
}

fn extract(
    config: &Config,
    archive: PathBuf,
    filename: Option<String>,
    outdir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let handle = ArchiveHandle::open(&archive, config.password.as_deref())?;
    let outdir = outdir.unwrap_or_else(|| PathBuf::from("."));
    let tool = ArchiveExtractor::new(SevenZipTool::new(&config.seven_zip, config.password.clone()));

    extract_files(&tool, &handle, filename.as_deref(), &outdir)?;

    println!("✅ Распаковано в {}", outdir.display());
    Ok(())
}

fn convert(config: Config, source: PathBuf) -> anyhow::Result<()> {
    if !source.exists() {
        bail!("{} не существует", source.display());
    }

    let (tx, rx) = mpsc::channel();
    let mut converter = BatchConverter::from_config(config).with_events(tx);

    // Конвертация идёт в отдельном потоке, здесь только прогресс
    let worker = thread::spawn(move || converter.convert_source(&source));

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for event in rx {
        match event {
            ConvertEvent::Started(total) => bar.set_length(total as u64),
            ConvertEvent::PairStarted(index, name) => {
                bar.set_position(index as u64);
                bar.set_message(truncate_string(&name, 40));
            }
            ConvertEvent::Extracted(_) => {}
            ConvertEvent::Converted(name, features, attributes) => {
                bar.println(format!("✅ {}: {} объектов, {} атрибутов", name, features, attributes));
                bar.inc(1);
            }
            ConvertEvent::ConversionFailed(name, err) => {
                bar.println(format!("❌ {}: {}", name, err));
                bar.inc(1);
            }
            ConvertEvent::Skipped(name, reason) => {
                bar.println(format!("⏭️ {}: {}", name, reason));
                bar.inc(1);
            }
            ConvertEvent::Finished(_) => bar.finish_and_clear(),
        }
    }
    bar.finish_and_clear();

    let result: Result<RunSummary, PipelineError> = match worker.join() {
        Ok(result) => result,
        Err(_) => bail!("поток конвертации аварийно завершился"),
    };
    let summary = result.context("конвертация прервана, отчёт не записан")?;

    let report_size = std::fs::metadata(&summary.report_path)
        .map(|m| m.len())
        .unwrap_or(0);
    println!();
    println!(
        "🎉 Пар: {}, сконвертировано: {}, с ошибками: {}, пропущено: {}",
        summary.pairs, summary.converted, summary.failed, summary.skipped
    );
    println!("📄 Отчёт: {} ({})", summary.report_path.display(), format_size(report_size));
    Ok(())
}
