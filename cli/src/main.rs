use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use monster_import_core::file_utils::{find_files_with_extension, read_text_file};
use monster_import_core::{
    ImportConfig, InMemorySpellIndex, MonsterParser, ParseResults, SpellIndex, UnavailableSpellIndex,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "monster-import",
    version = "0.1.0",
    about = "Import creature-builder stat blocks as PF2e actor data",
    long_about = None
)]
struct Cli {
    /// Path to log file
    #[arg(long, global = true, default_value = "/tmp/monster-import.log")]
    log_file: PathBuf,

    /// Verbosity level (repeat for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML file overriding parser settings and vocabularies
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON file of canonical spell records used to resolve spell lists
    #[arg(long, global = true)]
    spells: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one stat block
    Import {
        /// Stat block exported by the creature builder
        #[arg(long)]
        input: PathBuf,
        /// Where to write the result (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import every stat block in a directory
    ImportDir {
        /// Directory containing .json stat blocks
        #[arg(long)]
        input_dir: PathBuf,
        /// Directory for the results, one file per stat block
        #[arg(long)]
        output_dir: PathBuf,
        /// Only import files whose name matches this glob pattern
        #[arg(long)]
        pattern: Option<String>,
        /// Quiet mode (0=show messages/warnings, 1=suppress messages, 2=suppress both)
        #[arg(long, default_value_t = 0)]
        quiet: u8,
    },

    /// Rewrite description text into inline markup
    Markup {
        /// Text to rewrite (read from stdin when omitted)
        #[arg(long)]
        text: Option<String>,
    },

    /// Print the default configuration as TOML
    Vocabulary,
}

fn setup_logging(verbose: u8, log_file: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter_level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter_level.into());

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(Path::new(".")),
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("monster-import.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(fmt::Layer::new().with_writer(non_blocking).with_ansi(false));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<ImportConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            ImportConfig::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => Ok(ImportConfig::default()),
    }
}

fn write_results(results: &ParseResults, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(results)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {:?}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

async fn import_file<I: SpellIndex>(
    parser: &MonsterParser,
    index: &I,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {:?}", input);
    }
    let content = read_text_file(input)?;
    let results = parser
        .parse(&content, index)
        .await
        .with_context(|| format!("Failed to import {:?}", input))?;

    for notification in &results.diagnostics.notifications {
        tracing::warn!("{}", notification);
    }
    write_results(&results, output)
}

fn import_dir<I: SpellIndex + Sync>(
    parser: &MonsterParser,
    index: &I,
    input_dir: &Path,
    output_dir: &Path,
    pattern: Option<&str>,
    quiet: u8,
) -> Result<()> {
    let files = find_files_with_extension(input_dir, "json", pattern)?;
    if quiet == 0 {
        info!("Found {} stat blocks in {:?}", files.len(), input_dir);
    }
    std::fs::create_dir_all(output_dir)?;

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta}")?
            .progress_chars("=>-"),
    );

    let failures = AtomicUsize::new(0);
    files.par_iter().for_each(|path| {
        let result = read_text_file(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| {
                futures::executor::block_on(parser.parse(&content, index)).map_err(anyhow::Error::from)
            })
            .and_then(|results| {
                let file_name = path.file_name().unwrap_or(std::ffi::OsStr::new("creature.json"));
                write_results(&results, Some(&output_dir.join(file_name)))
            });

        if let Err(e) = result {
            failures.fetch_add(1, Ordering::Relaxed);
            if quiet < 2 {
                tracing::warn!("Failed to import {:?}: {}", path, e);
            }
        }
        progress.inc(1);
    });
    progress.finish_and_clear();

    let failures = failures.into_inner();
    if quiet == 0 {
        info!("Imported {} of {} stat blocks", files.len() - failures, files.len());
    }
    if failures > 0 && quiet < 2 {
        tracing::warn!("{} stat blocks failed to import", failures);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = setup_logging(cli.verbose, &cli.log_file)?;

    info!("Starting monster-import CLI");

    match cli.command {
        Commands::Import { input, output } => {
            let parser = MonsterParser::new(load_config(cli.config.as_deref())?);
            match &cli.spells {
                Some(spells) => {
                    let index = InMemorySpellIndex::from_file(spells)?;
                    import_file(&parser, &index, &input, output.as_deref()).await?;
                }
                None => {
                    let index = UnavailableSpellIndex::new("no --spells file given");
                    import_file(&parser, &index, &input, output.as_deref()).await?;
                }
            }
        }
        Commands::ImportDir {
            input_dir,
            output_dir,
            pattern,
            quiet,
        } => {
            let parser = MonsterParser::new(load_config(cli.config.as_deref())?);
            match &cli.spells {
                Some(spells) => {
                    let index = InMemorySpellIndex::from_file(spells)?;
                    import_dir(&parser, &index, &input_dir, &output_dir, pattern.as_deref(), quiet)?;
                }
                None => {
                    let index = UnavailableSpellIndex::new("no --spells file given");
                    import_dir(&parser, &index, &input_dir, &output_dir, pattern.as_deref(), quiet)?;
                }
            }
        }
        Commands::Markup { text } => {
            let config = load_config(cli.config.as_deref())?;
            let text = match text {
                Some(text) => text,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let parser = MonsterParser::new(config);
            println!("{}", parser.markup().transform(&text));
        }
        Commands::Vocabulary => {
            let rendered = ImportConfig::default()
                .to_toml()
                .map_err(|e| anyhow::anyhow!("Failed to render config: {}", e))?;
            print!("{}", rendered);
        }
    }

    info!("monster-import CLI finished");
    Ok(())
}
