use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use stencil_studio::core::{
    AppSettings, ConfigManagerOperations, CoreConfigManager, CoreFileSystemScanner,
    CoreStencilStore, EditingSession, FileKind, FileSystemScannerOperations, SaveRequest, Serial,
    StencilSettings, StencilStoreOperations, compare_versions, diagnostics::sort_by_location,
    models::MAIN_CONFIG_PATH,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

const APP_NAME: &str = "StencilStudio";
const LOG_LEVEL_ENV: &str = "STENCIL_STUDIO_LOG";
const DEFAULT_AUTHOR: &str = "unknown";

#[derive(Parser, Debug)]
#[command(
    name = "stencil_studio",
    about = "Lint, import and inspect stencil bundles",
    version
)]
struct Cli {
    /// Root directory of the stencil store (defaults to the configured location)
    #[arg(long, value_name = "DIR", global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lint the templates and the main configuration of a bundle directory
    Lint {
        dir: PathBuf,
        /// Variable every template is expected to reference (repeatable)
        #[arg(long = "expect", value_name = "NAME")]
        expected: Vec<String>,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/* Subcommands that work against the stencil store. */
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Save a bundle directory as a new version of a stencil
    Import {
        dir: PathBuf,
        stencil_id: String,
        #[arg(short, long)]
        message: Option<String>,
        /// Gitignore-style pattern of files to leave out (repeatable)
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,
    },
    /// List the saved versions of a stencil, newest first
    History { stencil_id: String },
    /// Show change statistics between two versions of a stencil
    Diff {
        stencil_id: String,
        old: String,
        new: String,
    },
}

fn init_logging() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logger: {e}");
    }
}

fn load_settings(config_manager: &dyn ConfigManagerOperations) -> AppSettings {
    match config_manager.load_settings(APP_NAME) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Main: Could not load settings, using defaults: {e}");
            AppSettings::default()
        }
    }
}

fn resolve_store_root(
    cli_store: Option<PathBuf>,
    settings: &AppSettings,
    config_manager: &dyn ConfigManagerOperations,
) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(root) = cli_store.or_else(|| settings.store_root.clone()) {
        return Ok(root);
    }
    Ok(config_manager.default_store_root(APP_NAME)?)
}

/* Returns whether any error was reported. */
fn run_lint(dir: &Path, expected: Vec<String>) -> Result<bool, Box<dyn Error>> {
    let files = CoreFileSystemScanner::new().import_bundle(dir, &[])?;
    if !files.iter().any(|f| f.path == MAIN_CONFIG_PATH) {
        log::warn!("Main: {dir:?} has no {MAIN_CONFIG_PATH}");
    }
    let stencil_id = files
        .iter()
        .find(|f| f.path == MAIN_CONFIG_PATH)
        .and_then(|f| StencilSettings::from_config_text(&f.content))
        .map(|s| s.id)
        .unwrap_or_default();

    let mut session = EditingSession::new(&stencil_id, files);
    session.set_expected_variables(expected);
    let lintable: Vec<String> = session
        .files()
        .iter()
        .filter(|f| matches!(f.kind, FileKind::Template | FileKind::MainConfig))
        .map(|f| f.path.clone())
        .collect();
    for path in &lintable {
        session.open(path)?;
    }

    let mut findings: Vec<_> = session.all_diagnostics().iter().cloned().collect();
    sort_by_location(&mut findings);
    findings.sort_by(|a, b| a.file.cmp(&b.file));
    for diagnostic in &findings {
        println!("{diagnostic}");
    }
    let counts = session.counts();
    println!(
        "{} file(s) checked: {} error(s), {} warning(s), {} info",
        lintable.len(),
        counts.errors,
        counts.warnings,
        counts.infos
    );
    Ok(counts.errors > 0)
}

fn run_import(
    store: &dyn StencilStoreOperations,
    dir: &Path,
    stencil_id: &str,
    message: Option<String>,
    exclude: &[String],
    author: &str,
) -> Result<Serial, Box<dyn Error>> {
    let files = CoreFileSystemScanner::new().import_bundle(dir, exclude)?;
    let response = store.save_stencil(&SaveRequest {
        stencil_id: stencil_id.to_string(),
        base_serial: None,
        files,
        author: author.to_string(),
        message,
    })?;
    println!("Saved {stencil_id} as version {}", response.new_serial);
    Ok(response.new_serial)
}

fn run_history(store: &dyn StencilStoreOperations, stencil_id: &str) -> Result<(), Box<dyn Error>> {
    for version in store.get_version_history(stencil_id)? {
        println!(
            "{}{} {} {} ({} file(s)){}",
            version.serial,
            if version.is_active { "*" } else { " " },
            version.created_at,
            version.created_by,
            version.files.len(),
            version
                .message
                .as_deref()
                .map(|m| format!(" {m}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn run_diff(
    store: &dyn StencilStoreOperations,
    stencil_id: &str,
    old: &str,
    new: &str,
) -> Result<(), Box<dyn Error>> {
    let diff = compare_versions(store, stencil_id, &Serial::parse(old)?, &Serial::parse(new)?)?;
    for file in diff.changed() {
        println!(
            "{:?} {} +{} -{}",
            file.status, file.path, file.stat.additions, file.stat.deletions
        );
    }
    println!("total +{} -{}", diff.total.additions, diff.total.deletions);
    Ok(())
}

fn run_store_command(
    command: StoreCommand,
    store: &dyn StencilStoreOperations,
    config_manager: &dyn ConfigManagerOperations,
    settings: &mut AppSettings,
) -> Result<(), Box<dyn Error>> {
    match command {
        StoreCommand::Import {
            dir,
            stencil_id,
            message,
            exclude,
        } => {
            let author = settings
                .author
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
            run_import(store, &dir, &stencil_id, message, &exclude, &author)?;
            settings.last_stencil_id = Some(stencil_id);
            if let Err(e) = config_manager.save_settings(APP_NAME, settings) {
                log::warn!("Main: Could not remember last stencil: {e}");
            }
            Ok(())
        }
        StoreCommand::History { stencil_id } => run_history(store, &stencil_id),
        StoreCommand::Diff {
            stencil_id,
            old,
            new,
        } => run_diff(store, &stencil_id, &old, &new),
    }
}

/* Returns whether lint errors were found. */
fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    let config_manager = CoreConfigManager::new();
    let mut settings = load_settings(&config_manager);

    match cli.command {
        Command::Lint { dir, expected } => run_lint(&dir, expected),
        Command::Store(command) => {
            let store_root = resolve_store_root(cli.store, &settings, &config_manager)?;
            log::debug!("Main: Using stencil store at {store_root:?}");
            let store = CoreStencilStore::new(store_root);
            run_store_command(command, &store, &config_manager, &mut settings)?;
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("Main: {e}");
            ExitCode::FAILURE
        }
    }
}
