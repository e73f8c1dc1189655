#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};

use pathdeck::app::PathDeckApp;
use pathdeck::config::{
    AppConfig, ConfigStore, ConfigSync, JsonConfigStore, MemoryConfigStore, INDEX_FILE,
};
use pathdeck::coordinator::AppCore;
use pathdeck::geometry::{WindowHost, WindowLayoutMode};
use pathdeck::hotkey::VisibilityHotkey;
use pathdeck::indexer::{IndexerOptions, LocalIndexService};
use pathdeck::model::WindowSize;
use pathdeck::service::ServiceHandle;
use pathdeck::ui_model::normalize_path_for_display;

const CLI_LISTING_TIMEOUT: Duration = Duration::from_secs(30);
const CLI_INDEX_TIMEOUT: Duration = Duration::from_secs(600);
const CLI_IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "pathdeck")]
#[command(about = "Tabbed folder browser with a global file index")]
struct Args {
    #[arg(default_value = "")]
    query: String,
    /// Folder to open. Defaults to the current directory in --cli mode.
    #[arg(long)]
    root: Option<PathBuf>,
    #[arg(long, default_value_t = 1000)]
    limit: usize,
    /// Run headless and print results to stdout.
    #[arg(long, default_value_t = false)]
    cli: bool,
    /// Search the global index instead of the folder.
    #[arg(long, default_value_t = false)]
    indexed: bool,
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = std::env::var("PATHDECK_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize()
        .with_context(|| format!("failed to canonicalize root {}", root.display()))
}

/// Stands in for a window when nothing is on screen.
struct HeadlessWindow {
    size: WindowSize,
}

impl WindowHost for HeadlessWindow {
    fn window_size(&self) -> Result<WindowSize> {
        Ok(self.size)
    }

    fn set_window_size(&mut self, size: WindowSize) -> Result<()> {
        self.size = size;
        Ok(())
    }

    fn set_visible(&mut self, _visible: bool) -> Result<()> {
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pumps the core until `done` holds, sleeping until the next timer between
/// rounds.
fn drive(
    core: &mut AppCore,
    window: &mut HeadlessWindow,
    timeout: Duration,
    what: &str,
    done: impl Fn(&AppCore) -> bool,
) -> Result<()> {
    let started = Instant::now();
    loop {
        let now = Instant::now();
        core.pump(now, window);
        if done(core) {
            return Ok(());
        }
        if now.duration_since(started) > timeout {
            bail!("timed out waiting for {what}");
        }
        let nap = core
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(CLI_IDLE_SLEEP)
            .min(CLI_IDLE_SLEEP);
        thread::sleep(nap);
    }
}

fn run_cli(args: &Args) -> Result<()> {
    let root = canonical_root(args.root.as_deref().unwrap_or(Path::new(".")))?;
    let limit = args.limit.min(1000);

    let config = AppConfig {
        root_folder: Some(root.clone()),
        index_root: Some(root.clone()),
        ..AppConfig::default()
    };
    let service = LocalIndexService::new(IndexerOptions {
        root: root.clone(),
        skip_hidden: config.skip_hidden,
        index_file: None,
    });
    let sync = ConfigSync::load(Box::new(MemoryConfigStore::with_config(config)));
    let mut core = AppCore::new(ServiceHandle::spawn(Arc::new(service)), sync);
    let mut window = HeadlessWindow {
        size: WindowLayoutMode::Normal.default_size(),
    };

    core.start();
    drive(&mut core, &mut window, CLI_LISTING_TIMEOUT, "directory listing", |core| {
        !core.listing().is_loading
    })?;
    if let Some(error) = core.listing().error_message.clone() {
        bail!("failed to list {}: {error}", root.display());
    }

    let query = args.query.trim();
    if query.is_empty() {
        for entry in core.listing().entries.iter().take(limit) {
            println!("{}", normalize_path_for_display(&entry.path));
        }
        core.shutdown();
        return Ok(());
    }

    if args.indexed {
        drive(&mut core, &mut window, CLI_INDEX_TIMEOUT, "index build", |core| {
            core.index().is_ready()
        })?;
        core.toggle_search_mode(Instant::now());
    }
    core.set_query(query, Instant::now());
    drive(&mut core, &mut window, CLI_LISTING_TIMEOUT, "search results", |core| {
        !core.search().is_searching()
    })?;

    for hit in core.search().results().iter().take(limit) {
        println!("{}", normalize_path_for_display(&hit.path));
    }
    core.shutdown();
    Ok(())
}

fn run_gui(args: &Args) -> Result<()> {
    let config_dir = args.config_dir.clone().or_else(JsonConfigStore::default_dir);
    let store: Box<dyn ConfigStore> = match &config_dir {
        Some(dir) => Box::new(JsonConfigStore::open(dir)),
        None => {
            tracing::warn!("no config directory available; settings will not be saved");
            Box::new(MemoryConfigStore::default())
        }
    };
    let sync = ConfigSync::load(store);

    let settings = sync.config();
    let service = LocalIndexService::new(IndexerOptions {
        root: settings.effective_index_root(),
        skip_hidden: settings.skip_hidden,
        index_file: config_dir.as_ref().map(|dir| dir.join(INDEX_FILE)),
    });
    let hotkey_spec = settings.global_hotkey.clone();
    let initial_size = sync.persisted_geometry(
        WindowLayoutMode::Normal.key(),
        WindowLayoutMode::Normal.default_size(),
    );

    let mut core = AppCore::new(ServiceHandle::spawn(Arc::new(service)), sync);
    core.start();
    if let Some(root) = &args.root {
        let root = canonical_root(root)?;
        let existing = core
            .sessions()
            .iter()
            .find(|s| s.pinned_path() == root)
            .map(|s| s.id.clone());
        match existing {
            Some(id) => {
                core.switch_tab(&id);
            }
            None => {
                core.open_tab(root, None);
            }
        }
    }

    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = eframe::egui::ViewportBuilder::default()
        .with_title("PathDeck")
        .with_inner_size(eframe::egui::vec2(initial_size.width, initial_size.height));
    let query = args.query.clone();

    eframe::run_native(
        "PathDeck",
        native_options,
        Box::new(move |cc| {
            let hotkey = hotkey_spec.as_deref().and_then(|spec| {
                VisibilityHotkey::install(spec, cc.egui_ctx.clone())
                    .map_err(|err| {
                        tracing::warn!(error = %format!("{err:#}"), "global hotkey disabled");
                    })
                    .ok()
            });
            Ok(Box::new(PathDeckApp::new(core, query, hotkey)))
        }),
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    if args.cli {
        run_cli(&args)
    } else {
        run_gui(&args)
    }
}
