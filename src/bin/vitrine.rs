use std::{path::PathBuf, rc::Rc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vitrine::{
    AssetSource, CancellationScope, Engine, EngineConfig, FsAssetSource, HostObject, Settings,
    headless::{HeadlessHost, MemoryAssetSource},
};

#[derive(Parser, Debug)]
#[command(name = "vitrine", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a settings file and summarize it.
    Check(CheckArgs),
    /// Build a page on the headless host and print its live tree.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Settings JSON.
    settings: PathBuf,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Settings JSON.
    settings: PathBuf,

    /// Name of the page to build.
    #[arg(long)]
    page: String,

    /// Also build this popup next to the page.
    #[arg(long)]
    popup: Option<String>,

    /// Directory asset, audio and video paths resolve against (defaults to the settings
    /// file's directory).
    #[arg(long)]
    content_root: Option<PathBuf>,

    /// Fabricate assets in memory instead of reading them from the content root.
    #[arg(long, default_value_t = false)]
    memory_assets: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Compose(args) => cmd_compose(args),
    }
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let settings = Settings::load(&args.settings)?;
    println!(
        "ok: {} page(s), {} popup(s), {} sound(s), {} font mapping(s)",
        settings.pages.len(),
        settings.popups.len(),
        settings.sounds.len(),
        settings.font_map.len()
    );
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let settings = Settings::load(&args.settings)?;
    let content_root = args.content_root.clone().unwrap_or_else(|| {
        args.settings
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let page = settings
        .page(&args.page)
        .cloned()
        .with_context(|| format!("no page named '{}'", args.page))?;
    let popup = match &args.popup {
        Some(name) => Some(
            settings
                .popup(name)
                .cloned()
                .with_context(|| format!("no popup named '{name}'"))?,
        ),
        None => None,
    };

    let host = HeadlessHost::new();
    let assets: Rc<dyn AssetSource> = if args.memory_assets {
        Rc::new(MemoryAssetSource::new())
    } else {
        Rc::new(FsAssetSource::new(&content_root))
    };
    let engine = Engine::init(EngineConfig::new(settings, &content_root), host.hosts(assets))?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("build tokio runtime")?;

    let canvas = HostObject(0);
    let scope = CancellationScope::never();
    let mut roots = Vec::new();
    rt.block_on(async {
        roots.push(engine.build_page(&page, canvas, &scope).await?);
        if let Some(popup) = &popup {
            roots.push(engine.build_popup(popup, canvas, None, &scope).await?);
        }
        anyhow::Ok(())
    })?;

    for root in roots {
        if let Some(tree) = engine.render_tree(root) {
            print!("{tree}");
        }
        if let Err(err) = engine.check_complete(root) {
            eprintln!("warning: {err}");
        }
    }

    let report = engine.shutdown();
    eprintln!(
        "released {} instance(s), {} surface(s), {} asset(s)",
        report.instances_released, report.surfaces_released, report.assets_released
    );
    Ok(())
}
