use clap::{Parser, Subcommand};
use manrender::config::{self, RenderConfig};
use manrender::meta::{self, GlobalView, PackageVersions};
use manrender::pipeline::{self, RenderOptions};
use manrender::render::HtmlRenderer;
use manrender::{logging, output};
use std::path::PathBuf;

/// Flags shared by every command that touches the serving tree.
#[derive(clap::Args, Clone)]
struct GlobalArgs {
    /// Config file [default: ./manrender.toml, if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root of the serving tree (overrides `serving_dir`)
    #[arg(long, global = true)]
    serving_dir: Option<PathBuf>,

    /// Concurrent render workers (overrides `processing.max_workers`)
    #[arg(long, global = true)]
    workers: Option<usize>,
}

/// Which part of the tree to work on.
#[derive(clap::Args, Clone)]
struct SelectionArgs {
    /// Only render these binary packages, comma separated (overrides `only_render`)
    #[arg(long, value_delimiter = ',')]
    only_render: Vec<String>,

    /// Suite to render; repeat for several (overrides `suites`)
    #[arg(long = "suite")]
    suites: Vec<String>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "manrender")]
#[command(about = "Incremental renderer for trees of compressed manual pages")]
#[command(long_about = "\
Incremental renderer for trees of compressed manual pages

Every source page is rendered to a gzip-compressed HTML sibling. Pages whose
rendered file is at least as new as the source are left alone, so running
manrender again right after a successful run writes nothing.

Serving tree:

  /srv/man/
  ├── contents-bookworm.html.gz      # Suite listing (one per suite)
  └── bookworm/                      # Suite
      └── coreutils/                 # Binary package
          ├── index.html.gz          # Package index
          ├── ls.1.gz                # Source: <name>.<section>[.<lang>].gz
          ├── ls.1.html.gz           # Rendered page
          └── dir.1.gz -> ls.1.gz    # Symlinks are aliases, never rendered

Run 'manrender gen-config' to generate a documented manrender.toml.")]
#[command(version = version_string())]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every stale page, index and listing
    Render {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Regenerate every suite listing, stale or not
        #[arg(long)]
        force_listings: bool,
    },
    /// Report what a render would do without writing anything
    Check(SelectionArgs),
    /// Print a stock manrender.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            selection,
            force_listings,
        } => {
            let config = resolve(&cli.globals, &selection)?;
            let view = discover(&config)?;
            let options = RenderOptions {
                force_listings,
                ..render_options(&config)
            };
            let stats = pipeline::render_all(
                &config.serving_dir,
                &view,
                &HtmlRenderer::new(),
                &options,
            )?;
            output::print_run_summary(&options, &stats);
        }
        Command::Check(selection) => {
            let config = resolve(&cli.globals, &selection)?;
            let view = discover(&config)?;
            let report = pipeline::check(&config.serving_dir, &view, &render_options(&config))?;
            output::print_check_output(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file, apply command-line overrides, validate, and
/// install logging.
fn resolve(
    globals: &GlobalArgs,
    selection: &SelectionArgs,
) -> Result<RenderConfig, Box<dyn std::error::Error>> {
    let mut config = config::load_config(globals.config.as_deref())?;
    if let Some(dir) = &globals.serving_dir {
        config.serving_dir = dir.clone();
    }
    if let Some(n) = globals.workers {
        config.processing.max_workers = Some(n);
    }
    if !selection.suites.is_empty() {
        config.suites = selection.suites.clone();
    }
    if !selection.only_render.is_empty() {
        config.only_render = selection.only_render.clone();
    }
    config.validate()?;
    logging::init(&config.logging)?;
    Ok(config)
}

fn discover(config: &RenderConfig) -> Result<GlobalView, Box<dyn std::error::Error>> {
    let versions = match &config.package_versions {
        Some(path) => meta::load_package_versions(path)?,
        None => PackageVersions::new(),
    };
    Ok(GlobalView::discover(
        &config.serving_dir,
        &config.suites,
        &versions,
    )?)
}

fn render_options(config: &RenderConfig) -> RenderOptions {
    RenderOptions::new(config::effective_workers(&config.processing))
        .with_only_render(&config.only_render)
}
