use chrono::Utc;
use clap::{Parser, Subcommand};
use nib::config::{self, Environment, Site};
use nib::pipeline::{Directories, Pipeline};
use nib::{generate, output, serve};
use std::path::PathBuf;

/// Shared flags for commands that render images.
#[derive(clap::Args, Clone, Copy)]
struct CacheArgs {
    /// Disable the encode cache and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "nib")]
#[command(about = "Content pipeline and static site builder for a Markdown blog")]
#[command(long_about = "\
Content pipeline and static site builder for a Markdown blog

Markdown pages with YAML front matter become HTML pages. Posts and books
are collected from their directories; tags and shortcodes in the body are
expanded before Markdown rendering.

Content structure:

  src/
  ├── _data/site.toml              # Site record (run 'nib gen-config')
  ├── _data/*.json|*.toml          # Extra template data, keyed by file stem
  ├── index.md                     # → /
  ├── about.md                     # → /about/
  ├── posts/2021/hello.md          # → /posts/2021/hello/
  ├── books/dune.md                # → /books/dune/
  ├── assets/  images/             # Copied as-is
  └── manifest.json  _redirects    # Copied as-is

Set NODE_ENV=production (or pass --env production) to minify the output.")]
#[command(version)]
struct Cli {
    /// Content directory
    #[arg(long, default_value = "src", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "www", global = true)]
    output: PathBuf,

    /// Build environment; defaults to $NODE_ENV
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site into the output directory
    Build(CacheArgs),
    /// Build, serve the output and rebuild on changes
    Serve(CacheArgs),
    /// Validate config and content without writing
    Check,
    /// Print a stock site.toml with all options documented
    GenConfig,
}

/// Everything needed to (re)create the pipeline.
#[derive(Clone)]
struct Target {
    dirs: Directories,
    environment: Environment,
    use_cache: bool,
}

impl Target {
    fn from_cli(cli: &Cli, use_cache: bool) -> Self {
        let environment = cli
            .env
            .as_deref()
            .map(Environment::parse)
            .unwrap_or_else(Environment::from_env);
        Self {
            dirs: Directories::new(&cli.source, &cli.output),
            environment,
            use_cache,
        }
    }

    fn pipeline(&self) -> Result<Pipeline, config::ConfigError> {
        let site_config = config::load_config(&self.dirs.data_dir())?;
        let site = Site::new(site_config, self.environment.clone());
        Ok(Pipeline::with_dirs(site, self.dirs.clone(), self.use_cache))
    }

    fn build(&self) -> Result<Pipeline, Box<dyn std::error::Error + Send + Sync>> {
        let pipeline = self.pipeline()?;
        let report = generate::build(&pipeline, Utc::now())?;
        output::print_build_output(&report);
        Ok(pipeline)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build(cache_args) => {
            let target = Target::from_cli(&cli, !cache_args.no_cache);
            println!(
                "==> Building {} → {} ({})",
                cli.source.display(),
                cli.output.display(),
                target.environment.name()
            );
            target.build().map_err(|e| e as Box<dyn std::error::Error>)?;
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Serve(cache_args) => {
            let target = Target::from_cli(&cli, !cache_args.no_cache);
            let pipeline = target.build().map_err(|e| e as Box<dyn std::error::Error>)?;
            let rebuild_target = target.clone();
            serve::serve(&pipeline.dirs, &pipeline.server, move || {
                rebuild_target.build().map(|_| ())
            })?;
        }
        Command::Check => {
            let target = Target::from_cli(&cli, false);
            println!("==> Checking {}", cli.source.display());
            let pipeline = target.pipeline()?;
            let report = generate::check(&pipeline, Utc::now())?;
            output::print_check_output(&report);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
