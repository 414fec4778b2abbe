use clap::{Parser, Subcommand};
use folio::{config, output};
use std::path::PathBuf;

/// Shared flags for commands that run the engine.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Disable module caches, forcing every module to recompute
    #[arg(long)]
    no_cache: bool,

    /// Number of consecutive passes to run with the same engine
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    passes: u64,
}

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Pipeline-driven static content generator")]
#[command(long_about = "\
Pipeline-driven static content generator

A project is a directory with a folio.toml describing named pipelines.
Each pipeline is an ordered chain of modules; pipelines run in declaration
order and each one can read what earlier pipelines produced.

Project structure:

  my-site/
  ├── folio.toml          # Pipelines and settings
  ├── input/              # First input root
  ├── theme/              # Later input roots are shadowed by earlier ones
  └── output/             # Everything written lands here

Run 'folio gen-config' to generate a documented folio.toml.")]
#[command(version)]
struct Cli {
    /// Project root containing folio.toml
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every pipeline and write the output root
    Build(BuildArgs),
    /// Validate folio.toml and list the pipelines without running them
    Check,
    /// Print a stock folio.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(args) => {
            let mut config = config::load_config(&cli.root)?;
            if args.no_cache {
                config.cache = false;
            }
            println!("==> Building {}", cli.root.display());
            let mut engine = config.build_engine(&cli.root)?;

            let mut failed = 0;
            for _ in 0..args.passes {
                let summary = engine.execute()?;
                output::print_summary(&summary);
                failed = summary.failures().count();
            }
            if failed > 0 {
                return Err(format!("{failed} pipeline(s) failed").into());
            }
            println!(
                "==> Build complete: {}",
                engine.file_system().output_path()
            );
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let config = config::load_config(&cli.root)?;
            config.build_engine(&cli.root)?;
            output::print_config(&config);
            println!("==> Configuration is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize tracing. `RUST_LOG` wins over the verbosity flag.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match verbose {
        0 => "folio=warn",
        1 => "folio=info",
        2 => "folio=debug",
        _ => "folio=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
