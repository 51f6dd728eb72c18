use clap::{Parser, Subcommand};
use spyglass::SpyglassConfig;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.spyglass/spyglass.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Override the lookup cache file location
    #[clap(short = 'C', long)]
    cache: Option<String>,

    /// Output as JSON objects
    #[clap(long)]
    json: bool,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve IP addresses from a text-file list.
    List(commands::list::ListArgs),

    /// Annotate an SSL-inspection spreadsheet (CSV) in place.
    Sheet(commands::sheet::SheetArgs),

    /// Resolve addresses given on the command line.
    Lookup(commands::lookup::LookupArgs),

    /// Inspect or reset the lookup cache.
    Cache {
        #[clap(subcommand)]
        commands: commands::cache::CacheCommands,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();
    }

    let mut config = match SpyglassConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: unable to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Some(cache_file) = cli.cache {
        config.cache_file = cache_file;
    }

    match cli.command {
        Commands::List(args) => commands::list::run(&config, args, cli.json),
        Commands::Sheet(args) => commands::sheet::run(&config, args, cli.json),
        Commands::Lookup(args) => commands::lookup::run(&config, args, cli.json),
        Commands::Cache { commands } => commands::cache::run(&config, commands, cli.json),
    }
}
