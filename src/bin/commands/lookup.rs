use clap::Args;
use json_to_table::json_to_table;
use spyglass::lens::export::export_csv_string;
use spyglass::lens::utils::{truncate_name, DEFAULT_NAME_MAX_LEN};
use spyglass::{
    export_json, record_to_json, NetworkCache, Outcome, OutputFormat, Resolution, ResolveLens,
    SpyglassConfig, TokenResolution,
};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Arguments for the Lookup command
#[derive(Args)]
pub struct LookupArgs {
    /// IP addresses or networks to resolve (e.g. "1.1.1.1" or "9.9.9.0/24")
    #[clap(required = true)]
    pub addresses: Vec<String>,

    /// Output format
    #[clap(short, long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct LookupRow {
    address: String,
    name: String,
    description: String,
    cidr: String,
    country: String,
    registry: String,
    fqdn: String,
    status: String,
}

impl From<&TokenResolution> for LookupRow {
    fn from(record: &TokenResolution) -> Self {
        match &record.outcome {
            Outcome::Resolved(net) => LookupRow {
                address: record.token.clone(),
                name: net.name.clone(),
                description: truncate_name(&net.description, DEFAULT_NAME_MAX_LEN),
                cidr: net.cidr.clone(),
                country: net.country.clone(),
                registry: net.registry.clone(),
                fqdn: net.fqdn.clone().unwrap_or_default(),
                status: "resolved".to_string(),
            },
            Outcome::Unresolved(reason) => LookupRow {
                address: record.token.clone(),
                name: String::new(),
                description: String::new(),
                cidr: String::new(),
                country: String::new(),
                registry: String::new(),
                fqdn: String::new(),
                status: reason.to_string(),
            },
        }
    }
}

pub fn run(config: &SpyglassConfig, args: LookupArgs, json_output: bool) {
    let cache = NetworkCache::load(&config.cache_file);
    let mut lens = ResolveLens::new(cache, config);
    let (resolution, _stats) = lens.resolve_batch(&args.addresses);

    let format = if json_output {
        OutputFormat::Json
    } else {
        args.format
    };

    print_resolution(&resolution, format);
}

fn print_resolution(resolution: &Resolution, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let records: Vec<serde_json::Value> =
                resolution.records().iter().map(record_to_json).collect();
            match serde_json::to_string(&records) {
                Ok(out) => println!("{}", out),
                Err(e) => {
                    eprintln!("ERROR: {e}");
                    std::process::exit(1);
                }
            }
        }
        OutputFormat::JsonPretty => {
            if let Err(e) = export_json(resolution, std::io::stdout()) {
                eprintln!("ERROR: {e}");
                std::process::exit(1);
            }
            println!();
        }
        OutputFormat::Csv => {
            print!("{}", export_csv_string(resolution));
        }
        OutputFormat::Table if resolution.len() == 1 => {
            // single record: collapsed key-value table reads better
            let record_json = record_to_json(&resolution.records()[0]);
            let mut table = json_to_table(&record_json);
            table.collapse();
            println!("{}", table);
        }
        OutputFormat::Table => {
            let rows: Vec<LookupRow> = resolution.records().iter().map(LookupRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
        OutputFormat::Markdown => {
            let rows: Vec<LookupRow> = resolution.records().iter().map(LookupRow::from).collect();
            println!("{}", Table::new(rows).with(Style::markdown()));
        }
    }
}
