//! Binary entry point for the schema-index administrative CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sombra_schema_index::{
    admin::{
        load_csv, parse_value, sample_index, verify_index, SampleIndexReport, VerifyIndexReport,
        VerifyScope,
    },
    index::{SamplingMode, SchemaIndexConfig},
    types::PropId,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sidx",
    version,
    about = "Administrative CLI for schema index verification and sampling",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset"
    )]
    log_level: String,

    #[arg(
        long,
        global = true,
        env = "SIDX_CONFIG",
        value_name = "PATH",
        help = "Index configuration file (TOML)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Partitions to spread the snapshot over (overrides config)"
    )]
    partitions: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Check that no two entities share a value")]
    Verify {
        #[arg(value_name = "CSV")]
        snapshot: PathBuf,

        #[arg(long, help = "Property key id the values are stored under")]
        prop_id: Option<u32>,

        #[arg(long, help = "Constrained property name from the config file")]
        property: Option<String>,

        #[arg(
            long = "value",
            value_name = "VALUE",
            help = "Only check these values (repeatable)"
        )]
        values: Vec<String>,

        #[arg(
            long,
            default_value = "str",
            value_name = "TYPE",
            help = "Type of --value arguments: str, int, float, bool"
        )]
        value_type: String,
    },

    #[command(about = "Estimate the selectivity of the index")]
    Sample {
        #[arg(value_name = "CSV")]
        snapshot: PathBuf,

        #[arg(long, help = "Byte budget of retained values per subsampling step")]
        sample_size_limit: Option<usize>,

        #[arg(long, help = "Sample as a unique index, reading only the document count")]
        unique: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    install_tracing_subscriber(&cli.log_level);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn install_tracing_subscriber(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<i32, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => SchemaIndexConfig::load(path)?,
        None => SchemaIndexConfig::default(),
    };
    if let Some(partitions) = cli.partitions {
        config.partitions = partitions;
    }

    match cli.command {
        Command::Verify {
            snapshot,
            prop_id,
            property,
            values,
            value_type,
        } => {
            let prop = resolve_prop(&config, prop_id, property.as_deref())?;
            config.validate()?;
            let loaded = load_csv(&snapshot, prop, config.partitions, config.leaf_size)?;
            let scope = if values.is_empty() {
                VerifyScope::Full
            } else {
                let parsed = values
                    .iter()
                    .map(|raw| parse_value(raw, &value_type))
                    .collect::<Result<Vec<_>, _>>()?;
                VerifyScope::Values(parsed)
            };
            let outcome = verify_index(&loaded.partitions, &loaded.store, prop, &scope, None);
            let report = loaded.partitions.close_after(outcome)?;
            emit(&cli.format, &report, |_| print_verify_text(&report))?;
            if !report.success {
                return Ok(2);
            }
        }
        Command::Sample {
            snapshot,
            sample_size_limit,
            unique,
        } => {
            if let Some(limit) = sample_size_limit {
                config.sampling.sample_size_limit = limit;
            }
            if unique {
                config.sampling.mode = SamplingMode::Unique;
            }
            config.validate()?;
            let loaded = load_csv(&snapshot, PropId(0), config.partitions, config.leaf_size)?;
            let outcome = sample_index(&loaded.partitions, &config.sampling, None);
            let report = loaded.partitions.close_after(outcome)?;
            emit(&cli.format, &report, |_| print_sample_text(&report))?;
        }
    }

    Ok(0)
}

fn resolve_prop(
    config: &SchemaIndexConfig,
    prop_id: Option<u32>,
    property: Option<&str>,
) -> Result<PropId, Box<dyn Error>> {
    if let Some(id) = prop_id {
        return Ok(PropId(id));
    }
    match property {
        Some(name) => config
            .constraint(name)
            .map(|c| c.prop())
            .ok_or_else(|| format!("no constraint named '{name}' in config").into()),
        None => match config.constraints.as_slice() {
            [only] => Ok(only.prop()),
            _ => Ok(PropId(0)),
        },
    }
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_verify_text(report: &VerifyIndexReport) {
    println!(
        "Verify => success={} partitions={} fields_scanned={} values_checked={} ({:.2} ms)",
        report.success,
        report.partitions,
        report.fields_scanned,
        report.values_checked,
        report.duration_ms,
    );
    if let Some(conflict) = &report.conflict {
        println!("- conflict: {}", conflict.message);
    }
}

fn print_sample_text(report: &SampleIndexReport) {
    println!(
        "Sample => index_size={} sample_size={} unique_values={} selectivity={:.4} partitions={} ({:.2} ms)",
        report.index_size,
        report.sample_size,
        report.unique_values,
        report.selectivity,
        report.partitions,
        report.duration_ms,
    );
    if report.cancelled {
        println!("- cancelled: figures are partial");
    }
}
