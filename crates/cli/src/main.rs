use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use dbslice_catalog_postgres::ConnectionParams;
use dbslice_cli::{run_snapshot, RunConfig};
use dbslice_core::TableRef;
use dbslice_snapshot::parse_skip_tables;

#[derive(Parser)]
#[command(
    name = "dbslice",
    version,
    about = "Extract a referentially consistent subset of a PostgreSQL database"
)]
struct Cli {
    /// Database host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long, default_value_t = 5432)]
    port: u16,

    /// Role to connect as
    #[arg(long)]
    user: String,

    /// Password (falls back to PGPASSWORD)
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    password: String,

    /// Database name
    #[arg(long)]
    db: String,

    /// Seed table to sample (schema.table, or a bare name in public)
    #[arg(long)]
    seed_table: String,

    /// Fraction of the seed table to sample, in (0, 1]
    #[arg(long, default_value_t = 0.05)]
    sample_fraction: f64,

    /// Maximum concurrent bulk-copy operations
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Comma-separated tables to leave out entirely
    #[arg(long, default_value = "")]
    skip_tables: String,

    /// Promote per-table failures to process failure
    #[arg(long)]
    strict: bool,

    /// Working directory for artifacts before packaging
    #[arg(long, default_value = "data-dump")]
    work_dir: PathBuf,

    /// Print the foreign-key graph as DOT before extraction
    #[arg(long)]
    print_graph: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = match build_config(cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    match run_snapshot(config).await {
        Ok(summary) => {
            println!(
                "Wrote {} ({} tables copied, {} rows, {} unreachable)",
                summary.archive.display(),
                summary.tables_copied,
                summary.rows_copied,
                summary.unreachable
            );
        }
        Err(err) => {
            error!("snapshot failed: {err:#}");
            std::process::exit(1);
        }
    }
}

fn build_config(cli: Cli) -> Result<RunConfig, String> {
    if !(cli.sample_fraction > 0.0 && cli.sample_fraction <= 1.0) {
        return Err(format!(
            "--sample-fraction must be in (0, 1], got {}",
            cli.sample_fraction
        ));
    }
    if cli.concurrency == 0 {
        return Err("--concurrency must be at least 1".to_string());
    }

    let skip_tables: BTreeSet<String> = parse_skip_tables(&cli.skip_tables);

    Ok(RunConfig {
        params: ConnectionParams {
            host: cli.host,
            port: cli.port,
            user: cli.user,
            password: cli.password,
            database: cli.db,
        },
        seed: TableRef::parse(&cli.seed_table),
        sample_fraction: cli.sample_fraction,
        concurrency: cli.concurrency,
        strict: cli.strict,
        skip_tables,
        work_dir: cli.work_dir,
        print_graph: cli.print_graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(fraction: f64, concurrency: usize) -> Cli {
        Cli {
            host: "localhost".into(),
            port: 5432,
            user: "app".into(),
            password: "pw".into(),
            db: "shop".into(),
            seed_table: "orders".into(),
            sample_fraction: fraction,
            concurrency,
            skip_tables: "audit_log,public.sessions".into(),
            strict: false,
            work_dir: PathBuf::from("data-dump"),
            print_graph: false,
            verbose: false,
        }
    }

    #[test]
    fn valid_flags_build_a_config() {
        let config = build_config(cli_with(0.05, 4)).unwrap();
        assert_eq!(config.seed.normalized(), "public.orders");
        assert!(config.skip_tables.contains("public.audit_log"));
        assert!(config.skip_tables.contains("public.sessions"));
    }

    #[test]
    fn out_of_range_fraction_is_a_usage_error() {
        assert!(build_config(cli_with(0.0, 4)).is_err());
        assert!(build_config(cli_with(1.5, 4)).is_err());
    }

    #[test]
    fn zero_concurrency_is_a_usage_error() {
        assert!(build_config(cli_with(0.05, 0)).is_err());
    }
}
