// Statline entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr)
// 2. Load config
// 3. Open warehouse
// 4. Dispatch subcommand (import / run)

use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;

use statline::config;
use statline::db::Warehouse;
use statline::pipeline;
use statline::source;

const USAGE: &str = "\
usage: statline <command>

commands:
  import [csv-path]        append a CSV drop of the source feed to the warehouse
                           (default path from config: source.csv)
  run                      recompute and publish both datasets
  run reference            recompute and publish the reference dataset only
  run profile              recompute and publish the profile dataset only
";

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!("Config loaded: warehouse={}", config.warehouse_path);

    // 3. Open warehouse
    let warehouse =
        Warehouse::open(&config.warehouse_path).context("failed to open warehouse")?;

    // 4. Dispatch subcommand
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("import") => {
            let path = args
                .get(1)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&config.source_csv));
            let inserted = source::import_csv(&warehouse, &path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            info!("Imported {inserted} new rows from {}", path.display());
            println!("imported {inserted} new rows");
        }
        Some("run") => {
            let reports = match args.get(1).map(String::as_str) {
                None => pipeline::run_all(&warehouse).context("pipeline run failed")?,
                Some("reference") => {
                    vec![pipeline::run_reference(&warehouse)
                        .context("reference pipeline failed")?]
                }
                Some("profile") => {
                    vec![pipeline::run_profile(&warehouse)
                        .context("profile pipeline failed")?]
                }
                Some(other) => bail!("unknown dataset `{other}`\n\n{USAGE}"),
            };
            for report in &reports {
                println!(
                    "{}: {} source rows, {} excluded, {} published",
                    report.dataset.published_table(),
                    report.source_rows,
                    report.excluded_rows,
                    report.published_rows
                );
            }
        }
        Some(other) => bail!("unknown command `{other}`\n\n{USAGE}"),
        None => bail!("missing command\n\n{USAGE}"),
    }

    Ok(())
}

/// Initialize tracing to stderr so pipeline output on stdout stays clean
/// for shell consumption.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("statline=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
