//! refscan command line
//!
//! [`command`] builds the argument parser and [`run`] executes parsed
//! arguments, writing everything meant for the user to `out`.

#![warn(missing_docs)]

pub mod commands;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use refscan_core::ScanConfig;
use std::io::Write;
use std::path::PathBuf;

pub use commands::{estimate, find_broken, print_map, print_report, Session};

/// Argument parser for the `refscan` binary
#[must_use]
pub fn command() -> Command {
    let dataset = Arg::new("dataset")
        .long("dataset")
        .short('d')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON dataset describing the site");
    let config = Arg::new("config")
        .long("config")
        .short('c')
        .global(true)
        .value_parser(value_parser!(PathBuf))
        .help("TOML scan configuration");
    let store = Arg::new("store")
        .long("store")
        .global(true)
        .default_value(".refscan")
        .value_parser(value_parser!(PathBuf))
        .help("Directory holding session reports");
    let session = Arg::new("session")
        .long("session")
        .global(true)
        .default_value("default")
        .help("Report session name");

    Command::new("refscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Find entity reference fields pointing at deleted entities")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(config)
        .arg(store)
        .arg(session)
        .subcommand(
            Command::new("find-broken")
                .visible_alias("fb")
                .about("Rebuild the broken reference report for the session")
                .arg(dataset.clone())
                .arg(
                    Arg::new("export")
                        .long("export")
                        .value_parser(value_parser!(PathBuf))
                        .help("Also write the finished report as JSON to this file"),
                )
                .arg(
                    Arg::new("retries")
                        .long("retries")
                        .default_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Retries per failed step"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Show the stored report of the session")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("map")
                .about("Print the resolved reference map as JSON")
                .arg(dataset.clone()),
        )
        .subcommand(
            Command::new("estimate")
                .about("Quick check without building a report")
                .arg(dataset),
        )
}

/// Execute parsed arguments
///
/// # Errors
/// Returns error if loading inputs, scanning or writing output fails. A
/// batch that finishes with a failed operation is reported as an error
/// after its message is written.
pub async fn run(matches: &ArgMatches, out: &mut impl Write) -> anyhow::Result<()> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    let session = Session {
        dir: matches
            .get_one::<PathBuf>("store")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".refscan")),
        name: matches
            .get_one::<String>("session")
            .cloned()
            .unwrap_or_else(|| "default".to_string()),
    };

    match matches.subcommand() {
        Some(("find-broken", args)) => {
            let dataset = required_path(args, "dataset")?;
            let retries = args.get_one::<usize>("retries").copied().unwrap_or(0);
            let finished = find_broken(&dataset, &session, config, retries, out).await?;
            if let Some(export) = args.get_one::<PathBuf>("export") {
                commands::export_report(&session, export).await?;
                writeln!(out, "Report written to {}", export.display())?;
            }
            if !finished.success {
                anyhow::bail!("scan did not finish");
            }
        }
        Some(("report", args)) => print_report(&session, args.get_flag("json"), out).await?,
        Some(("map", args)) => print_map(&required_path(args, "dataset")?, config, out)?,
        Some(("estimate", args)) => {
            estimate(&required_path(args, "dataset")?, &session, config, out).await?;
        }
        _ => anyhow::bail!("no subcommand given"),
    }
    Ok(())
}

fn required_path(args: &ArgMatches, name: &str) -> anyhow::Result<PathBuf> {
    args.get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
