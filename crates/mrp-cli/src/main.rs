use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mrp_cli::inspect;
use mrp_cli::logging;
use mrp_cli::simulate::{run_simulation, SimulationConfig};
use mrp_core::MrpConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

fn cli() -> Command {
    let journal = Arg::new("journal")
        .long("journal")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Path to the audit journal");
    let json = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON");

    Command::new("mrp")
        .version(mrp_core::VERSION)
        .about("Mandatory Response Protocol core")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Drive the protocol with random interventions and check it holds")
                .arg(
                    Arg::new("signals")
                        .long("signals")
                        .default_value("100")
                        .value_parser(value_parser!(usize))
                        .help("Number of signals to submit"),
                )
                .arg(
                    Arg::new("intervene-ratio")
                        .long("intervene-ratio")
                        .default_value("0.6")
                        .value_parser(value_parser!(f64))
                        .help("Share of signals that get an intervention attempt"),
                )
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .default_value("200")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Escalation timeout for the run"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("journal")
                        .long("journal")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the audit chain to this journal"),
                )
                .arg(
                    Arg::new("sign")
                        .long("sign")
                        .action(ArgAction::SetTrue)
                        .help("Sign entries with a seed-derived ed25519 key"),
                )
                .arg(json.clone()),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify a journal's hash chain")
                .arg(journal.clone())
                .arg(
                    Arg::new("public-key")
                        .long("public-key")
                        .help("Hex ed25519 public key; also require valid signatures"),
                )
                .arg(json.clone()),
        )
        .subcommand(
            Command::new("report")
                .about("Print journal statistics")
                .arg(journal.clone())
                .arg(json),
        )
        .subcommand(
            Command::new("trail")
                .about("Print one signal's audit trail")
                .arg(journal)
                .arg(
                    Arg::new("signal")
                        .long("signal")
                        .required(true)
                        .help("Signal id"),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    match run(&matches).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => MrpConfig::load(path)?,
        None => MrpConfig::default(),
    };
    logging::init(&config.log_filter, config.log_json)?;

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let sim = SimulationConfig {
                signals: *args.get_one::<usize>("signals").context("missing --signals")?,
                intervene_ratio: *args
                    .get_one::<f64>("intervene-ratio")
                    .context("missing --intervene-ratio")?,
                timeout: Duration::from_millis(
                    *args.get_one::<u64>("timeout-ms").context("missing --timeout-ms")?,
                ),
                seed: *args.get_one::<u64>("seed").context("missing --seed")?,
                journal: args.get_one::<PathBuf>("journal").cloned(),
                sign: args.get_flag("sign"),
            };
            let report = run_simulation(sim, config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.generate_text());
            }
            Ok(exit_code(report.passed()))
        }
        Some(("verify", args)) => {
            let path = journal_arg(args)?;
            let public_key = args.get_one::<String>("public-key").map(String::as_str);
            let result = inspect::verify_journal(path, public_key)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Journal:          {}", path.display());
                println!("Entries checked:  {}", result.entries_checked);
                println!("Signatures:       {}", result.signatures_checked);
                println!(
                    "Chain integrity:  {}",
                    if result.valid { "VALID" } else { "INVALID" }
                );
                if let (Some(at), Some(failure)) = (result.broken_at, &result.failure) {
                    println!("Broken at:        sequence {at} ({failure})");
                }
            }
            Ok(exit_code(result.valid))
        }
        Some(("report", args)) => {
            let path = journal_arg(args)?;
            let stats = inspect::journal_statistics(path)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Audit Statistics");
                println!("================");
                println!("Total entries:   {}", stats.total_entries);
                println!("Unique signals:  {}", stats.unique_signals);
                for (event_type, count) in &stats.events_by_type {
                    println!("  {event_type:<22} {count}");
                }
                println!("Head:            {}", stats.head);
                println!(
                    "Chain valid:     {}",
                    if stats.chain_valid { "YES" } else { "NO" }
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("trail", args)) => {
            let path = journal_arg(args)?;
            let signal = args.get_one::<String>("signal").context("missing --signal")?;
            let trail = inspect::signal_trail(path, signal)?;
            if trail.is_empty() {
                anyhow::bail!("no entries for signal {signal}");
            }
            println!("{}", serde_json::to_string_pretty(&trail)?);
            Ok(ExitCode::SUCCESS)
        }
        _ => anyhow::bail!("unknown command"),
    }
}

fn journal_arg(args: &ArgMatches) -> anyhow::Result<&PathBuf> {
    args.get_one::<PathBuf>("journal").context("missing --journal")
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
