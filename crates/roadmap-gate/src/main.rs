//! `roadmap-gate` command-line entry point

use anyhow::Context;
use clap::{value_parser, Arg, Command};
use roadmap_core::MutationRequest;
use roadmap_gate::{
    init_tracing, load_fixture, parse_session, run_apply, run_check, save_fixture, GateConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    let fixture = Arg::new("fixture")
        .long("fixture")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON store snapshot to load");

    Command::new("roadmap-gate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Access checks and mutation runs against roadmap fixtures")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("check")
                .about("Print the access level a principal holds on a roadmap")
                .arg(fixture.clone())
                .arg(
                    Arg::new("principal")
                        .long("principal")
                        .default_value(roadmap_gate::ANONYMOUS)
                        .help("Username, or `anonymous`"),
                )
                .arg(
                    Arg::new("roadmap")
                        .long("roadmap")
                        .required(true)
                        .help("Roadmap id"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Run one mutation and print the outcome as JSON")
                .arg(fixture)
                .arg(
                    Arg::new("request")
                        .long("request")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON mutation request"),
                )
                .arg(
                    Arg::new("session")
                        .long("session")
                        .default_value(roadmap_gate::ANONYMOUS)
                        .help("Session claims as JSON, or `anonymous`"),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the resulting store to this file"),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let config = GateConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    init_tracing(&config.log)?;

    match matches.subcommand() {
        Some(("check", args)) => {
            let store = Arc::new(load_fixture(required::<PathBuf>(args, "fixture")?)?);
            let principal = required::<String>(args, "principal")?;
            let roadmap = required::<String>(args, "roadmap")?;

            let report = run_check(store, principal, roadmap).await?;
            println!("{}", report.level);
        }
        Some(("apply", args)) => {
            let store = Arc::new(load_fixture(required::<PathBuf>(args, "fixture")?)?);
            let request_path = required::<PathBuf>(args, "request")?;
            let request: MutationRequest = serde_json::from_str(
                &std::fs::read_to_string(request_path)
                    .with_context(|| format!("reading request {}", request_path.display()))?,
            )
            .context("parsing mutation request")?;
            let claims = parse_session(required::<String>(args, "session")?)?;

            let report = run_apply(Arc::clone(&store), config.orchestrator, claims, request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(path) = args.get_one::<PathBuf>("save") {
                save_fixture(&store, path)?;
            }
            std::process::exit(if report.succeeded() { 0 } else { 1 });
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

fn required<'a, T>(args: &'a clap::ArgMatches, name: &str) -> anyhow::Result<&'a T>
where
    T: std::any::Any + Clone + Send + Sync + 'static,
{
    args.get_one::<T>(name)
        .with_context(|| format!("missing --{name}"))
}
