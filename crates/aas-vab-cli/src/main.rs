//! # AAS VAB CLI
//!
//! Serves one submodel from memory and executes access verbs against it.
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use std::env;
use std::io::Read;
use tracing_subscriber::EnvFilter;

mod command;
mod config;
mod demo;
mod session;

use command::Command;
use config::CliConfig;
use session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "read" | "write" | "create" | "delete" | "invoke" => {
            let command = Command::from_args(&args[1..])?;
            let session = Session::open(&CliConfig::from_env()?)?;
            let result = session.execute(&command).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: aas-vab run <script|->");
                std::process::exit(1);
            }
            let script = read_script(&args[2])?;
            let session = Session::open(&CliConfig::from_env()?)?;
            let failures = session.run_script(&script, &mut std::io::stdout()).await?;
            if failures > 0 {
                tracing::warn!(failures, "Script finished with failures");
                std::process::exit(1);
            }
        }
        "demo" => {
            let config = CliConfig {
                submodel_file: None,
                ..CliConfig::from_env()?
            };
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "Running walkthrough on the demo submodel"
            );
            let session = Session::open(&config)?;
            demo::run(session.provider(), &mut std::io::stdout()).await?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn read_script(source: &str) -> Result<String> {
    if source == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("Failed to read script from stdin")?;
        return Ok(script);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read script {source}"))
}

fn print_help() {
    println!(
        r#"AAS VAB CLI

USAGE:
    aas-vab <COMMAND> [ARGS]

COMMANDS:
    read <path>               Read at a path
    write <path> <json>       Write a value at a path
    create <path> <json>      Create an element at a path
    delete <path>             Delete at a path
    invoke <path> [json...]   Invoke an operation (append ?async=true to run it in the background)
    run <script|->            Execute one command per line; scripts may also `sleep <ms>`
    demo                      Walk through the demo submodel
    help                      Show this help message

ENVIRONMENT:
    VAB_SUBMODEL_FILE         JSON submodel to serve instead of the demo submodel
    VAB_ASYNC_TIMEOUT_MS      Wait bound for asynchronous invocations (> 0)
    VAB_RESULT_RETENTION_MS   How long unpolled results are kept (0 keeps them)
    RUST_LOG                  Log filter (default: info)

EXAMPLES:
    aas-vab read submodel/values
    aas-vab write submodel/submodelElements/root/count/value 42
    aas-vab invoke submodel/submodelElements/sub/invoke 10 6
    printf 'invoke submodel/submodelElements/slowAdd/invoke?async=true 1 2\nsleep 300\n' | aas-vab run -
"#
    );
}
