use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use string_analyzer_api::{InterpretedQuery, StringAnalyzerApi};
use string_analyzer_core::interpret_query;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "stra")]
#[command(about = "String analyzer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a string and print its derived properties as JSON.
    Analyze { value: String },
    /// Translate a natural-language query into structured filters.
    Interpret { query: String },
}

#[derive(Debug, Serialize)]
struct CliEnvelope<T>
where
    T: Serialize,
{
    cli_contract_version: &'static str,
    data: T,
}

fn print_json<T>(data: T) -> Result<()>
where
    T: Serialize,
{
    let envelope = CliEnvelope { cli_contract_version: CLI_CONTRACT_VERSION, data };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { value } => {
            // A fresh store never rejects its first insert, so `create`
            // doubles as a stateless analyze-and-shape call here.
            let record = StringAnalyzerApi::new().create(&value)?;
            print_json(record)
        }
        Command::Interpret { query } => {
            let (original, parsed_filters) = interpret_query(&query)?;
            print_json(InterpretedQuery { original, parsed_filters })
        }
    }
}
