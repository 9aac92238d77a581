//! Ask questions about a database from the terminal
//!
//! Run with: cargo run --bin ask -- [OPTIONS] [QUESTION]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use askdb_assistant::{
    config::Config,
    db::{self, DatabaseType},
    llm::{create_provider, LlmReasoner},
    workflow::AssistantContext,
    Answer, Assistant,
};

#[derive(Parser)]
#[command(author, version, about = "Ask a database questions in plain language", long_about = None)]
struct Cli {
    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Provider to use (mock, anthropic, openai); defaults to LLM_PROVIDER
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use; defaults to LLM_MODEL
    #[arg(short, long)]
    model: Option<String>,

    /// SQLite database file; overrides DATABASE_TYPE/SQLITE_PATH
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Maximum number of reformulations before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Print the schema description and exit
    #[arg(long)]
    show_schema: bool,

    /// Question to ask; reads questions from stdin when omitted
    question: Option<String>,
}

fn print_answer(answer: &Answer) -> Result<()> {
    let output = json!({
        "outcome": answer.outcome,
        "answer": answer.state.query_result,
        "sql": answer.state.sql_query,
        "rows": answer.state.query_rows,
        "attempts": answer.state.attempts,
        "steps": answer.trace.visited,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load()?;
    if let Some(provider) = cli.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(path) = cli.sqlite {
        config.database.db_type = DatabaseType::Sqlite;
        config.database.sqlite_path = Some(path);
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.workflow.max_attempts = max_attempts;
    }
    config.validate()?;

    let database = db::connect(&config.database).await?;
    let reasoner = Arc::new(LlmReasoner::new(create_provider(&config.llm)?)?);
    let context = AssistantContext::from_database(reasoner, database).await?;

    if cli.show_schema {
        println!("{}", context.schema);
        return Ok(());
    }

    let assistant = Assistant::new(context, &config.workflow)?;

    if let Some(question) = cli.question {
        let answer = assistant.ask(&question).await?;
        return print_answer(&answer);
    }

    let stdin = io::stdin();
    loop {
        print!("question> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        match assistant.ask(question).await {
            Ok(answer) => print_answer(&answer)?,
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
