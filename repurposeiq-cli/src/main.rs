//! repurposeiq CLI - pharmaceutical intelligence backend
//!
//! Entry point for the repurposeiq command-line tool, which provides:
//! - HTTP API server (`serve` subcommand)
//! - Database initialization and seeding (`db` subcommand)
//! - One-shot queries through the agent pipeline (`ask` subcommand)
//! - Shell completion generation (`completions` subcommand)

use std::io;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::info;

use repurposeiq_agents::{AgentContext, MasterAgent};
use repurposeiq_core::Settings;
use repurposeiq_llm::{GroqClient, TavilyClient};
use repurposeiq_server::db::{create_pool, schema};
use repurposeiq_server::{run_server, ServerConfig};

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "repurposeiq",
    author,
    version,
    about = "Multi-agent pharmaceutical intelligence backend",
    long_about = "Route natural-language pharma questions across market, patent, clinical, \
                  trade and web agents, serve the REST API, and manage the local database."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),
    /// Database operations (init creates tables and seed data)
    Db(DbArgs),
    /// Ask a single question through the full agent pipeline
    Ask(AskArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address to bind to (default: 127.0.0.1:3030)
    #[arg(long, short = 'b', default_value = "127.0.0.1:3030")]
    bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    cors_permissive: bool,
}

#[derive(Parser, Debug)]
struct DbArgs {
    #[command(subcommand)]
    command: DbCommands,
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Create tables and seed demo data (idempotent)
    Init,
}

#[derive(Parser, Debug)]
struct AskArgs {
    /// The question to route through the agents
    query: String,

    /// Print the full response as JSON instead of the answer text
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    shell: Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(cli.debug)?;

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Db(args) => match args.command {
            DbCommands::Init => db_init().await,
        },
        Commands::Ask(args) => ask(args).await,
        Commands::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "repurposeiq", &mut io::stdout());
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let pool = create_pool(&settings.database_url)
        .await
        .context("Failed to create database pool")?;

    info!("Starting repurposeiq server on {}", args.bind);
    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    run_server(pool, settings, config)
        .await
        .context("Server error")?;
    Ok(())
}

async fn db_init() -> Result<()> {
    let settings = Settings::from_env()?;
    let pool = create_pool(&settings.database_url)
        .await
        .context("Failed to create database pool")?;
    schema::init(&pool)
        .await
        .context("Failed to initialize schema")?;
    info!("database initialized at {}", settings.database_url);
    Ok(())
}

async fn ask(args: AskArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let pool = create_pool(&settings.database_url)
        .await
        .context("Failed to create database pool")?;
    schema::init(&pool)
        .await
        .context("Failed to initialize schema")?;

    let ctx = AgentContext {
        pool,
        groq: GroqClient::new(settings.groq_api_key.clone(), settings.groq_model.clone()),
        tavily: TavilyClient::new(settings.tavily_api_key.clone()),
    };
    let master = MasterAgent::new(ctx);
    let response = master.answer(&args.query, &[], None).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.answer);
        if response.demo_mode {
            eprintln!("\n[demo mode: set GROQ_API_KEY for live synthesis]");
        }
    }
    Ok(())
}
