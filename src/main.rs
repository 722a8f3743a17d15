use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use abacus::agent::HttpTaskClient;
use abacus::config::Config;
use abacus::core::{calc, ExpressionDag};
use abacus::orchestration::{Orchestrator, WorkerPool};
use abacus::{alog, alog_error, server, Result};

/// Abacus - distributed arithmetic expression evaluator
#[derive(Parser, Debug)]
#[command(name = "abacus")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    ABACUS_DEBUG=1             Enable debug logging (alternative to --debug)\n    PORT, COMPUTING_POWER, ORCHESTRATOR_URL, QUEUE_CAPACITY\n    TIME_ADDITION_MS, TIME_SUBTRACTION_MS,\n    TIME_MULTIPLICATIONS_MS, TIME_DIVISIONS_MS"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file (defaults to ~/.abacus/abacus.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the orchestrator HTTP service
    Serve {
        /// Listen port (overrides PORT)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Also run a worker pool inside this process
        #[arg(long)]
        embedded_workers: bool,
    },

    /// Run a worker agent against a remote orchestrator
    Agent {
        /// Orchestrator base URL (overrides ORCHESTRATOR_URL)
        #[arg(long)]
        url: Option<String>,

        /// Number of concurrent workers (overrides COMPUTING_POWER)
        #[arg(long, short = 'w')]
        workers: Option<usize>,
    },

    /// Evaluate an expression locally and print the result
    Calc {
        /// The arithmetic expression
        expression: String,
    },

    /// Show how an expression decomposes into operations
    Plan {
        /// The arithmetic expression
        expression: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.clone() {
        Command::Calc { expression } => {
            abacus::log::init(cli.debug, None);
            run_calc(&expression)
        }
        Command::Plan { expression } => {
            abacus::log::init(cli.debug, None);
            run_plan(&expression)
        }
        Command::Serve {
            port,
            embedded_workers,
        } => {
            let mut config = load_config(&cli)?;
            if let Some(port) = port {
                config.port = port;
            }
            config.embedded_workers |= embedded_workers;
            run_serve(config)
        }
        Command::Agent { url, workers } => {
            let mut config = load_config(&cli)?;
            if let Some(url) = url {
                config.orchestrator_url = url;
            }
            if let Some(workers) = workers {
                config.computing_power = workers;
            }
            config.validate()?;
            run_agent(config)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::load(cli.config.as_deref())?;
    abacus::log::init(cli.debug, config.log_path());
    Ok(config)
}

fn run_calc(expression: &str) -> Result<()> {
    let value = calc::evaluate(expression)?;
    println!("{}", value);
    Ok(())
}

fn run_plan(expression: &str) -> Result<()> {
    let dag = ExpressionDag::parse(expression)?;

    if dag.node_count() == 0 {
        println!("No operations; result is {}", dag.root());
        return Ok(());
    }

    println!("{} operation(s):", dag.node_count());
    for node in dag.topological_order()? {
        let deps = dag.dependencies(node.id);
        if deps.is_empty() {
            println!("  {}", node);
        } else {
            let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
            println!("  {}    (after {})", node, deps.join(", "));
        }
    }
    println!("root: {}", dag.root());
    Ok(())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                alog!("Interrupt received, shutting down");
                token.cancel();
            }
            Err(e) => alog_error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn run_serve(config: Config) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let orchestrator = Orchestrator::new(&config);
        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());

        let pool = if config.embedded_workers {
            Some(WorkerPool::from_config(&config, Arc::new(orchestrator.clone())).spawn())
        } else {
            None
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let served = server::serve(orchestrator.clone(), addr, shutdown.clone()).await;
        if let Err(e) = &served {
            alog_error!("HTTP server failed: {}", e);
        }

        if let Some(pool) = pool {
            pool.shutdown_and_join().await;
        }
        orchestrator.shutdown().await;
        alog!("Orchestrator stopped");
        served
    })
}

fn run_agent(config: Config) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let client = HttpTaskClient::from_config(&config)?;
        alog!(
            "Agent starting with {} worker(s) against {}",
            config.computing_power,
            client.base_url()
        );

        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());

        let pool = WorkerPool::from_config(&config, Arc::new(client)).spawn();
        shutdown.cancelled().await;
        pool.shutdown_and_join().await;
        alog!("Agent stopped");
        Ok(())
    })
}
