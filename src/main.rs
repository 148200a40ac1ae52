// shell-gateway - Main Entry Point
//
// - MCP stdio server exposing the shell_execute tool (default)
// - One-shot execution for scripts and debugging
// - Optional Prometheus metrics endpoint
//
// stdout carries protocol or result output only; all logs go to stderr.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shell_gateway::config::Config;
use shell_gateway::mcp::{self, McpServer, ShellTool};
use shell_gateway::metrics_server;
use shell_gateway::tools::{CommandRequest, ExecutionGateway};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// shell-gateway: allowlisted command execution for MCP clients
#[derive(Parser, Debug)]
#[command(name = "shell-gateway")]
#[command(version)]
#[command(about = "Run allowlisted commands on behalf of MCP clients", long_about = None)]
struct Args {
    /// Comma-separated list of permitted commands (overrides ALLOW_COMMANDS)
    #[arg(long, global = true, value_name = "COMMANDS")]
    allow: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_parser = ["compact", "pretty", "json"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP requests on stdin/stdout (default)
    Serve,
    /// Run a single command through the gateway and print the result as JSON
    Exec {
        /// Working directory for the command
        #[arg(short, long)]
        directory: String,

        /// Text passed to the command's stdin
        #[arg(long)]
        stdin: Option<String>,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Program and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Print the effective allowlist
    Allowed,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(list) = &args.allow {
        config.override_allowed_commands(list);
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
    config.validate().context("Invalid configuration")?;

    init_tracing(&config)?;
    debug!(
        "Effective configuration: {}",
        serde_json::to_string(&config).context("Failed to serialize configuration")?
    );

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Exec {
            directory,
            stdin,
            timeout,
            command,
        } => {
            let mut request = CommandRequest::new(command, directory);
            request.stdin = stdin;
            request.timeout = timeout;
            exec(config, request).await
        }
        Commands::Allowed => {
            for command in &config.allowed_commands {
                println!("{}", command);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Install the global tracing subscriber, writing to stderr
fn init_tracing(config: &Config) -> Result<()> {
    let level = config.log_level()?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

/// Run the MCP server until the client disconnects or we are interrupted
async fn serve(config: Config) -> Result<()> {
    info!(
        "shell-gateway v{} starting, allowed commands: [{}]",
        env!("CARGO_PKG_VERSION"),
        config.allowed_commands.join(", ")
    );
    if config.allowed_commands.is_empty() {
        warn!("No commands are allowed; every request will be rejected");
    }

    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server(port).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let gateway = ExecutionGateway::new(config.allowlist());
    let server = McpServer::new(ShellTool::new(gateway));
    let (reader, writer) = mcp::stdio();

    tokio::select! {
        result = server.serve(reader, writer) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    info!("shell-gateway stopped");
    Ok(())
}

/// Run one request and print its record; exit status reflects whether it carried an error
async fn exec(config: Config, request: CommandRequest) -> Result<ExitCode> {
    let gateway = ExecutionGateway::new(config.allowlist());
    let result = gateway.handle(&request).await;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    println!("{}", json);

    Ok(if result.error().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
