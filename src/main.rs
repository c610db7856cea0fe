//! CLI for queuecat
//!
//! Subcommands:
//! - `export`: write the messages of a queue to a file or stdout
//! - `copy`: republish messages to another queue, leaving them on the source
//! - `move`: republish messages to another queue and acknowledge them

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use queuecat::broker::AmqpConnector;
use queuecat::config::{Settings, load_config};
use queuecat::utils::logging;
use queuecat::{Commands, DrainConfig, OutputFormat, QueueDeclaration, Result};

#[derive(Parser)]
#[command(
    name = "queuecat",
    version,
    about = "Move and export messages from and to a RabbitMQ"
)]
struct Cli {
    /// Config file (defaults to config/default.* plus QUEUECAT__* env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// RabbitMQ host name
    #[arg(long, global = true)]
    host: Option<String>,

    /// RabbitMQ port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// RabbitMQ username
    #[arg(long, global = true)]
    username: Option<String>,

    /// RabbitMQ password
    #[arg(long, global = true)]
    password: Option<String>,

    /// RabbitMQ virtual host
    #[arg(long, global = true)]
    vhost: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the messages from a RabbitMQ queue to stdout or a file
    Export {
        queue: String,

        /// Auto ACK the messages after they are exported
        #[arg(long)]
        auto_ack: bool,

        /// Declare the queue with this durability before consuming
        #[arg(long)]
        durable: Option<bool>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Copy messages from one queue to another one
    ///
    /// The messages processed are also written to a file (or stdout if no
    /// file is given). They stay on the origin queue.
    Copy {
        origin: String,
        destination: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Move messages from one queue to another one
    ///
    /// Both queues are declared first. The messages processed are also
    /// written to a file (or stdout if no file is given).
    Move {
        origin: String,
        destination: String,

        /// Durable property for the queues
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        durable: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output file for messages (no value for stdout)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Messages to process (0 keeps waiting for messages)
    #[arg(long, default_value_t = 0)]
    count: usize,

    /// Prefetch value for the consumer
    #[arg(long)]
    prefetch: Option<u16>,

    /// Prefix for the message list
    #[arg(long, alias = "formatPrefix")]
    format_prefix: Option<String>,

    /// Separator between messages
    #[arg(long, alias = "formatSeparator")]
    format_separator: Option<String>,

    /// Post-fix for the message list
    #[arg(long, alias = "formatPostfix")]
    format_postfix: Option<String>,
}

impl OutputArgs {
    fn into_drain_config(self, settings: &Settings, auto_ack: bool) -> DrainConfig {
        let defaults = &settings.drain;
        DrainConfig {
            prefetch: self.prefetch.unwrap_or(defaults.prefetch),
            count: self.count,
            auto_ack,
            format: OutputFormat {
                prefix: self.format_prefix.unwrap_or_else(|| defaults.prefix.clone()),
                separator: self
                    .format_separator
                    .unwrap_or_else(|| defaults.separator.clone()),
                postfix: self
                    .format_postfix
                    .unwrap_or_else(|| defaults.postfix.clone()),
            },
            output: self.file,
        }
    }
}

impl Cli {
    /// Applies the connection flags on top of the loaded settings.
    fn apply_overrides(&mut self, settings: &mut Settings) {
        let conn = &mut settings.connection;
        if let Some(host) = self.host.take() {
            conn.host = host;
        }
        if let Some(port) = self.port {
            conn.port = port;
        }
        if let Some(username) = self.username.take() {
            conn.username = username;
        }
        if let Some(password) = self.password.take() {
            conn.password = password;
        }
        if let Some(vhost) = self.vhost.take() {
            conn.vhost = vhost;
        }
        if let Some(level) = self.log_level.take() {
            settings.log.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // logging may not be initialised yet when the config fails to load
            eprintln!("queuecat: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mut cli: Cli) -> Result<()> {
    let mut settings = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    logging::init(&settings.log.level);

    let commands = Commands::new(AmqpConnector::new(), settings.connection.clone());

    match cli.command {
        Command::Export {
            queue,
            auto_ack,
            durable,
            output,
        } => {
            let declaration = durable
                .map(|durable| QueueDeclaration::Declare { durable })
                .unwrap_or_default();
            let config = output.into_drain_config(&settings, auto_ack);
            commands.export(&queue, &config, declaration).await?;
        }
        Command::Copy {
            origin,
            destination,
            output,
        } => {
            let config = output.into_drain_config(&settings, false);
            commands
                .copy_or_move(&origin, &destination, &config, QueueDeclaration::Skip)
                .await?;
        }
        Command::Move {
            origin,
            destination,
            durable,
            output,
        } => {
            let config = output.into_drain_config(&settings, true);
            commands
                .copy_or_move(
                    &origin,
                    &destination,
                    &config,
                    QueueDeclaration::Declare { durable },
                )
                .await?;
        }
    }

    Ok(())
}
