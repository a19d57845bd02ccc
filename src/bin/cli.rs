//! modemchat CLI - drive an AT modem from the command line
//!
//! Runs single commands, the GSM check suite, and SMS sends against a serial
//! modem, and encodes SMS PDUs offline.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use futures::FutureExt;
use modemchat_core::cli::{format_output, print_exit_codes, CliResult, ExitCodes, OutputFormat};
use modemchat_core::config::{default_config_path, AppConfig, ConfigError, LoggingConfig};
use modemchat_core::core::device::ResetKind;
use modemchat_core::core::logger::{LogFormat, Transcript};
use modemchat_core::core::protocol::{Command, ModemError, Pdu};
use modemchat_core::core::session::ModemSession;
use modemchat_core::core::suite::{GsmSuite, Reporter, Section, SuiteContext, SuiteError};
use modemchat_core::core::transport::{list_ports, SerialFlowControl, TransportError};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_serial::SerialStream;
use tracing_subscriber::EnvFilter;

/// modemchat CLI
#[derive(Parser, Debug)]
#[command(
    name = "modemchat",
    version,
    about = "AT command engine and GSM modem check suite",
    long_about = None
)]
struct Cli {
    /// Configuration file (default: <config dir>/config.toml)
    #[arg(short, long, global = true, env = "MODEMCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Verbose output (debug logs, modem traffic)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Device options, each overriding the configuration file
#[derive(clap::Args, Debug, Clone)]
struct DeviceArgs {
    /// Serial device (e.g. /dev/ttySAC0, /dev/ttyUSB2)
    #[arg(short, long, env = "MODEMCHAT_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, env = "MODEMCHAT_BAUD")]
    baud: Option<u32>,

    /// Flow control (none, hw, sw)
    #[arg(long, env = "MODEMCHAT_FLOW")]
    flow: Option<SerialFlowControl>,

    /// Per-byte read timeout (seconds)
    #[arg(short, long, env = "MODEMCHAT_TIMEOUT")]
    timeout: Option<u64>,

    /// Reset sequence before talking to the modem (none, calypso)
    #[arg(long, env = "MODEMCHAT_RESET")]
    reset: Option<ResetKind>,

    /// Sysfs directory of the modem power controls
    #[arg(long, env = "MODEMCHAT_SYSFS_DIR")]
    sysfs_dir: Option<PathBuf>,

    /// Record all modem traffic to this file
    #[arg(long, env = "MODEMCHAT_TRANSCRIPT")]
    transcript: Option<PathBuf>,

    /// Record a timestamped transcript in the log directory
    #[arg(long)]
    record: bool,

    /// Transcript format (text, hex, json)
    #[arg(long)]
    transcript_format: Option<LogFormat>,
}

impl DeviceArgs {
    fn apply(&self, config: &mut AppConfig) {
        let device = &mut config.device;
        if let Some(port) = &self.port {
            device.port = port.clone();
        }
        if let Some(baud) = self.baud {
            device.baud_rate = baud;
        }
        if let Some(flow) = self.flow {
            device.flow_control = flow;
        }
        if let Some(timeout) = self.timeout {
            device.read_timeout_secs = timeout;
        }
        if let Some(reset) = self.reset {
            device.reset = reset;
        }
        if let Some(dir) = &self.sysfs_dir {
            device.sysfs_dir = dir.clone();
        }
        if let Some(path) = &self.transcript {
            config.logging.transcript = Some(path.clone());
        }
        if self.record {
            config.logging.record = true;
        }
        if let Some(format) = self.transcript_format {
            config.logging.transcript_format = format;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Send AT commands and print the parsed answers
    Chat {
        #[command(flatten)]
        device: DeviceArgs,

        /// Run the initialization chat (AT, ATE0, ATZ, AT+CMEE=2) first
        #[arg(long)]
        init: bool,

        /// Commands, with or without the AT prefix (e.g. +CFUN? or AT+CGMM)
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Run the GSM check suite
    Suite {
        #[command(flatten)]
        device: DeviceArgs,

        /// Number to call and text
        #[arg(long, env = "MODEMCHAT_NUMBER")]
        number: Option<String>,

        /// Contact expected on the SIM, as name:number
        #[arg(long, env = "MODEMCHAT_SIM_CONTACT")]
        sim_contact: Option<String>,

        /// Only run these sections (basics, contacts, network, call, sms, pdu-sms)
        #[arg(long, value_delimiter = ',')]
        only: Vec<Section>,

        /// Answer yes to every operator question
        #[arg(short, long)]
        yes: bool,
    },

    /// Send an SMS
    Sms {
        #[command(flatten)]
        device: DeviceArgs,

        /// Recipient
        number: String,

        /// Message text
        text: String,

        /// Send in PDU mode instead of text mode
        #[arg(long)]
        pdu: bool,
    },

    /// Encode an SMS-SUBMIT PDU without touching the modem
    Pdu {
        /// Recipient
        number: String,

        /// Message text
        #[arg(default_value = "hello")]
        text: String,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the exit code table
    ExitCodes,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return CliResult::from(&e).to_exit_code();
        }
    };
    init_tracing(&cli, &config.logging);
    tracing::debug!("modemchat v{}", env!("CARGO_PKG_VERSION"));

    let result = match run(&cli, config).await {
        Ok(result) => result,
        Err(e) => exit_result(&e),
    };

    match &result {
        CliResult::Success(Some(msg)) if !cli.quiet => println!("{}", msg),
        CliResult::Error(_, msg) => eprintln!("error: {}", msg),
        _ => {}
    }
    result.to_exit_code()
}

fn config_path(cli: &Cli) -> Result<PathBuf, ConfigError> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => default_config_path(),
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    AppConfig::load_from(&config_path(cli)?)
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if cli.log_json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Map an error chain to an exit code
fn exit_result(err: &anyhow::Error) -> CliResult {
    let message = format!("{:#}", err);
    let code = if let Some(e) = err.downcast_ref::<SuiteError>() {
        CliResult::from(e).code()
    } else if let Some(e) = err.downcast_ref::<ModemError>() {
        CliResult::from(e).code()
    } else if let Some(e) = err.downcast_ref::<TransportError>() {
        CliResult::from(e).code()
    } else if let Some(e) = err.downcast_ref::<ConfigError>() {
        CliResult::from(e).code()
    } else {
        ExitCodes::ERROR
    };
    CliResult::error(code, message)
}

async fn run(cli: &Cli, mut config: AppConfig) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::ListPorts { detailed } => show_ports(cli, *detailed),
        Commands::Chat {
            device,
            init,
            commands,
        } => {
            device.apply(&mut config);
            chat(cli, &config, *init, commands).await
        }
        Commands::Suite {
            device,
            number,
            sim_contact,
            only,
            yes,
        } => {
            device.apply(&mut config);
            if number.is_some() {
                config.suite.callable_number = number.clone();
            }
            if sim_contact.is_some() {
                config.suite.sim_contact = sim_contact.clone();
            }
            run_suite(cli, &config, only, *yes).await
        }
        Commands::Sms {
            device,
            number,
            text,
            pdu,
        } => {
            device.apply(&mut config);
            send_sms(cli, &config, number, text, *pdu).await
        }
        Commands::Pdu { number, text } => encode_pdu(cli, number, text),
        Commands::Config { action } => handle_config(cli, &config, action),
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn show_ports(cli: &Cli, detailed: bool) -> anyhow::Result<CliResult> {
    let ports = list_ports()?;

    if ports.is_empty() {
        if !cli.quiet {
            println!("No serial ports found.");
        }
        return Ok(CliResult::success());
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            for port in &ports {
                if detailed {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                } else {
                    println!("{}", port.port_name);
                }
            }
        }
    }
    Ok(CliResult::success())
}

/// Open the configured device, attach the transcript and run the reset
async fn open_session(config: &AppConfig) -> anyhow::Result<ModemSession<SerialStream>> {
    let serial = config.device.serial_config();
    let opened = ModemSession::open(&serial);
    if let Err(ModemError::Transport(e)) = &opened {
        if e.is_port_not_found() {
            tracing::info!("run `modemchat list-ports` to see the available ports");
        }
    }
    let mut session = opened.with_context(|| format!("opening {}", serial.connection_info()))?;

    if let Some(path) = config.logging.transcript_path() {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let transcript = Transcript::to_file(&path, config.logging.transcript_format)
            .with_context(|| format!("opening transcript {}", path.display()))?;
        if let Some(path) = transcript.path() {
            tracing::info!("recording transcript to {}", path.display());
        }
        session = session.with_transcript(transcript);
    }

    let mut reset = config.device.reset.build(&config.device.sysfs_dir);
    session.reset_with(reset.as_mut()).await.context("resetting modem")?;
    Ok(session)
}

fn parse_command(text: &str) -> Command {
    let name = match text.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("AT") => &text[2..],
        _ => text,
    };
    Command::new(name)
}

async fn chat(cli: &Cli, config: &AppConfig, init: bool, commands: &[String]) -> anyhow::Result<CliResult> {
    let mut session = open_session(config).await?;
    if init {
        session.initialize().await.context("initializing modem")?;
    }

    for text in commands {
        let command = parse_command(text);
        let value = session
            .chat(&command)
            .await
            .with_context(|| format!("sending {}", command))?;
        match cli.format {
            OutputFormat::Text if !cli.quiet => println!("{}: {}", command, value),
            OutputFormat::Json => println!("{}", format_output(&value, cli.format)),
            _ => {}
        }
    }

    session.close().await?;
    Ok(CliResult::success())
}

async fn send_sms(
    cli: &Cli,
    config: &AppConfig,
    number: &str,
    text: &str,
    pdu: bool,
) -> anyhow::Result<CliResult> {
    let mut session = open_session(config).await?;
    session.initialize().await.context("initializing modem")?;

    let policy = config.suite.sms_retry.policy();
    let sent = if pdu {
        let pdu = Pdu::submit(number, text).map_err(ModemError::from)?;
        policy
            .run(&mut session, |s| {
                let pdu = pdu.clone();
                async move { s.send_pdu_sms(&pdu).await }.boxed()
            })
            .await
    } else {
        policy
            .run(&mut session, |s| {
                let number = number.to_string();
                let text = text.to_string();
                async move { s.send_text_sms(&number, &text).await }.boxed()
            })
            .await
    };
    let reference = sent.context("sending SMS")?;

    session.close().await?;
    Ok(CliResult::success_with_message(format_output(&reference, cli.format)))
}

async fn run_suite(cli: &Cli, config: &AppConfig, only: &[Section], yes: bool) -> anyhow::Result<CliResult> {
    let session = open_session(config).await?;
    let reporter = ConsoleReporter {
        auto_confirm: yes,
        quiet: cli.quiet,
    };
    let ctx = SuiteContext::new(config.suite.settings(), reporter);
    let mut suite = GsmSuite::new(session, ctx);

    let sections = if only.is_empty() { &Section::ALL[..] } else { only };
    let outcome = suite.run(sections).await;
    let (mut session, _) = suite.into_parts();
    if let Err(e) = session.close().await {
        tracing::warn!("closing modem: {}", e);
    }
    let report = outcome?;

    println!("{}", format_output(&report, cli.format));
    if report.is_success() {
        Ok(CliResult::success())
    } else {
        Ok(CliResult::error(
            ExitCodes::ERROR,
            format!("{} check(s) failed", report.failed),
        ))
    }
}

fn encode_pdu(cli: &Cli, number: &str, text: &str) -> anyhow::Result<CliResult> {
    let pdu = Pdu::submit(number, text).map_err(ModemError::from)?;
    let output = match cli.format {
        OutputFormat::Text => format!("AT+CMGS={}\n{}", pdu.tpdu_length(), pdu),
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "length": pdu.tpdu_length(),
            "pdu": pdu.to_hex(),
        }))?,
    };
    println!("{}", output);
    Ok(CliResult::success())
}

fn handle_config(cli: &Cli, config: &AppConfig, action: &ConfigAction) -> anyhow::Result<CliResult> {
    let path = config_path(cli)?;
    match action {
        ConfigAction::Show => {
            let rendered = match cli.format {
                OutputFormat::Text => toml::to_string_pretty(config).map_err(ConfigError::from)?,
                OutputFormat::Json => serde_json::to_string_pretty(config)?,
            };
            println!("{}", rendered);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Ok(CliResult::error(
                    ExitCodes::CONFIG_ERROR,
                    format!("{} already exists (use --force)", path.display()),
                ));
            }
            AppConfig::default().save_to(&path)?;
            return Ok(CliResult::success_with_message(format!("wrote {}", path.display())));
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(CliResult::success())
}

/// Prints suite outcomes, asks the operator on stdin
struct ConsoleReporter {
    auto_confirm: bool,
    quiet: bool,
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn info(&mut self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    async fn check(&mut self, ok: bool, description: &str) {
        if !ok || !self.quiet {
            println!("[{}] {}", if ok { " OK " } else { "FAIL" }, description);
        }
    }

    async fn fail(&mut self, message: &str) {
        println!("[FAIL] {}", message);
    }

    async fn operator_confirm(&mut self, question: &str) -> bool {
        if self.auto_confirm {
            println!("[ ?? ] {} (assumed yes)", question);
            return true;
        }
        println!("[ ?? ] {} [y/N]", question);

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                tracing::warn!("reading operator answer: {}", e);
                false
            }
        }
    }
}
