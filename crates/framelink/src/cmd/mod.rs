use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use framelink_peer::{ConnectionManager, PeerConfig, ShutdownSignal};
use framelink_transport::Endpoint;

use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// Receive poll interval; bounds how long Ctrl-C waits on a quiet link.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long a blocked accept or connect gets to notice Ctrl-C before the
/// process exits anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Payload `send` repeats when none is given.
pub const DEFAULT_MESSAGE: &str = "This is my message! \n";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a payload repeatedly, reconnecting as needed.
    Send(SendArgs),
    /// Print every received payload.
    Listen(ListenArgs),
    /// Send every received payload back.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that opens a link.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Endpoint URL: tcp://host:port, udp://host:port, bt://AA:BB:CC:DD:EE:FF/channel.
    pub endpoint: Endpoint,
    /// Pause between connection attempts (e.g. 3s, 500ms).
    #[arg(long, env = "FRAMELINK_RETRY_DELAY", default_value = "3s")]
    pub retry_delay: String,
    /// Bound on one connect attempt.
    #[arg(long, env = "FRAMELINK_CONNECT_TIMEOUT", default_value = "10s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Pause between sends.
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Stop after N sends. Default: run until interrupted.
    #[arg(long)]
    pub count: Option<u64>,
    /// Bind the endpoint and wait for the peer instead of dialing it.
    #[arg(long)]
    pub listen: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after receiving N payloads.
    #[arg(long)]
    pub count: Option<u64>,
    /// Dial the endpoint instead of binding it.
    #[arg(long)]
    pub connect: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after echoing N payloads.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl LinkArgs {
    /// Peer configuration for the given role, with CLI polling applied.
    pub fn peer_config(&self, accept: bool) -> CliResult<PeerConfig> {
        let endpoint = self.endpoint.clone();
        let config = if accept {
            PeerConfig::acceptor(endpoint)
        } else {
            PeerConfig::initiator(endpoint)
        };
        Ok(config
            .with_retry_delay(parse_duration(&self.retry_delay)?)
            .with_connect_timeout(Some(parse_duration(&self.connect_timeout)?))
            .with_read_timeout(Some(POLL_INTERVAL)))
    }

    /// Build a manager whose shutdown signal is wired to Ctrl-C.
    pub fn manager(&self, accept: bool) -> CliResult<ConnectionManager> {
        launch(self.peer_config(accept)?)
    }
}

/// Start a manager for `config` with Ctrl-C wired to its shutdown signal.
pub fn launch(config: PeerConfig) -> CliResult<ConnectionManager> {
    let manager = ConnectionManager::new(config);
    install_shutdown_handler(manager.shutdown_signal())?;
    Ok(manager)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

fn install_shutdown_handler(signal: ShutdownSignal) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, shutting down");
        signal.trigger();
        // accept() and connect() cannot be interrupted from here.
        std::thread::sleep(SHUTDOWN_GRACE);
        std::process::exit(SUCCESS);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
