use std::time::Duration;

use clap::{Args, Subcommand};
use shadowstream_frame::{FrameConfig, DEFAULT_MAX_MESSAGE};
use shadowstream_session::SessionConfig;
use shadowstream_transport::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod names;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print decoded samples from the data stream.
    Stream(StreamArgs),
    /// Print the node name map announced by the data service.
    Names(NamesArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Stream(args) => stream::run(args, format),
        Command::Names(args) => names::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// IP address or host name of the Shadow app.
    #[arg(long, env = "SHADOWSTREAM_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Port of the Configurable data service.
    #[arg(long, env = "SHADOWSTREAM_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Maximum time to wait for the first message after connecting (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub handshake_timeout: String,
    /// Largest message accepted from the service, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE)]
    pub max_message_size: usize,
}

impl ConnectionArgs {
    pub fn session_config(&self) -> CliResult<SessionConfig> {
        Ok(SessionConfig {
            endpoint: Endpoint::new(self.host.clone(), self.port),
            handshake_timeout: Some(parse_duration(&self.handshake_timeout)?),
            frame: FrameConfig {
                max_message_size: self.max_message_size,
            },
            ..SessionConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Channels to request for every node (comma-separated, e.g. Lq,c).
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,
    /// Also stream skeleton nodes that have no sensor attached.
    #[arg(long, requires = "channels")]
    pub inactive: bool,
    /// Exit after printing N samples.
    #[arg(long)]
    pub count: Option<u64>,
    /// Maximum time to wait for each message (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Exit on the first malformed sample instead of skipping it.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct NamesArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Request these channels and print the map announced in response.
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,
    /// Include skeleton nodes that have no sensor attached.
    #[arg(long, requires = "channels")]
    pub inactive: bool,
    /// Maximum time to wait for each message (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn connection_args_build_session_config() {
        let args = ConnectionArgs {
            host: "10.0.0.5".to_string(),
            port: 4000,
            handshake_timeout: "250ms".to_string(),
            max_message_size: 1024,
        };
        let config = args.session_config().unwrap();

        assert_eq!(config.endpoint, Endpoint::new("10.0.0.5", 4000));
        assert_eq!(config.handshake_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.frame.max_message_size, 1024);
        assert!(config.connect_timeout.is_some());
    }
}
