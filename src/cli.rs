use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use ftplayback::{DispatchOrder, PlaybackConfig, Result};

#[derive(Parser, Debug)]
#[command(
    name = "ftplayback",
    version,
    about = "Play back a captured acquisition session through a FieldTrip buffer",
    long_about = "Replays the header, samples and events of a capture directory onto a buffer \
                  server, keeping the relative timing recorded in its 'timing' file."
)]
pub struct Cli {
    /// Capture directory containing header, samples, events and timing
    pub directory: PathBuf,

    /// Buffer host name [default: localhost]
    pub hostname: Option<String>,

    /// Buffer port [default: 1972]
    pub port: Option<u16>,

    /// YAML configuration file; flags and positional arguments take precedence
    #[arg(long, env = "FTPLAYBACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop at the first rejected or failed write
    #[arg(long)]
    pub strict: bool,

    /// Dispatch order of the timing file's operations
    #[arg(long, value_enum)]
    pub order: Option<OrderArg>,

    /// Playback speed multiplier
    #[arg(long)]
    pub speed: Option<f64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OrderArg {
    Script,
    Time,
}

impl From<OrderArg> for DispatchOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Script => DispatchOrder::Script,
            OrderArg::Time => DispatchOrder::Time,
        }
    }
}

impl Cli {
    /// Configuration file values overridden by whatever was given on the command line.
    pub fn playback_config(&self) -> Result<PlaybackConfig> {
        let mut config = match &self.config {
            Some(path) => PlaybackConfig::from_yaml_file(path)?,
            None => PlaybackConfig::default(),
        };

        if let Some(hostname) = &self.hostname {
            config.host = hostname.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.strict {
            config.strict = true;
        }
        if let Some(order) = self.order {
            config.order = order.into();
        }
        if let Some(speed) = self.speed {
            config.speed = speed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
