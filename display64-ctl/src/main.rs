use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use display64_hardware::{AsyncDevice, Connection, Frame, RetryPolicy, Rgba, TcpDisplay};
use log::{info, LevelFilter};
use simplelog::{Config as LoggerConfig, SimpleLogger};

#[derive(Parser)]
#[clap(version = "1.0", author = "display64")]
struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Address of the matrix server
    #[arg(short, long, default_value = "127.0.0.1:14366")]
    address: String,
    /// How many times to try reaching the matrix server
    #[arg(short, long, default_value_t = 3)]
    retries: u32,
    #[command(subcommand)]
    subcmd: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Clear the LED matrix
    Clear,
    /// Fill the LED matrix with one color
    Fill {
        /// Color as `RRGGBB` hex
        #[arg(short, long, default_value = "ffffff", value_parser = parse_color)]
        color: Rgba<u8>,
    },
}

fn parse_color(hex: &str) -> Result<Rgba<u8>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return Err(anyhow!("expected six hex digits, got `{}`", hex));
    }
    let value = u32::from_str_radix(hex, 16)?;
    let [_, r, g, b] = value.to_be_bytes();
    Ok(Rgba([r, g, b, 255]))
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    let filter = match opts.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    SimpleLogger::init(filter, LoggerConfig::default())?;

    info!("Connecting to the matrix server at {}", opts.address);

    let connection = Connection::new(opts.address).with_policy(RetryPolicy {
        attempts: opts.retries.max(1),
        ..RetryPolicy::default()
    });
    let mut device = TcpDisplay::from_connection(connection);

    match opts.subcmd {
        SubCommand::Clear => device.clear().await?,
        SubCommand::Fill { color } => device.draw(&Frame::filled(color)?).await?,
    };

    device.shutdown().await?;

    Ok(())
}
