#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![deny(
    missing_debug_implementations,
    nonstandard_style,
    missing_copy_implementations,
    unused_qualifications
)]

use anyhow::Result;
use display64_hardware::{AsyncDevice, Connection, TcpDisplay};
use log::{debug, info, warn, LevelFilter};
use simplelog::{Config as LoggerConfig, SimpleLogger};
use tokio::sync::broadcast;

mod providers;
mod render;
mod settings;

use crate::{
    providers::{Fallback, Provider, Spotify},
    render::{pipeline::Pipeline, scheduler::Scheduler},
    settings::{DisplaySettings, Settings, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Shutdown,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    let settings = Settings::load()?;

    let level = if settings.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::init(level, LoggerConfig::default())?;

    // This channel is used to tell the main task to wind everything down
    let (tx, mut rx) = broadcast::channel::<Command>(4);

    #[cfg(feature = "simulator")]
    let _simulator = simulator::spawn(&settings).await?;

    let device = connect_display(&settings.display)?;
    let pipeline = Pipeline::new(device)?;

    let spotify = Spotify::new(&settings.spotify, &settings.fallback.url);
    if let Some(token) = &settings.spotify.access_token {
        spotify.authorize(token)?;
    }
    let providers: Vec<Provider> = vec![
        Fallback::new(settings.fallback.url.clone()).into(),
        spotify.into(),
    ];
    let scheduler = Scheduler::new(providers, pipeline);

    if let Err(e) = scheduler.start_by_name(&settings.provider).await {
        warn!("Can't start {}: {}, showing the fallback", settings.provider, e);
        scheduler.start_by_name(Fallback::NAME).await?;
    }

    for provider in scheduler.list() {
        if let Some(url) = provider.authorization_url.filter(|_| !provider.authorized) {
            info!("Authorize {} at {}", provider.name, url);
        }
    }

    if settings.debug {
        let mut shown = scheduler.subscribe();
        tokio::spawn(async move {
            while let Ok(url) = shown.recv().await {
                debug!("Display now shows {}", url);
            }
        });
    }

    ctrlc::set_handler(move || {
        info!("Ctrl + C received, shutting down!");
        if tx.send(Command::Shutdown).is_err() {
            warn!("Nobody is listening for the shutdown signal");
        }
    })?;

    while let Ok(command) = rx.recv().await {
        match command {
            Command::Shutdown => break,
        }
    }

    if let Some(url) = scheduler.last_image() {
        info!("Leaving {} on the display", url);
    }
    scheduler.shutdown().await;
    Ok(())
}

fn connect_display(settings: &DisplaySettings) -> Result<Box<dyn AsyncDevice>> {
    match settings.transport {
        Transport::Tcp => {
            info!("Talking to the display at {}", settings.address);
            let connection =
                Connection::new(settings.address.clone()).with_policy(settings.retry_policy());
            Ok(Box::new(TcpDisplay::from_connection(connection)))
        }
        #[cfg(feature = "http")]
        Transport::Http => {
            info!("Uploading to the display at {}", settings.url);
            Ok(Box::new(display64_hardware::HttpDisplay::new(&settings.url)?))
        }
        #[cfg(not(feature = "http"))]
        Transport::Http => {
            anyhow::bail!("the `http` transport needs the `http` feature")
        }
    }
}

#[cfg(feature = "simulator")]
mod simulator {
    use crate::settings::Settings;
    use anyhow::Result;
    use display64_hardware::Frame;
    use display64_simulator::Simulator;
    use log::{debug, error};
    use std::path::Path;
    use tokio::sync::mpsc;

    /// Runs a simulated matrix on the display address and mirrors every
    /// frame into a PNG file.
    pub async fn spawn(settings: &Settings) -> Result<Simulator> {
        let (tx, mut rx) = mpsc::channel::<Frame>(4);
        let simulator = Simulator::bind(&settings.display.address, tx).await?;
        let output = settings.simulator.output.clone();

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let output = output.clone();
                let saved = tokio::task::spawn_blocking(move || save(&frame, &output)).await;
                match saved {
                    Ok(Ok(())) => debug!("Simulator frame written"),
                    Ok(Err(e)) => error!("Failed to write simulator frame: {}", e),
                    Err(e) => error!("Simulator writer crashed: {}", e),
                }
            }
        });

        Ok(simulator)
    }

    fn save(frame: &Frame, output: &Path) -> Result<()> {
        frame.decode()?.save(output)?;
        Ok(())
    }
}
