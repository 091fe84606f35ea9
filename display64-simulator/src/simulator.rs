use anyhow::{anyhow, Result};
use display64_hardware::{read_frame, Frame};
use log::{error, info, warn};
use std::net::SocketAddr;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};

/// Stands in for the LED matrix: accepts the length prefixed frames a
/// `TcpDisplay` sends and hands every valid frame to a channel.
///
/// Like the real matrix server it talks to one client at a time and picks up
/// the next one once the current client hangs up.
#[derive(Debug)]
pub struct Simulator {
    address: SocketAddr,
    _handle: JoinHandle<()>,
}

impl Simulator {
    pub async fn bind(address: &str, sender: mpsc::Sender<Frame>) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let address = listener.local_addr()?;
        info!("Display simulator listening on {}", address);

        let handle = tokio::spawn(async move {
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Display simulator failed to accept: {}", e);
                        continue;
                    }
                };
                info!("Display simulator connected by {}", peer);

                match serve(socket, &sender).await {
                    Ok(()) => info!("Connection with {} closed", peer),
                    Err(e) => warn!("Connection with {} dropped: {}", peer, e),
                }

                if sender.is_closed() {
                    break;
                }
            }
        });

        Ok(Self {
            address,
            _handle: handle,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

async fn serve(mut socket: TcpStream, sender: &mpsc::Sender<Frame>) -> Result<()> {
    while let Some(frame) = read_frame(&mut socket).await? {
        let image = frame.decode()?;
        info!(
            "Received {} byte frame ({}x{})",
            frame.len(),
            image.width(),
            image.height()
        );
        sender
            .send(frame)
            .await
            .map_err(|_| anyhow!("frame receiver is gone"))?;
    }
    Ok(())
}
