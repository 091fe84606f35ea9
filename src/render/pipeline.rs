use display64_hardware::{AsyncDevice, Frame, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use image::imageops::{self, FilterType};
use log::debug;
use reqwest::{Client, ClientBuilder};
use thiserror::Error;
use tokio::task::{self, JoinError};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch {url}: unexpected status {status}")]
    Status { url: String, status: u16 },
    #[error("decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("encode image: {0}")]
    Encode(#[source] display64_hardware::Error),
    #[error("send image to display: {0}")]
    Display(#[from] display64_hardware::Error),
    #[error("image worker: {0}")]
    Worker(#[from] JoinError),
}

/// Takes an image URL all the way to the display: download, decode, scale
/// down to the matrix, encode, send.
#[derive(Debug)]
pub struct Pipeline<D> {
    client: Client,
    device: D,
}

impl<D: AsyncDevice> Pipeline<D> {
    pub fn new(device: D) -> reqwest::Result<Self> {
        let client = ClientBuilder::new().user_agent(APP_USER_AGENT).build()?;
        Ok(Self::with_client(client, device))
    }

    pub fn with_client(client: Client, device: D) -> Self {
        Self { client, device }
    }

    pub async fn send(&mut self, url: &str) -> Result<(), PipelineError> {
        let bytes = fetch(&self.client, url).await?;
        // Decoding and resampling are CPU bound
        let frame = task::spawn_blocking(move || render(&bytes)).await??;
        self.device.draw(&frame).await?;
        debug!("Displayed {} ({} byte frame)", url, frame.len());
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), PipelineError> {
        self.device.shutdown().await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }
}

async fn fetch(client: &Client, url: &str) -> Result<Vec<u8>, PipelineError> {
    let fetch_error = |source| PipelineError::Fetch {
        url: url.to_owned(),
        source,
    };

    let response = client.get(url).send().await.map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    Ok(response.bytes().await.map_err(fetch_error)?.to_vec())
}

/// Turns an encoded image of any size and aspect ratio into a matrix frame.
/// The image is stretched to fill the whole matrix.
pub fn render(bytes: &[u8]) -> Result<Frame, PipelineError> {
    let image = image::load_from_memory(bytes).map_err(PipelineError::Decode)?;
    let thumb = imageops::resize(
        &image.to_rgba8(),
        DISPLAY_WIDTH,
        DISPLAY_HEIGHT,
        FilterType::CatmullRom,
    );
    Frame::encode(&thumb).map_err(PipelineError::Encode)
}
