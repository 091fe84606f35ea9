use crate::{AsyncDevice, Error, Frame, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{
    multipart::{Form, Part},
    Client, ClientBuilder, StatusCode,
};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// A display server that accepts images over HTTP instead of a raw socket.
///
/// Each frame is posted to `{base}/use` as a `multipart/form-data` upload
/// with a single `file` field. Only `200 OK` counts as success.
#[derive(Debug, Clone)]
pub struct HttpDisplay {
    endpoint: String,
    client: Client,
}

impl HttpDisplay {
    pub fn new(base: &str) -> Result<Self> {
        let client = ClientBuilder::new().user_agent(APP_USER_AGENT).build()?;
        Ok(Self::with_client(base, client))
    }

    pub fn with_client(base: &str, client: Client) -> Self {
        let endpoint = format!("{}/use", base.trim_end_matches('/'));
        info!("Using display server at `{}`", endpoint);
        Self { endpoint, client }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AsyncDevice for HttpDisplay {
    async fn draw(&mut self, frame: &Frame) -> Result<()> {
        let part = Part::bytes(frame.as_bytes().to_vec())
            .file_name("image.png")
            .mime_str("image/png")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Posted {} byte frame to {}", frame.len(), self.endpoint);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
