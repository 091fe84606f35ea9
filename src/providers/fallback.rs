use crate::providers::{ArtworkProvider, ArtworkStream};
use async_stream::stream;
use log::info;
use tokio_util::sync::CancellationToken;

/// Shows one fixed image and is done.
#[derive(Debug, Clone)]
pub struct Fallback {
    url: String,
}

impl Fallback {
    pub const NAME: &'static str = "None";

    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ArtworkProvider for Fallback {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn authorized(&self) -> bool {
        true
    }

    fn stream(&self, _cancel: CancellationToken) -> ArtworkStream {
        let url = self.url.clone();
        Box::pin(stream! {
            info!("Showing fallback artwork");
            yield url;
        })
    }
}
