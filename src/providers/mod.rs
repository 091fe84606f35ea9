pub(crate) mod fallback;
pub(crate) mod spotify;

pub use fallback::Fallback;
pub use spotify::Spotify;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// A lazy sequence of candidate artwork URLs.
pub type ArtworkStream = BoxStream<'static, String>;

/// Something that knows which image should be on the display.
pub trait ArtworkProvider {
    fn name(&self) -> &'static str;

    /// Whether the provider has everything it needs to produce images.
    fn authorized(&self) -> bool;

    /// Where a user has to go to authorize the provider, if anywhere.
    fn authorization_url(&self) -> Option<String> {
        None
    }

    /// Starts a fresh sequence of URLs. The stream ends on its own or once
    /// `cancel` fires, checked between two emissions.
    fn stream(&self, cancel: CancellationToken) -> ArtworkStream;
}

#[derive(Debug, Clone)]
pub enum Provider {
    Fallback(Fallback),
    Spotify(Spotify),
}

impl ArtworkProvider for Provider {
    fn name(&self) -> &'static str {
        match self {
            Self::Fallback(p) => p.name(),
            Self::Spotify(p) => p.name(),
        }
    }

    fn authorized(&self) -> bool {
        match self {
            Self::Fallback(p) => p.authorized(),
            Self::Spotify(p) => p.authorized(),
        }
    }

    fn authorization_url(&self) -> Option<String> {
        match self {
            Self::Fallback(p) => p.authorization_url(),
            Self::Spotify(p) => p.authorization_url(),
        }
    }

    fn stream(&self, cancel: CancellationToken) -> ArtworkStream {
        match self {
            Self::Fallback(p) => p.stream(cancel),
            Self::Spotify(p) => p.stream(cancel),
        }
    }
}

impl From<Fallback> for Provider {
    fn from(inner: Fallback) -> Self {
        Self::Fallback(inner)
    }
}

impl From<Spotify> for Provider {
    fn from(inner: Spotify) -> Self {
        Self::Spotify(inner)
    }
}
