use crate::{
    providers::{ArtworkProvider, ArtworkStream},
    settings::SpotifySettings,
};
use async_stream::stream;
use display64_music::{CurrentlyPlaying, NowPlaying, UpstreamError};
use log::{error, info};
use reqwest::{header, Client, ClientBuilder, StatusCode, Url};
use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[derive(Debug, Error)]
pub enum PollError {
    #[error("provider is not authorized")]
    Unauthorized,
    #[error("currently playing request: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Follows the album artwork of whatever plays on the user's Spotify account.
///
/// The provider is useless until the OAuth dance handed it an access token
/// through `Spotify::authorize`. Clones share that authorization.
#[derive(Debug, Clone)]
pub struct Spotify {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    endpoint: String,
    interval: Duration,
    fallback_url: String,
    authorization_url: Option<String>,
    client: RwLock<Option<Client>>,
}

impl Spotify {
    pub const NAME: &'static str = "Spotify";

    pub fn new(settings: &SpotifySettings, fallback_url: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint: settings.endpoint.clone(),
                interval: settings.poll_interval(),
                fallback_url: fallback_url.to_owned(),
                authorization_url: authorization_url(settings),
                client: RwLock::new(None),
            }),
        }
    }

    /// Installs the client used for polling. Any previous token is replaced.
    pub fn authorize(&self, access_token: &str) -> anyhow::Result<()> {
        let mut bearer = header::HeaderValue::from_str(&format!("Bearer {access_token}"))?;
        bearer.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer);

        let client = ClientBuilder::new()
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .build()?;

        *self
            .inner
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(client);
        info!("Spotify provider authorized");
        Ok(())
    }

    fn client(&self) -> Option<Client> {
        self.inner
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Asks Spotify once for the current artwork.
    pub async fn fetch(&self) -> Result<String, PollError> {
        let client = self.client().ok_or(PollError::Unauthorized)?;
        let response = client.get(&self.inner.endpoint).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status == StatusCode::NO_CONTENT {
            return Ok(self.inner.fallback_url.clone());
        }

        match CurrentlyPlaying::parse(&body)? {
            NowPlaying::Artwork(url) => Ok(url),
            NowPlaying::Idle if status.is_success() => Ok(self.inner.fallback_url.clone()),
            NowPlaying::Idle => Err(UpstreamError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("empty error response")
                    .to_owned(),
            }
            .into()),
        }
    }
}

fn authorization_url(settings: &SpotifySettings) -> Option<String> {
    if settings.client_id.is_empty() {
        return None;
    }
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", settings.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", settings.redirect_uri.as_str()),
            ("scope", settings.scopes.as_str()),
            ("state", "state"),
            ("access_type", "offline"),
        ],
    )
    .ok()
    .map(String::from)
}

impl ArtworkProvider for Spotify {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn authorized(&self) -> bool {
        self.client().is_some()
    }

    fn authorization_url(&self) -> Option<String> {
        self.inner.authorization_url.clone()
    }

    fn stream(&self, cancel: CancellationToken) -> ArtworkStream {
        let this = self.clone();
        Box::pin(stream! {
            info!("Polling Spotify every {:?}", this.inner.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = time::sleep(this.inner.interval) => {}
                }
                // Errors are not worth a backoff, the next poll is soon enough
                match this.fetch().await {
                    Ok(url) => yield url,
                    Err(e) => error!("Failed to get currently playing artwork: {}", e),
                }
            }
            info!("Stopped polling Spotify");
        })
    }
}
