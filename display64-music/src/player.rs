use serde::Deserialize;
use thiserror::Error;

/// What the music service reports as playing right now, reduced to the part
/// the display cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NowPlaying {
    /// Nothing is playing.
    Idle,
    /// URL of the album artwork of the current track.
    Artwork(String),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("music service returned an error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("no artwork in currently playing item")]
    MissingArtwork,
    #[error("decode currently playing response: {0}")]
    Malformed(#[from] serde_json::Error),
}

// This is nowhere near the whole response, only what leads to the artwork
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    item: Option<Item>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Item {
    #[serde(default)]
    album: Album,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Album {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Image {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    message: String,
}

impl CurrentlyPlaying {
    /// Interprets a raw response body. An empty body is how the service
    /// says that nothing is playing.
    pub fn parse(body: &[u8]) -> Result<NowPlaying, UpstreamError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(NowPlaying::Idle);
        }
        serde_json::from_slice::<Self>(body)?.artwork()
    }

    pub fn artwork(self) -> Result<NowPlaying, UpstreamError> {
        if let Some(error) = self.error.filter(|e| !e.message.is_empty()) {
            return Err(UpstreamError::Api {
                status: error.status,
                message: error.message,
            });
        }

        // The first image is the largest one
        self.item
            .and_then(|item| item.album.images.into_iter().next())
            .map(|image| image.url)
            .filter(|url| !url.is_empty())
            .map(NowPlaying::Artwork)
            .ok_or(UpstreamError::MissingArtwork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_means_idle() {
        assert_eq!(CurrentlyPlaying::parse(b"").unwrap(), NowPlaying::Idle);
        assert_eq!(CurrentlyPlaying::parse(b" \n").unwrap(), NowPlaying::Idle);
    }

    #[test]
    fn picks_first_album_image() {
        let body = br#"{
            "is_playing": true,
            "item": {
                "name": "So What",
                "album": {
                    "name": "Kind of Blue",
                    "images": [
                        {"url": "https://i.scdn.co/image/640", "height": 640, "width": 640},
                        {"url": "https://i.scdn.co/image/300", "height": 300, "width": 300},
                        {"url": "https://i.scdn.co/image/64", "height": 64, "width": 64}
                    ]
                }
            }
        }"#;

        assert_eq!(
            CurrentlyPlaying::parse(body).unwrap(),
            NowPlaying::Artwork("https://i.scdn.co/image/640".into())
        );
    }

    #[test]
    fn error_payload_is_reported() {
        let body = br#"{"error": {"status": 401, "message": "The access token expired"}}"#;
        match CurrentlyPlaying::parse(body) {
            Err(UpstreamError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "The access token expired");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_images_are_reported() {
        for body in [
            &br#"{"item": {"album": {"images": []}}}"#[..],
            br#"{"item": null}"#,
            br#"{"item": {"album": {"images": [{"url": ""}]}}}"#,
            br#"{"currently_playing_type": "ad"}"#,
        ] {
            assert!(matches!(
                CurrentlyPlaying::parse(body),
                Err(UpstreamError::MissingArtwork)
            ));
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            CurrentlyPlaying::parse(b"<html>"),
            Err(UpstreamError::Malformed(_))
        ));
    }
}
