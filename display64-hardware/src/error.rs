use std::io;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Every connection attempt failed.
    #[error("connect to display at {hostport} (gave up after {attempts} attempts): {source}")]
    Connect {
        hostport: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("display transport at {hostport}: {source}")]
    Io {
        hostport: String,
        #[source]
        source: io::Error,
    },
    #[cfg(feature = "http")]
    #[error("post image to display server: {0}")]
    Http(#[from] reqwest::Error),
    /// The display server answered with something other than `200 OK`.
    #[error("display server rejected image ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("frame must be {expected_width}x{expected_height}, got {width}x{height}")]
    Dimensions {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("encode frame: {0}")]
    Encode(#[source] image::ImageError),
}
