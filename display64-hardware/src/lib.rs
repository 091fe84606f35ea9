mod connection;
mod device;
mod error;
#[cfg(feature = "http")]
mod http;
mod tcp;

pub use connection::{Connection, Connector, RetryPolicy, TcpConnector};
pub use device::{AsyncDevice, Frame, DISPLAY_HEIGHT, DISPLAY_WIDTH};
pub use error::{Error, Result};
#[cfg(feature = "http")]
pub use http::HttpDisplay;
pub use image::Rgba;
pub use tcp::{read_frame, TcpDisplay, MAX_FRAME_LEN};
