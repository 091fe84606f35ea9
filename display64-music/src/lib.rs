mod player;
pub use player::{CurrentlyPlaying, NowPlaying, UpstreamError};
