use anyhow::{bail, Result};
use config::{Config, Environment, File};
use display64_hardware::RetryPolicy;
use serde::Deserialize;
#[cfg(feature = "simulator")]
use std::path::PathBuf;
use std::time::Duration;

/// Shown whenever nothing better is available.
pub const FALLBACK_ARTWORK: &str = "https://hc-cdn.hel1.your-objectstorage.com/s/v3/81ddba41db872a37a630dbb071f57ba4f916b019_image.png";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    /// Name of the provider started at boot.
    pub provider: String,
    pub display: DisplaySettings,
    pub fallback: FallbackSettings,
    pub spotify: SpotifySettings,
    #[cfg(feature = "simulator")]
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Length prefixed PNGs over a raw socket to `display.address`.
    Tcp,
    /// Multipart uploads to `{display.url}/use`.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub transport: Transport,
    pub address: String,
    pub url: String,
    pub retries: u32,
    pub backoff_base: f64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            transport: Transport::Tcp,
            address: String::from("127.0.0.1:14366"),
            url: String::from("http://127.0.0.1:8000"),
            retries: 10,
            backoff_base: 1.3,
        }
    }
}

impl DisplaySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries,
            base: self.backoff_base,
            ..RetryPolicy::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub url: String,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            url: String::from(FALLBACK_ARTWORK),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub endpoint: String,
    pub poll_interval_ms: u64,
    pub access_token: Option<String>,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: String::from("https://127.0.0.1:9000/api/v1/spotify/redirect"),
            scopes: String::from("user-read-playback-state"),
            endpoint: String::from("https://api.spotify.com/v1/me/player/currently-playing"),
            poll_interval_ms: 1700,
            access_token: None,
        }
    }
}

impl SpotifySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(feature = "simulator")]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Every frame the simulator receives overwrites this file.
    pub output: PathBuf,
}

#[cfg(feature = "simulator")]
impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from("simulator.png"),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings = Config::default();
        // Add in `$USER_CONFIG_DIR/display64/settings.toml`
        if let Some(user_config_dir) = dirs::config_dir() {
            settings.merge(
                File::with_name(&user_config_dir.join("display64/settings").to_string_lossy())
                    .required(false),
            )?;
        }
        settings
            // Add in `./settings.toml`
            .merge(File::with_name("settings").required(false))?
            // Add in settings from the environment (with a prefix of DISPLAY64)
            // Eg.. `DISPLAY64_DISPLAY__ADDRESS=10.0.0.2:14366` sets `display.address`
            .merge(Environment::with_prefix("DISPLAY64").separator("__"))?;

        Self::from_config(settings)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let mut settings: Self = config.try_into()?;
        if settings.provider.is_empty() {
            settings.provider = String::from(crate::providers::Fallback::NAME);
        }
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.spotify.client_id.is_empty() {
            bail!("missing required setting `spotify.client_id` (or DISPLAY64_SPOTIFY__CLIENT_ID)");
        }
        if self.display.retries == 0 {
            bail!("`display.retries` must allow at least one attempt");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Result<Settings> {
        let mut config = Config::default();
        config.merge(File::from_str(toml, FileFormat::Toml))?;
        Settings::from_config(config)
    }

    #[test]
    fn defaults_fill_in_missing_keys() {
        let settings = parse(
            r#"
            [spotify]
            client_id = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(settings.provider, "None");
        assert_eq!(settings.display.transport, Transport::Tcp);
        assert_eq!(settings.display.address, "127.0.0.1:14366");
        assert_eq!(settings.display.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.fallback.url, FALLBACK_ARTWORK);
        assert_eq!(settings.spotify.poll_interval(), Duration::from_millis(1700));
        assert!(settings.spotify.access_token.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = parse(
            r#"
            provider = "Spotify"

            [display]
            transport = "http"
            url = "http://matrix.local:8000"
            retries = 3
            backoff_base = 2.0

            [spotify]
            client_id = "abc"
            poll_interval_ms = 1500
            access_token = "token"
            "#,
        )
        .unwrap();

        assert_eq!(settings.provider, "Spotify");
        assert_eq!(settings.display.transport, Transport::Http);
        assert_eq!(settings.display.url, "http://matrix.local:8000");
        assert_eq!(settings.display.retry_policy().attempts, 3);
        assert_eq!(settings.spotify.poll_interval(), Duration::from_millis(1500));
        assert_eq!(settings.spotify.access_token.as_deref(), Some("token"));
    }

    #[test]
    fn missing_client_id_is_fatal() {
        assert!(parse("debug = true").is_err());
    }

    #[test]
    fn zero_retries_are_rejected() {
        let toml = r#"
            [display]
            retries = 0

            [spotify]
            client_id = "abc"
        "#;
        assert!(parse(toml).is_err());
    }
}
