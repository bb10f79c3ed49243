use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for automatically sized worker pools, to spare the server.
pub const MAX_AUTO_WORKERS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Output box width in pixels.
    pub width: u32,
    /// Output box height in pixels.
    pub height: u32,
    pub padding: f64,
    pub background: String,
    pub node_size: f64,
    pub font_size: f64,
    pub show_interface_labels: bool,
    pub use_node_icons: bool,
    /// Keep the intermediate SVG next to the PNG.
    pub save_svg: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            padding: 40.0,
            background: "white".to_string(),
            node_size: 60.0,
            font_size: 12.0,
            show_interface_labels: true,
            use_node_icons: false,
            save_svg: false,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 {
            return Err(ConfigError::NotPositive("width"));
        }
        if self.height == 0 {
            return Err(ConfigError::NotPositive("height"));
        }
        if !(self.node_size.is_finite() && self.node_size > 0.0) {
            return Err(ConfigError::NotPositive("node size"));
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::NotPositive("font size"));
        }
        if !(self.padding.is_finite() && self.padding >= 0.0) {
            return Err(ConfigError::Padding);
        }
        let [_, _, _, alpha] = self.background_rgba()?;
        if alpha != u8::MAX {
            return Err(ConfigError::TranslucentBackground(self.background.clone()));
        }
        Ok(())
    }

    pub fn background_rgba(&self) -> Result<[u8; 4], ConfigError> {
        parse_color(&self.background)
    }

    /// Pixel size icons are rasterized at before being scaled into a node.
    pub fn icon_pixels(&self) -> u32 {
        (self.node_size * 1.2).round().max(1.0) as u32
    }
}

pub fn parse_color(value: &str) -> Result<[u8; 4], ConfigError> {
    csscolorparser::parse(value.trim())
        .map(|c| c.to_rgba8())
        .map_err(|_| ConfigError::Background(value.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(with = "secs")]
    pub api_timeout: Duration,
    #[serde(with = "secs")]
    pub file_timeout: Duration,
    #[serde(with = "secs")]
    pub symbol_timeout: Duration,
    #[serde(with = "secs")]
    pub fallback_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3080".to_string(),
            username: None,
            password: None,
            api_timeout: Duration::from_secs(30),
            file_timeout: Duration::from_secs(5),
            symbol_timeout: Duration::from_secs(10),
            fallback_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Credentials are only used when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workers {
    Auto,
    Fixed(usize),
}

impl Workers {
    pub fn resolve(self) -> usize {
        match self {
            Self::Auto => auto_detect_workers(true),
            Self::Fixed(n) => n,
        }
    }
}

impl FromStr for Workers {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        match trimmed.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Self::Fixed(n)),
            _ => Err(ConfigError::Workers(s.to_string())),
        }
    }
}

/// Worker count suited to the host. Network-bound jobs spend most of their
/// time waiting, so they get a multiple of the core count, capped at
/// [`MAX_AUTO_WORKERS`].
pub fn auto_detect_workers(io_bound: bool) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    if io_bound {
        (cpus * 4).min(MAX_AUTO_WORKERS)
    } else {
        cpus
    }
}

/// Default on-disk location for downloaded node symbols.
pub fn default_icon_cache_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    Some(base.join("gns3-snapshot").join("symbols"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct ConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    padding: Option<f64>,
    background: Option<String>,
    node_size: Option<f64>,
    font_size: Option<f64>,
    show_interface_labels: Option<bool>,
    use_node_icons: Option<bool>,
    save_svg: Option<bool>,
    server: Option<ServerFile>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerFile {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    api_timeout: Option<f64>,
    file_timeout: Option<f64>,
    symbol_timeout: Option<f64>,
    fallback_timeout: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub render: RenderConfig,
    pub client: ClientConfig,
}

/// Load settings from an optional JSON (or JSON5) file on top of the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let parsed: ConfigFile = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?,
    };

    let render = &mut config.render;
    if let Some(v) = parsed.width {
        render.width = v;
    }
    if let Some(v) = parsed.height {
        render.height = v;
    }
    if let Some(v) = parsed.padding {
        render.padding = v;
    }
    if let Some(v) = parsed.background {
        render.background = v;
    }
    if let Some(v) = parsed.node_size {
        render.node_size = v;
    }
    if let Some(v) = parsed.font_size {
        render.font_size = v;
    }
    if let Some(v) = parsed.show_interface_labels {
        render.show_interface_labels = v;
    }
    if let Some(v) = parsed.use_node_icons {
        render.use_node_icons = v;
    }
    if let Some(v) = parsed.save_svg {
        render.save_svg = v;
    }

    if let Some(server) = parsed.server {
        let client = &mut config.client;
        if let Some(v) = server.url {
            client.server_url = v.trim_end_matches('/').to_string();
        }
        if server.username.is_some() {
            client.username = server.username;
        }
        if server.password.is_some() {
            client.password = server.password;
        }
        let timeouts = [
            (server.api_timeout, &mut client.api_timeout),
            (server.file_timeout, &mut client.file_timeout),
            (server.symbol_timeout, &mut client.symbol_timeout),
            (server.fallback_timeout, &mut client.fallback_timeout),
        ];
        for (value, slot) in timeouts {
            if let Some(secs) = value {
                *slot = Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid timeout {secs} in {}", path.display()))?;
            }
        }
    }

    Ok(config)
}
