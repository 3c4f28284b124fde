#[macro_use]
extern crate tracing;

mod args;
mod client_config;
mod dirs;

pub use args::Args;
pub use client_config::Resolution;
use color_eyre::Result;
pub use dirs::{
    get_config_dir,
    get_data_dir,
};
use eyre::Context as _;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
struct AppConfig {
    #[serde(default, skip_serializing)]
    data_dir: PathBuf,
    #[serde(default, skip_serializing)]
    config_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    app_config: AppConfig,
    /// Media session endpoint. `None` means the harness runs against the
    /// simulated in-memory session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<url::Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub audio_enabled: bool,
    #[serde(default)]
    pub video_enabled: bool,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub krisp: bool,
    #[serde(default)]
    pub output_volume: u8,
    #[serde(default)]
    pub duration: u64,
    /// Cadence of the speaking-activity poll, in milliseconds.
    #[serde(default)]
    pub speaking_poll_ms: u64,
    /// How long the echo-suppression window stays raised, in milliseconds.
    #[serde(default)]
    pub sync_guard_ms: u64,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl config::Source for Config {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        let mut cache = HashMap::<String, config::Value>::new();
        if let Some(endpoint) = &self.endpoint {
            cache.insert("endpoint".to_string(), endpoint.to_string().into());
        }
        if let Some(token) = &self.token {
            cache.insert("token".to_string(), token.clone().into());
        }
        cache.insert("username".to_string(), self.username.clone().into());
        cache.insert("channel".to_string(), self.channel.clone().into());
        cache.insert("audio_enabled".to_string(), self.audio_enabled.into());
        cache.insert("video_enabled".to_string(), self.video_enabled.into());
        cache.insert("resolution".to_string(), self.resolution.to_string().into());
        cache.insert("krisp".to_string(), self.krisp.into());
        cache.insert("output_volume".to_string(), (self.output_volume as u64).into());
        cache.insert("duration".to_string(), self.duration.into());
        cache.insert("speaking_poll_ms".to_string(), self.speaking_poll_ms.into());
        cache.insert("sync_guard_ms".to_string(), self.sync_guard_ms.into());
        Ok(cache)
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_str().unwrap_or("."))?
            .set_default("config_dir", config_dir.to_str().unwrap_or("."))?;

        builder = builder.add_source(Config::default());

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn save(&self) -> Result<()> {
        // Only save the parts that have changed from the default.
        let default = Self::default();
        let mut clone = self.clone();

        if self.endpoint == default.endpoint {
            clone.endpoint = None;
        }
        if self.token == default.token {
            clone.token = None;
        }

        std::fs::create_dir_all(&self.app_config.config_dir).context("Failed to create config directory")?;
        let path = self.app_config.config_dir.join("config.yaml");
        let content = serde_yml::to_string(&clone).context("Failed to serialize config")?;
        std::fs::write(&path, content).wrap_err_with(|| format!("Failed to write config to {:?}", path))
    }

    /// Updates the configuration based on optional command-line arguments.
    /// Saves the configuration if any changes were made.
    ///
    /// # Errors
    /// Returns an error if saving the updated configuration fails.
    #[instrument(level = "debug", skip(self, args))]
    pub fn update_from_args(&mut self, args: &Args) -> Result<()> {
        let mut changed = false;
        if let Some(endpoint) = &args.endpoint {
            if let Ok(endpoint) = url::Url::parse(endpoint) {
                if self.endpoint.as_ref().is_some_and(|u| u != &endpoint) {
                    info!(old = ?self.endpoint, new = ?endpoint, "Updating endpoint from args");
                    self.endpoint = Some(endpoint);
                    changed = true;
                }
            }
        }

        if let Some(channel) = &args.channel {
            if &self.channel != channel {
                info!(old = %self.channel, new = %channel, "Updating channel from args");
                self.channel = channel.clone();
                changed = true;
            }
        }

        if changed {
            debug!("Configuration updated from command-line arguments, saving...");
            self.save()?;
        } else {
            debug!("No configuration changes from command-line arguments.");
        }
        Ok(())
    }
}
