use clap::Parser;

/// Campfire call simulation harness
#[derive(Parser, Debug, Clone)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Optional session endpoint URL to override the stored configuration.
    #[clap(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Optional session token to override the stored configuration.
    #[clap(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Display name announced through the presence channel.
    #[clap(long, value_name = "NAME")]
    pub username: Option<String>,

    /// Voice channel to join.
    #[clap(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Join with the microphone enabled.
    #[clap(long = "audio", action)]
    pub audio_enabled: Option<bool>,

    /// Join with the camera enabled.
    #[clap(long = "video", action)]
    pub video_enabled: Option<bool>,

    /// How long the scripted scenario runs, in seconds.
    #[clap(long, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Enables debug logging.
    #[clap(long = "debug", action)]
    pub debug: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(endpoint) = &self.endpoint {
                cache.insert("endpoint".to_string(), endpoint.clone().into());
            }
            if let Some(token) = &self.token {
                cache.insert("token".to_string(), token.clone().into());
            }
            if let Some(username) = &self.username {
                cache.insert("username".to_string(), username.clone().into());
            }
            if let Some(channel) = &self.channel {
                cache.insert("channel".to_string(), channel.clone().into());
            }
            if let Some(audio_enabled) = &self.audio_enabled {
                cache.insert("audio_enabled".to_string(), (*audio_enabled).into());
            }
            if let Some(video_enabled) = &self.video_enabled {
                cache.insert("video_enabled".to_string(), (*video_enabled).into());
            }
            if let Some(duration) = &self.duration {
                cache.insert("duration".to_string(), (*duration).into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "\
Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}
