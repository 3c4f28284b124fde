use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
};

/// Outgoing camera resolution for the local video publication.
#[derive(Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, PartialOrd)]
pub enum Resolution {
    #[default]
    #[strum(to_string = "720p")]
    #[serde(rename = "720p")]
    P720,
    #[strum(to_string = "1080p")]
    #[serde(rename = "1080p")]
    P1080,
    #[strum(to_string = "4k")]
    #[serde(rename = "4k")]
    P4K,
}

impl Resolution {
    pub fn next(&self) -> Self {
        use strum::IntoEnumIterator;
        let mut iter = Resolution::iter();
        iter.find(|x| x > self).unwrap_or(Resolution::P720)
    }

    pub fn previous(&self) -> Self {
        use strum::IntoEnumIterator;
        let mut iter = Resolution::iter().rev();
        iter.find(|x| x < self).unwrap_or(Resolution::P4K)
    }

    /// Pixel dimensions used when re-publishing the camera track.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::P720 => (1280, 720),
            Resolution::P1080 => (1920, 1080),
            Resolution::P4K => (3840, 2160),
        }
    }
}
