use std::fmt;

use serde::{Deserialize, Serialize};

/// Chat platform a message was received from or is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Twitch,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitch => "TWITCH",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw protocol line together with the platform it belongs to.
///
/// Messages are moved between pipeline stages and never mutated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub platform: Platform,
    pub raw: String,
}

impl Message {
    pub fn new(platform: Platform, raw: impl Into<String>) -> Self {
        Self {
            platform,
            raw: raw.into(),
        }
    }

    pub fn twitch(raw: impl Into<String>) -> Self {
        Self::new(Platform::Twitch, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_platform_in_upper_case() {
        let msg = Message::twitch("PRIVMSG #chan :hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"platform":"TWITCH","raw":"PRIVMSG #chan :hi"}"#);
    }
}
