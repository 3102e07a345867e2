//! Wire rules of the Twitch IRC-over-WebSocket chat protocol.
//!
//! Everything here is a pure function over raw protocol lines so it can be
//! shared by the rate-limit pipeline and the session client.

use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_SERVER_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

pub const HEARTBEAT_PROBE: &str = "PING :tmi.twitch.tv";
pub const HEARTBEAT_REPLY: &str = "PONG :tmi.twitch.tv";

const DIRECT_KEYWORD: &str = "WHISPER";
const BROADCAST_KEYWORD: &str = "PRIVMSG";

/// Outbound message category, deciding which limiter branch applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Whisper addressed to a single user.
    Direct,
    /// Chat message into a channel.
    Broadcast,
}

fn direct_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Optional tags block, optional sender prefix, then the keyword.
    RE.get_or_init(|| {
        Regex::new(r"([@\w=:;]+ )?([:\w!@.]+ )?WHISPER(.*)?").expect("valid whisper regex")
    })
}

pub fn classify(raw: &str) -> Category {
    if direct_pattern().is_match(raw) {
        Category::Direct
    } else {
        Category::Broadcast
    }
}

/// Extract the first parameter after the whisper (or privmsg) keyword.
///
/// That is the user or channel the line is addressed to. Returns `None` when
/// neither keyword is present or nothing follows it.
pub fn recipient(raw: &str) -> Option<&str> {
    let (idx, keyword) = raw
        .find(DIRECT_KEYWORD)
        .map(|i| (i, DIRECT_KEYWORD))
        .or_else(|| raw.find(BROADCAST_KEYWORD).map(|i| (i, BROADCAST_KEYWORD)))?;

    // Skip the keyword and the single separating space.
    let start = idx + keyword.len() + 1;
    let rest = raw.get(start..)?;
    let end = rest.find(' ').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Split one transport frame into its non-blank protocol lines.
pub fn split_frame(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| line.chars().any(|c| c != ' '))
}

pub fn is_heartbeat_probe(line: &str) -> bool {
    line.ends_with(HEARTBEAT_PROBE)
}

/// Optional protocol extensions requested during the handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub membership: bool,
    pub tags: bool,
    pub commands: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            membership: true,
            tags: true,
            commands: true,
        }
    }

    /// Capability request lines, in membership, tags, commands order.
    pub fn request_lines(&self) -> Vec<String> {
        [
            (self.membership, "twitch.tv/membership"),
            (self.tags, "twitch.tv/tags"),
            (self.commands, "twitch.tv/commands"),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, cap)| format!("CAP REQ :{cap}"))
        .collect()
    }
}

pub fn credential_line(token: &str) -> String {
    if token.starts_with("oauth:") {
        format!("PASS {token}")
    } else {
        format!("PASS oauth:{token}")
    }
}

pub fn identity_line(name: &str) -> String {
    format!("NICK {name}")
}

pub fn join_line(channel: &str) -> String {
    format!("JOIN #{}", channel.trim_start_matches('#'))
}
