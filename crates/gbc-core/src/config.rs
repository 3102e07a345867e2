use std::{env, fs, path::Path, str::FromStr};

use crate::{
    errors::Error,
    modes::RateMode,
    protocol::Capabilities,
    session::{Credentials, SessionConfig},
    Result,
};

/// How the bridge binary prints received lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Raw,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "" => Ok(OutputFormat::Raw),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Config(format!("unknown output format: {other:?}"))),
        }
    }
}

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub session: SessionConfig,
    pub output: OutputFormat,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let name = get("TWITCH_NAME").ok_or_else(|| {
            Error::Config("TWITCH_NAME environment variable is required".to_string())
        })?;
        let token = get("TWITCH_TOKEN").ok_or_else(|| {
            Error::Config("TWITCH_TOKEN environment variable is required".to_string())
        })?;

        let mut session = SessionConfig::new(Credentials::new(name.trim(), token.trim()));

        if let Some(url) = get("TWITCH_SERVER") {
            session.server_url = url.trim().to_string();
        }

        // Channels default to the bot's own channel.
        let channels = parse_csv(get("TWITCH_CHANNELS"));
        if !channels.is_empty() {
            session.channels = channels;
        }

        session.capabilities = Capabilities {
            membership: get("TWITCH_MEMBERSHIP").map(parse_bool).unwrap_or(false),
            tags: get("TWITCH_TAGS").map(parse_bool).unwrap_or(false),
            commands: get("TWITCH_COMMANDS").map(parse_bool).unwrap_or(false),
        };

        session.mode = match get("TWITCH_RATE_MODE") {
            Some(mode) => mode.parse::<RateMode>()?,
            None => RateMode::default(),
        };

        let output = match get("GBC_OUTPUT") {
            Some(v) => v.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        };

        session.validate()?;

        Ok(Self { session, output })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in dotenv_pairs(&contents) {
        // Real environment wins over the file.
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }
}

/// `KEY=value` pairs of a dotenv file; comments and malformed lines are skipped.
fn dotenv_pairs(contents: &str) -> impl Iterator<Item = (&str, &str)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), strip_quotes(v.trim())))
        .filter(|(k, _)| !k.is_empty())
}

fn strip_quotes(val: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| {
            val.strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(val)
}

fn parse_bool(s: String) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().trim_start_matches('#').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::protocol::DEFAULT_SERVER_URL;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            ("TWITCH_NAME", "mo_blaa"),
            ("TWITCH_TOKEN", "oauth:abc"),
        ]))
        .unwrap();

        assert_eq!(cfg.session.server_url, DEFAULT_SERVER_URL);
        assert_eq!(cfg.session.channels, vec!["mo_blaa".to_string()]);
        assert_eq!(cfg.session.capabilities, Capabilities::default());
        assert_eq!(cfg.session.mode, RateMode::Standard);
        assert_eq!(cfg.output, OutputFormat::Raw);
    }

    #[test]
    fn full_config_is_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("TWITCH_NAME", "bot"),
            ("TWITCH_TOKEN", "abc"),
            ("TWITCH_SERVER", "ws://127.0.0.1:9000"),
            ("TWITCH_CHANNELS", "#one, two,,"),
            ("TWITCH_MEMBERSHIP", "yes"),
            ("TWITCH_TAGS", "0"),
            ("TWITCH_COMMANDS", "true"),
            ("TWITCH_RATE_MODE", "VERIFIED"),
            ("GBC_OUTPUT", "json"),
        ]))
        .unwrap();

        assert_eq!(cfg.session.server_url, "ws://127.0.0.1:9000");
        assert_eq!(cfg.session.channels, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(
            cfg.session.capabilities,
            Capabilities {
                membership: true,
                tags: false,
                commands: true,
            }
        );
        assert_eq!(cfg.session.mode, RateMode::Verified);
        assert_eq!(cfg.output, OutputFormat::Json);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = Config::from_lookup(lookup(&[("TWITCH_NAME", "bot")])).unwrap_err();
        assert!(err.to_string().contains("TWITCH_TOKEN"));
    }

    #[test]
    fn unknown_rate_mode_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TWITCH_NAME", "bot"),
            ("TWITCH_TOKEN", "abc"),
            ("TWITCH_RATE_MODE", "unlimited"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn dotenv_lines_are_parsed_into_pairs() {
        let contents = "# bot account\nTWITCH_NAME=bot\n\n  TWITCH_TOKEN = 'oauth:abc'  \nnot a pair\n=orphan\nTWITCH_CHANNELS=\"a,b\"\n";
        let pairs: Vec<_> = dotenv_pairs(contents).collect();
        assert_eq!(
            pairs,
            vec![
                ("TWITCH_NAME", "bot"),
                ("TWITCH_TOKEN", "oauth:abc"),
                ("TWITCH_CHANNELS", "a,b"),
            ]
        );
    }

    #[test]
    fn quotes_are_stripped_from_dotenv_values() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
    }
}
