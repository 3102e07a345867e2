use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Account tier which determines the messaging limits the platform enforces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateMode {
    /// Regular account with the smallest limits.
    #[default]
    #[serde(rename = "USER", alias = "standard")]
    Standard,
    /// Known bot account.
    #[serde(rename = "KNOWN", alias = "elevated")]
    Elevated,
    /// Verified bot account.
    #[serde(rename = "VERIFIED", alias = "verified")]
    Verified,
}

/// The four limits of a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimits {
    /// Channel messages per 30 seconds.
    pub broadcast_per_30s: u32,
    /// Direct messages per second.
    pub direct_per_second: u32,
    /// Direct messages per minute.
    pub direct_per_minute: u32,
    /// Distinct direct-message recipients per calendar day.
    pub unique_direct_targets_per_day: usize,
}

impl RateMode {
    pub const ALL: [RateMode; 3] = [RateMode::Standard, RateMode::Elevated, RateMode::Verified];

    pub fn limits(self) -> RateLimits {
        match self {
            RateMode::Standard => RateLimits {
                broadcast_per_30s: 20,
                direct_per_second: 3,
                direct_per_minute: 100,
                unique_direct_targets_per_day: 40,
            },
            RateMode::Elevated => RateLimits {
                broadcast_per_30s: 50,
                direct_per_second: 10,
                direct_per_minute: 200,
                unique_direct_targets_per_day: 500,
            },
            RateMode::Verified => RateLimits {
                broadcast_per_30s: 7500,
                direct_per_second: 20,
                direct_per_minute: 1200,
                unique_direct_targets_per_day: 100_000,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RateMode::Standard => "USER",
            RateMode::Elevated => "KNOWN",
            RateMode::Verified => "VERIFIED",
        }
    }
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" | "STANDARD" => Ok(RateMode::Standard),
            "KNOWN" | "ELEVATED" => Ok(RateMode::Elevated),
            "VERIFIED" => Ok(RateMode::Verified),
            other => Err(Error::Config(format!("unknown rate mode: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table_matches_platform_limits() {
        let got: Vec<_> = RateMode::ALL
            .iter()
            .map(|m| {
                let l = m.limits();
                (
                    l.broadcast_per_30s,
                    l.direct_per_second,
                    l.direct_per_minute,
                    l.unique_direct_targets_per_day,
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![(20, 3, 100, 40), (50, 10, 200, 500), (7500, 20, 1200, 100_000)]
        );
    }

    #[test]
    fn parses_platform_names_and_aliases() {
        assert_eq!("USER".parse::<RateMode>().unwrap(), RateMode::Standard);
        assert_eq!("known".parse::<RateMode>().unwrap(), RateMode::Elevated);
        assert_eq!(" Verified ".parse::<RateMode>().unwrap(), RateMode::Verified);
        assert_eq!("elevated".parse::<RateMode>().unwrap(), RateMode::Elevated);
    }

    #[test]
    fn unknown_tier_is_an_error() {
        let err = "PARTNER".parse::<RateMode>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
