use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Social platform a post can be distributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
    LinkedIn,
    TikTok,
    YouTube,
}

impl Platform {
    /// All platforms known to the system.
    pub const ALL: [Platform; 6] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::TikTok,
        Platform::YouTube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "twitter" => Ok(Self::Twitter),
            "linkedin" => Ok(Self::LinkedIn),
            "tiktok" => Ok(Self::TikTok),
            "youtube" => Ok(Self::YouTube),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_platform() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("LinkedIn".parse::<Platform>(), Ok(Platform::LinkedIn));
    }

    #[test]
    fn parse_rejects_unknown_platform() {
        assert!("myspace".parse::<Platform>().is_err());
    }
}
