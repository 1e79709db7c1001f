use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownChoice;

/// One subscription link as collected from an input file.
///
/// `url` is the identity key; `name` is only a display label and may repeat until the
/// writers disambiguate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub name: String,
    pub url: String,

    /// Set when the source carried no name and it was derived from the URL.
    #[serde(skip)]
    pub name_inferred: bool,
}

impl SubscriptionEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            name_inferred: false,
        }
    }

    pub fn inferred(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name_inferred: true,
            ..Self::new(name, url)
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.url)
    }
}

/// Client application whose configuration files are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// One `<id>.json` file per subscription plus the `pm.json` group index.
    Nekobox,
    /// A single aggregated `subscribes.yaml`.
    Singbox,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Nekobox => "nekobox",
            Target::Singbox => "singbox",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nekobox" => Ok(Target::Nekobox),
            "singbox" => Ok(Target::Singbox),
            other => Err(UnknownChoice {
                value: other.to_string(),
                expected: "nekobox, singbox",
            }),
        }
    }
}

/// Shape of the records appended to the aggregated YAML file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStyle {
    /// Bare `{name, url}` records.
    Plain,
    /// Records carrying the bookkeeping fields the client expects on import.
    #[default]
    Enriched,
}

impl FromStr for AggregateStyle {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(AggregateStyle::Plain),
            "enriched" => Ok(AggregateStyle::Enriched),
            other => Err(UnknownChoice {
                value: other.to_string(),
                expected: "plain, enriched",
            }),
        }
    }
}

/// A named `User-Agent` value tried during verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAgent {
    pub name: String,
    pub value: String,
}

impl UserAgent {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Browser identity first, then the two proxy clients whose subscription endpoints
/// commonly gate on their own user agents.
pub fn default_user_agents() -> Vec<UserAgent> {
    vec![
        UserAgent::new(
            "chrome",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        ),
        UserAgent::new("clashmeta", "Clash-Verge/1.3.1"),
        UserAgent::new("singbox", "sing-box"),
    ]
}
