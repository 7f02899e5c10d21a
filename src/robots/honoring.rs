use crate::config::RobotsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy for choosing which robots.txt sections apply to the crawler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HonoringKind {
    /// Obey the first section whose agent token matches our user-agent
    #[default]
    Classic,
    /// Fetch nothing from robots.txt and allow everything
    Ignore,
    /// Apply operator-supplied robots.txt text to every host, classic matching
    Custom,
    /// Allowed if any section of the file allows
    MostFavored,
    /// Allowed if any section matching a configured agent allows
    MostFavoredSet,
}

impl HonoringKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Ignore => "ignore",
            Self::Custom => "custom",
            Self::MostFavored => "most-favored",
            Self::MostFavoredSet => "most-favored-set",
        }
    }
}

impl fmt::Display for HonoringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved honoring settings handed to policy evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct HonoringPolicy {
    pub kind: HonoringKind,
    /// Overwrite the request user-agent with the matched section token
    pub masquerade: bool,
    /// Agents tested by `MostFavoredSet`, lowercased
    pub user_agents: Vec<String>,
    /// Text applied to every host by `Custom`
    pub custom_robots: Option<String>,
}

impl HonoringPolicy {
    pub fn new(kind: HonoringKind) -> Self {
        Self {
            kind,
            masquerade: false,
            user_agents: Vec::new(),
            custom_robots: None,
        }
    }

    pub fn from_config(config: &RobotsConfig) -> Self {
        Self {
            kind: config.honoring_policy,
            masquerade: config.masquerade,
            user_agents: config
                .user_agents
                .iter()
                .map(|agent| agent.to_lowercase())
                .collect(),
            custom_robots: config.custom_robots.clone(),
        }
    }

    pub fn with_masquerade(mut self, masquerade: bool) -> Self {
        self.masquerade = masquerade;
        self
    }

    pub fn with_user_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.user_agents = agents
            .into_iter()
            .map(|agent| agent.as_ref().to_lowercase())
            .collect();
        self
    }
}

impl Default for HonoringPolicy {
    fn default() -> Self {
        Self::new(HonoringKind::Classic)
    }
}
