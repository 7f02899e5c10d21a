use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Three-tier scheduling priority within a queue
///
/// Variants are ordered from most to least urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingDirective {
    Expedite,
    Soon,
    #[default]
    Normal,
}

impl SchedulingDirective {
    /// Index of the queue tier this directive uses (0 is served first)
    pub fn tier(&self) -> usize {
        match self {
            Self::Expedite => 0,
            Self::Soon => 1,
            Self::Normal => 2,
        }
    }

    /// Returns the more urgent of the two directives
    pub fn at_least(self, other: SchedulingDirective) -> SchedulingDirective {
        self.min(other)
    }
}

/// One step of the discovery path from a seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hop {
    /// Navigational link
    Link,
    /// Embedded resource (image, script, stylesheet)
    Embed,
    /// HTTP redirect
    Redirect,
    /// Prerequisite such as robots.txt
    Prerequisite,
    /// Speculative link found in script or text
    Speculative,
}

impl Hop {
    pub fn as_char(&self) -> char {
        match self {
            Self::Link => 'L',
            Self::Embed => 'E',
            Self::Redirect => 'R',
            Self::Prerequisite => 'P',
            Self::Speculative => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'L' => Some(Self::Link),
            'E' => Some(Self::Embed),
            'R' => Some(Self::Redirect),
            'P' => Some(Self::Prerequisite),
            'X' => Some(Self::Speculative),
            _ => None,
        }
    }
}

/// A discovered URI before it has been admitted to the frontier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUri {
    pub uri: Url,

    pub is_seed: bool,

    /// Hop chain from the seed, one character per hop (e.g. "LLE")
    pub path_from_seed: String,

    /// The URI this one was discovered on
    pub via: Option<Url>,

    pub directive: SchedulingDirective,
}

impl CandidateUri {
    /// Creates a candidate with no discovery history
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            is_seed: false,
            path_from_seed: String::new(),
            via: None,
            directive: SchedulingDirective::Normal,
        }
    }

    /// Creates a seed candidate
    pub fn seed(uri: Url) -> Self {
        Self {
            is_seed: true,
            ..Self::new(uri)
        }
    }

    /// Creates a candidate discovered on `via` by one more hop
    pub fn discovered(uri: Url, via: &CandidateUri, hop: Hop) -> Self {
        let mut path_from_seed = via.path_from_seed.clone();
        path_from_seed.push(hop.as_char());
        Self {
            uri,
            is_seed: false,
            path_from_seed,
            via: Some(via.uri.clone()),
            directive: SchedulingDirective::Normal,
        }
    }

    pub fn with_directive(mut self, directive: SchedulingDirective) -> Self {
        self.directive = directive;
        self
    }

    pub fn last_hop(&self) -> Option<Hop> {
        self.path_from_seed.chars().last().and_then(Hop::from_char)
    }

    pub fn is_prerequisite(&self) -> bool {
        self.last_hop() == Some(Hop::Prerequisite)
    }

    /// Number of consecutive non-link hops at the end of the path
    pub fn trailing_non_link_hops(&self) -> usize {
        self.path_from_seed
            .chars()
            .rev()
            .take_while(|c| *c != Hop::Link.as_char())
            .count()
    }
}

impl fmt::Display for CandidateUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.uri, self.path_from_seed)?;
        if let Some(via) = &self.via {
            write!(f, " via {}", via)?;
        }
        Ok(())
    }
}
