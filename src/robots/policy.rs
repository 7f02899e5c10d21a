//! robots.txt parsing and rule evaluation
//!
//! Rules are literal path prefixes grouped into user-agent sections. Parsing is
//! lenient: unknown fields are skipped and a malformed file still yields whatever
//! sections could be read.

use crate::robots::honoring::{HonoringKind, HonoringPolicy};
use crate::state::FetchStatus;
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use url::Url;

/// Exclusion policy for one host
#[derive(Debug, Clone)]
pub enum RobotsExclusionPolicy {
    /// Never disallows
    AllowAll,
    /// Always disallows
    DenyAll,
    /// Parsed rule table
    Normal(RobotsRules),
}

/// Result of evaluating one path
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RobotsVerdict {
    pub disallowed: bool,
    /// Token of the last section consulted; empty for the catch-all section
    pub matched_agent: Option<String>,
}

impl RobotsVerdict {
    /// Agent to send instead of our own, if the honoring policy masquerades
    pub fn masquerade_agent(&self, honoring: &HonoringPolicy) -> Option<&str> {
        if !honoring.masquerade {
            return None;
        }
        self.matched_agent
            .as_deref()
            .filter(|agent| !agent.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
struct Section {
    disallows: Vec<String>,
    crawl_delay: Option<f64>,
}

impl Section {
    fn allows(&self, path: &str) -> bool {
        for prefix in &self.disallows {
            if prefix.is_empty() {
                return true;
            }
            if path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Parsed robots.txt rule sections
#[derive(Debug)]
pub struct RobotsRules {
    text: String,
    sections: Vec<Section>,
    /// Agent tokens in file order with the catch-all moved last
    agents: Vec<(String, usize)>,
    has_errors: bool,
    /// Last user-agent evaluated under classic matching and the section it chose
    last_match: Mutex<Option<(String, Option<usize>)>>,
}

impl Clone for RobotsRules {
    fn clone(&self) -> Self {
        Self {
            text: self.text.clone(),
            sections: self.sections.clone(),
            agents: self.agents.clone(),
            has_errors: self.has_errors,
            last_match: Mutex::new(None),
        }
    }
}

impl RobotsRules {
    /// Original robots.txt text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True if a rule appeared before any User-agent line
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Agent tokens in match order
    pub fn user_agents(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|(agent, _)| agent.as_str())
    }

    fn section_for(&self, user_agent: &str) -> Option<(usize, &str)> {
        let lowered = user_agent.to_lowercase();
        self.agents
            .iter()
            .find(|(token, _)| lowered.contains(token.as_str()))
            .map(|(token, section)| (*section, token.as_str()))
    }

    fn remembered_section(&self, user_agent: &str) -> Option<usize> {
        let mut last = self
            .last_match
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last.as_ref() {
            Some((agent, section)) if agent == user_agent => *section,
            _ => {
                let section = self.section_for(user_agent).map(|(index, _)| index);
                *last = Some((user_agent.to_string(), section));
                section
            }
        }
    }

    fn token_of(&self, section: usize) -> &str {
        self.agents
            .iter()
            .find(|(_, index)| *index == section)
            .map(|(token, _)| token.as_str())
            .unwrap_or("")
    }

    fn evaluate(&self, path: &str, user_agent: &str, honoring: &HonoringPolicy) -> RobotsVerdict {
        let tested: Vec<(&str, usize)> = match honoring.kind {
            HonoringKind::Ignore => return RobotsVerdict::default(),
            HonoringKind::Classic | HonoringKind::Custom => self
                .remembered_section(user_agent)
                .map(|section| vec![(self.token_of(section), section)])
                .unwrap_or_default(),
            HonoringKind::MostFavored => self
                .agents
                .iter()
                .map(|(token, section)| (token.as_str(), *section))
                .collect(),
            HonoringKind::MostFavoredSet => honoring
                .user_agents
                .iter()
                .filter_map(|agent| {
                    self.agents
                        .iter()
                        .find(|(token, _)| agent.contains(token.as_str()))
                        .map(|(token, section)| (token.as_str(), *section))
                })
                .collect(),
        };

        let mut verdict = RobotsVerdict::default();
        for (token, section) in tested {
            verdict.matched_agent = Some(token.to_string());
            if self.sections[section].allows(path) {
                verdict.disallowed = false;
                break;
            }
            verdict.disallowed = true;
        }
        verdict
    }
}

impl RobotsExclusionPolicy {
    /// Parses robots.txt text
    ///
    /// A file with no user-agent sections allows everything.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        let mut agents: Vec<(String, usize)> = Vec::new();
        let mut catch_all: Vec<(String, usize)> = Vec::new();
        let mut has_errors = false;
        let mut in_rules = true;

        for raw in text.lines() {
            let line = match raw.find('#') {
                Some(index) => &raw[..index],
                None => raw,
            }
            .trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match field.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if in_rules || sections.is_empty() {
                        sections.push(Section::default());
                        in_rules = false;
                    }
                    let index = sections.len() - 1;
                    let token = value.to_lowercase();
                    if token == "*" {
                        catch_all.push((String::new(), index));
                    } else {
                        agents.push((token, index));
                    }
                }
                "disallow" => {
                    let Some(section) = sections.last_mut() else {
                        has_errors = true;
                        continue;
                    };
                    section.disallows.push(value.to_string());
                    in_rules = true;
                }
                "crawl-delay" => {
                    let Some(section) = sections.last_mut() else {
                        has_errors = true;
                        continue;
                    };
                    match value.parse::<f64>() {
                        Ok(delay) if delay.is_finite() && delay >= 0.0 => {
                            section.crawl_delay = Some(delay)
                        }
                        _ => debug!(value, "Ignoring unparseable crawl-delay"),
                    }
                    in_rules = true;
                }
                "allow" => in_rules = true,
                _ => {}
            }
        }

        if sections.is_empty() {
            return Self::AllowAll;
        }

        agents.extend(catch_all);
        Self::Normal(RobotsRules {
            text: text.to_string(),
            sections,
            agents,
            has_errors,
            last_match: Mutex::new(None),
        })
    }

    /// Builds a policy from a robots.txt fetch result
    ///
    /// A 2xx body is parsed; any other HTTP answer (missing file, redirect, server
    /// error) allows everything. Returns None when no response arrived.
    pub fn from_fetch(status: FetchStatus, body: Option<&str>) -> Option<Self> {
        match status {
            FetchStatus::Http(code) if (200..300).contains(&code) => {
                Some(Self::parse(body.unwrap_or("")))
            }
            FetchStatus::Http(_) => Some(Self::AllowAll),
            _ => None,
        }
    }

    /// Evaluates `path` and reports which section was consulted
    pub fn evaluate(
        &self,
        path: &str,
        user_agent: &str,
        honoring: &HonoringPolicy,
    ) -> RobotsVerdict {
        match self {
            Self::AllowAll => RobotsVerdict::default(),
            Self::DenyAll => RobotsVerdict {
                disallowed: true,
                matched_agent: None,
            },
            Self::Normal(rules) => rules.evaluate(path, user_agent, honoring),
        }
    }

    /// Returns true if `path` may not be fetched
    pub fn disallows(&self, path: &str, user_agent: &str, honoring: &HonoringPolicy) -> bool {
        self.evaluate(path, user_agent, honoring).disallowed
    }

    /// Crawl-delay in seconds from the section matching `user_agent`
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        match self {
            Self::Normal(rules) => rules
                .section_for(user_agent)
                .and_then(|(section, _)| rules.sections[section].crawl_delay),
            _ => None,
        }
    }
}

/// The path and query robots rules are matched against
pub fn path_query(uri: &Url) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
# example robots.txt
User-agent: BadBot
Disallow: /

User-agent: Googlebot
User-agent: Bingbot
Disallow: /private
Disallow: /tmp/ # scratch
Crawl-delay: 2.5

User-agent: *
Disallow: /cgi-bin
Disallow: /private
";

    fn classic() -> HonoringPolicy {
        HonoringPolicy::new(HonoringKind::Classic)
    }

    #[test]
    fn test_parse_sections() {
        let RobotsExclusionPolicy::Normal(rules) = RobotsExclusionPolicy::parse(ROBOTS) else {
            panic!("expected parsed rules");
        };
        let agents: Vec<&str> = rules.user_agents().collect();
        assert_eq!(agents, vec!["badbot", "googlebot", "bingbot", ""]);
        assert!(!rules.has_errors());
    }

    #[test]
    fn test_empty_file_allows_all() {
        assert!(matches!(
            RobotsExclusionPolicy::parse("# nothing here\n"),
            RobotsExclusionPolicy::AllowAll
        ));
    }

    #[test]
    fn test_rule_before_agent_is_error() {
        let policy = RobotsExclusionPolicy::parse("Disallow: /x\nUser-agent: *\nDisallow: /y\n");
        let RobotsExclusionPolicy::Normal(rules) = &policy else {
            panic!("expected parsed rules");
        };
        assert!(rules.has_errors());
        assert!(policy.disallows("/y", "anybot", &classic()));
        assert!(!policy.disallows("/x", "anybot", &classic()));
    }

    #[test]
    fn test_classic_prefix_match() {
        let policy = RobotsExclusionPolicy::parse(ROBOTS);
        assert!(policy.disallows("/private/a", "Mozilla/5.0 (compatible; Googlebot/2.1)", &classic()));
        assert!(policy.disallows("/tmp/x", "googlebot", &classic()));
        assert!(!policy.disallows("/cgi-bin/run", "googlebot", &classic()));
        assert!(policy.disallows("/cgi-bin/run", "otherbot", &classic()));
        assert!(policy.disallows("/anything", "badbot/1.0", &classic()));
    }

    #[test]
    fn test_empty_disallow_allows_before_later_rules() {
        let policy =
            RobotsExclusionPolicy::parse("User-agent: *\nDisallow:\nDisallow: /private\n");
        assert!(!policy.disallows("/private", "anybot", &classic()));
    }

    #[test]
    fn test_classic_remembers_until_agent_changes() {
        let policy = RobotsExclusionPolicy::parse(ROBOTS);
        let RobotsExclusionPolicy::Normal(rules) = &policy else {
            panic!("expected parsed rules");
        };
        policy.disallows("/", "googlebot", &classic());
        assert_eq!(
            rules.last_match.lock().unwrap().clone(),
            Some(("googlebot".to_string(), Some(1)))
        );
        policy.disallows("/", "somebot", &classic());
        assert_eq!(
            rules.last_match.lock().unwrap().clone(),
            Some(("somebot".to_string(), Some(2)))
        );
    }

    #[test]
    fn test_no_matching_section_allows() {
        let policy = RobotsExclusionPolicy::parse("User-agent: googlebot\nDisallow: /\n");
        assert!(!policy.disallows("/", "mybot", &classic()));
    }

    #[test]
    fn test_most_favored_any_section_allows() {
        let policy = RobotsExclusionPolicy::parse(ROBOTS);
        let honoring = HonoringPolicy::new(HonoringKind::MostFavored);
        // badbot disallows everything but googlebot allows /cgi-bin
        let verdict = policy.evaluate("/cgi-bin/x", "mybot", &honoring);
        assert!(!verdict.disallowed);
        assert_eq!(verdict.matched_agent.as_deref(), Some("googlebot"));
        // every section disallows /private
        assert!(policy.disallows("/private", "mybot", &honoring));
    }

    #[test]
    fn test_most_favored_set_only_configured_agents() {
        let policy = RobotsExclusionPolicy::parse(ROBOTS);
        let honoring =
            HonoringPolicy::new(HonoringKind::MostFavoredSet).with_user_agents(["BadBot/3"]);
        assert!(policy.disallows("/cgi-bin/x", "mybot", &honoring));

        let honoring = honoring.with_user_agents(["badbot", "bingbot-mobile"]);
        assert!(!policy.disallows("/cgi-bin/x", "mybot", &honoring));
    }

    #[test]
    fn test_masquerade_agent() {
        let policy = RobotsExclusionPolicy::parse(ROBOTS);
        let honoring = HonoringPolicy::new(HonoringKind::Classic).with_masquerade(true);
        let verdict = policy.evaluate("/", "googlebot-image", &honoring);
        assert_eq!(verdict.masquerade_agent(&honoring), Some("googlebot"));

        let verdict = policy.evaluate("/", "otherbot", &honoring);
        assert_eq!(verdict.masquerade_agent(&honoring), None);
        assert_eq!(verdict.masquerade_agent(&classic()), None);
    }

    #[test]
    fn test_allow_and_deny_all() {
        assert!(!RobotsExclusionPolicy::AllowAll.disallows("/", "a", &classic()));
        assert!(RobotsExclusionPolicy::DenyAll.disallows("/", "a", &classic()));
    }

    #[test]
    fn test_crawl_delay() {
        let policy = RobotsExclusionPolicy::parse(ROBOTS);
        assert_eq!(policy.crawl_delay("bingbot"), Some(2.5));
        assert_eq!(policy.crawl_delay("otherbot"), None);
        assert_eq!(RobotsExclusionPolicy::AllowAll.crawl_delay("bingbot"), None);
    }

    #[test]
    fn test_from_fetch() {
        let parsed =
            RobotsExclusionPolicy::from_fetch(FetchStatus::Http(200), Some("User-agent: *\nDisallow: /\n"));
        assert!(parsed.unwrap().disallows("/", "a", &classic()));
        assert!(matches!(
            RobotsExclusionPolicy::from_fetch(FetchStatus::Http(404), None),
            Some(RobotsExclusionPolicy::AllowAll)
        ));
        assert!(matches!(
            RobotsExclusionPolicy::from_fetch(FetchStatus::Http(503), None),
            Some(RobotsExclusionPolicy::AllowAll)
        ));
        assert!(matches!(
            RobotsExclusionPolicy::from_fetch(FetchStatus::Http(301), None),
            Some(RobotsExclusionPolicy::AllowAll)
        ));
        assert!(RobotsExclusionPolicy::from_fetch(FetchStatus::ConnectFailed, None).is_none());
        assert!(RobotsExclusionPolicy::from_fetch(FetchStatus::Timeout, None).is_none());
    }

    #[test]
    fn test_path_query() {
        let uri = Url::parse("http://example.com/a/b?x=1").unwrap();
        assert_eq!(path_query(&uri), "/a/b?x=1");
        let uri = Url::parse("http://example.com").unwrap();
        assert_eq!(path_query(&uri), "/");
    }
}
