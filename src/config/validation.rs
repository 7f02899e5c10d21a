use crate::config::defaults;
use crate::config::types::{Config, UserAgentConfig};
use crate::policy::{QuotaCategory, QuotaMetric};
use crate::robots::HonoringKind;
use crate::store::table::MAX_CAPACITY_BITS;
use crate::ConfigError;
use tracing::warn;
use url::Url;

/// Validates the structural parts of the configuration
///
/// Anything here is a hard error: the crawler cannot identify itself or its seeds
/// are unusable.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Replaces out-of-range values with their documented defaults
///
/// Each replacement is logged at warn level. Returns the number of values replaced.
pub fn sanitize(config: &mut Config) -> usize {
    let mut fixed = 0;

    let frontier = &mut config.frontier;
    if !(frontier.delay_factor.is_finite() && frontier.delay_factor >= 0.0) {
        fallback("frontier.delay-factor", frontier.delay_factor, defaults::DELAY_FACTOR);
        frontier.delay_factor = defaults::DELAY_FACTOR;
        fixed += 1;
    }
    for (name, value, default, ceiling) in [
        (
            "frontier.retry-delay-seconds",
            &mut frontier.retry_delay_seconds,
            defaults::RETRY_DELAY_SECONDS,
            defaults::MAX_INTERVAL_SECONDS,
        ),
        (
            "frontier.min-delay-ms",
            &mut frontier.min_delay_ms,
            defaults::MIN_DELAY_MS,
            defaults::MAX_INTERVAL_MS,
        ),
        (
            "frontier.max-delay-ms",
            &mut frontier.max_delay_ms,
            defaults::MAX_DELAY_MS,
            defaults::MAX_INTERVAL_MS,
        ),
        (
            "frontier.max-poll-ms",
            &mut frontier.max_poll_ms,
            defaults::MAX_POLL_MS,
            defaults::MAX_INTERVAL_MS,
        ),
    ] {
        fixed += cap(name, value, default, ceiling);
    }
    if frontier.min_delay_ms > frontier.max_delay_ms {
        warn!(
            "frontier.min-delay-ms ({}) exceeds max-delay-ms ({}); using defaults {} and {}",
            frontier.min_delay_ms,
            frontier.max_delay_ms,
            defaults::MIN_DELAY_MS,
            defaults::MAX_DELAY_MS
        );
        frontier.min_delay_ms = defaults::MIN_DELAY_MS;
        frontier.max_delay_ms = defaults::MAX_DELAY_MS;
        fixed += 1;
    }
    if frontier.max_poll_ms == 0 {
        fallback("frontier.max-poll-ms", 0, defaults::MAX_POLL_MS);
        frontier.max_poll_ms = defaults::MAX_POLL_MS;
        fixed += 1;
    }

    for category in QuotaCategory::all() {
        for metric in QuotaMetric::all() {
            let value = config.quotas.slot_mut(category, metric);
            if *value < defaults::QUOTA_UNLIMITED {
                warn!(
                    "quotas.{}-max-{} is {}; treating it as unlimited",
                    category.as_str(),
                    metric.config_suffix(),
                    value
                );
                *value = defaults::QUOTA_UNLIMITED;
                fixed += 1;
            }
        }
    }

    let revisit = &mut config.revisit;
    for (name, factor, default) in [
        (
            "revisit.changed-factor",
            &mut revisit.changed_factor,
            defaults::CHANGED_FACTOR,
        ),
        (
            "revisit.unchanged-factor",
            &mut revisit.unchanged_factor,
            defaults::UNCHANGED_FACTOR,
        ),
    ] {
        if !(factor.is_finite() && *factor > 0.0) {
            fallback(name, *factor, default);
            *factor = default;
            fixed += 1;
        }
    }
    for (name, value, default) in [
        (
            "revisit.initial-wait-seconds",
            &mut revisit.initial_wait_seconds,
            defaults::INITIAL_WAIT_SECONDS,
        ),
        (
            "revisit.min-wait-seconds",
            &mut revisit.min_wait_seconds,
            defaults::MIN_WAIT_SECONDS,
        ),
        (
            "revisit.max-wait-seconds",
            &mut revisit.max_wait_seconds,
            defaults::MAX_WAIT_SECONDS,
        ),
        (
            "revisit.default-wait-seconds",
            &mut revisit.default_wait_seconds,
            defaults::DEFAULT_WAIT_SECONDS,
        ),
    ] {
        fixed += cap(name, value, default, defaults::MAX_INTERVAL_SECONDS);
    }
    if revisit.min_wait_seconds > revisit.max_wait_seconds {
        warn!(
            "revisit.min-wait-seconds ({}) exceeds max-wait-seconds ({}); using defaults {} and {}",
            revisit.min_wait_seconds,
            revisit.max_wait_seconds,
            defaults::MIN_WAIT_SECONDS,
            defaults::MAX_WAIT_SECONDS
        );
        revisit.min_wait_seconds = defaults::MIN_WAIT_SECONDS;
        revisit.max_wait_seconds = defaults::MAX_WAIT_SECONDS;
        fixed += 1;
    }

    let robots = &mut config.robots;
    if robots.honoring_policy == HonoringKind::Custom && robots.custom_robots.is_none() {
        warn!("robots.honoring-policy is custom but robots.custom-robots is unset; using classic");
        robots.honoring_policy = HonoringKind::Classic;
        fixed += 1;
    }
    if robots.honoring_policy == HonoringKind::MostFavoredSet && robots.user_agents.is_empty() {
        warn!("robots.honoring-policy is most-favored-set but robots.user-agents is empty; using classic");
        robots.honoring_policy = HonoringKind::Classic;
        fixed += 1;
    }
    if robots.validity_hours == 0 {
        fallback("robots.validity-hours", 0, defaults::ROBOTS_VALIDITY_HOURS);
        robots.validity_hours = defaults::ROBOTS_VALIDITY_HOURS;
        fixed += 1;
    }
    fixed += cap(
        "robots.validity-hours",
        &mut robots.validity_hours,
        defaults::ROBOTS_VALIDITY_HOURS,
        defaults::MAX_INTERVAL_HOURS,
    );

    let fingerprints = &mut config.fingerprints;
    if fingerprints.capacity_bits < defaults::MIN_CAPACITY_BITS
        || fingerprints.capacity_bits >= MAX_CAPACITY_BITS
    {
        fallback(
            "fingerprints.capacity-bits",
            fingerprints.capacity_bits,
            defaults::CAPACITY_BITS,
        );
        fingerprints.capacity_bits = defaults::CAPACITY_BITS;
        fixed += 1;
    }
    if fingerprints.max_entries == 0 {
        fallback("fingerprints.max-entries", 0, defaults::MAX_ENTRIES);
        fingerprints.max_entries = defaults::MAX_ENTRIES;
        fixed += 1;
    }

    fixed
}

fn fallback(key: &str, found: impl std::fmt::Display, default: impl std::fmt::Display) {
    warn!("{} = {} is out of range; using default {}", key, found, default);
}

/// Resets `value` to `default` if it exceeds `ceiling`; returns 1 if it did
fn cap(key: &str, value: &mut u64, default: u64, ceiling: u64) -> usize {
    if *value <= ceiling {
        return 0;
    }
    fallback(key, *value, default);
    *value = default;
    1
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates seed URIs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        crate::url::parse_absolute(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed '{}': {}", seed, e)))?;
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config::new(UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        })
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_seed() {
        let mut config = create_test_config();
        config.seeds = vec!["ftp://example.com/".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_rejects_crawler_name() {
        let mut config = create_test_config();
        config.user_agent.crawler_name = "bad name".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_sanitize_defaults_untouched() {
        let mut config = create_test_config();
        assert_eq!(sanitize(&mut config), 0);
    }

    #[test]
    fn test_sanitize_quota_below_unlimited() {
        let mut config = create_test_config();
        config.quotas.host_max_total_kb = -20;
        config.quotas.server_max_fetch_successes = 10;
        assert_eq!(sanitize(&mut config), 1);
        assert_eq!(config.quotas.host_max_total_kb, defaults::QUOTA_UNLIMITED);
        assert_eq!(config.quotas.server_max_fetch_successes, 10);
    }

    #[test]
    fn test_sanitize_factors_and_bounds() {
        let mut config = create_test_config();
        config.revisit.changed_factor = 0.0;
        config.revisit.unchanged_factor = f64::NAN;
        config.revisit.min_wait_seconds = 10;
        config.revisit.max_wait_seconds = 5;
        config.frontier.min_delay_ms = 9_000;
        config.frontier.max_delay_ms = 10;
        config.frontier.delay_factor = -1.0;

        assert_eq!(sanitize(&mut config), 5);
        assert_eq!(config.revisit.changed_factor, defaults::CHANGED_FACTOR);
        assert_eq!(config.revisit.unchanged_factor, defaults::UNCHANGED_FACTOR);
        assert_eq!(config.revisit.min_wait_seconds, defaults::MIN_WAIT_SECONDS);
        assert_eq!(config.revisit.max_wait_seconds, defaults::MAX_WAIT_SECONDS);
        assert_eq!(config.frontier.min_delay_ms, defaults::MIN_DELAY_MS);
        assert_eq!(config.frontier.delay_factor, defaults::DELAY_FACTOR);
    }

    #[test]
    fn test_sanitize_caps_huge_intervals() {
        let mut config = create_test_config();
        config.robots.validity_hours = 9_999_999_999_999;
        config.revisit.max_wait_seconds = u64::MAX;
        config.frontier.retry_delay_seconds = u64::MAX;
        config.frontier.max_poll_ms = u64::MAX;
        config.frontier.max_delay_ms = defaults::MAX_INTERVAL_MS;

        assert_eq!(sanitize(&mut config), 4);
        assert_eq!(config.robots.validity_hours, defaults::ROBOTS_VALIDITY_HOURS);
        assert_eq!(config.revisit.max_wait_seconds, defaults::MAX_WAIT_SECONDS);
        assert_eq!(config.frontier.retry_delay_seconds, defaults::RETRY_DELAY_SECONDS);
        assert_eq!(config.frontier.max_poll_ms, defaults::MAX_POLL_MS);
        assert_eq!(config.frontier.max_delay_ms, defaults::MAX_INTERVAL_MS);
    }

    #[test]
    fn test_sanitize_custom_without_text() {
        let mut config = create_test_config();
        config.robots.honoring_policy = HonoringKind::Custom;
        sanitize(&mut config);
        assert_eq!(config.robots.honoring_policy, HonoringKind::Classic);
    }

    #[test]
    fn test_sanitize_capacity_bits() {
        let mut config = create_test_config();
        config.fingerprints.capacity_bits = 0;
        config.fingerprints.max_entries = 0;
        assert_eq!(sanitize(&mut config), 2);
        assert_eq!(config.fingerprints.capacity_bits, defaults::CAPACITY_BITS);
        assert_eq!(config.fingerprints.max_entries, defaults::MAX_ENTRIES);
    }
}
