//! Runtime configuration.

use std::time::Duration;

use anyhow::{Result, bail};

use crate::provider::DEFAULT_API_URL;

/// Server settings, read from flags or environment variables.
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Address to listen on
    #[arg(long, env = "RELAY_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: String,

    /// GitHub API URL
    #[arg(
        long = "api-url",
        env = "RELAY_API_URL",
        value_name = "URL",
        default_value = DEFAULT_API_URL
    )]
    pub api_url: String,

    /// Token used to authenticate against the GitHub API.
    /// Anonymous requests are heavily rate limited.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Seconds a repository's release list is served from memory
    #[arg(
        long = "cache-ttl",
        env = "RELAY_CACHE_TTL",
        value_name = "SECONDS",
        default_value_t = 60
    )]
    pub cache_ttl: u64,

    /// Seconds to wait for a GitHub API response
    #[arg(
        long = "upstream-timeout",
        env = "RELAY_UPSTREAM_TIMEOUT",
        value_name = "SECONDS",
        default_value_t = 10
    )]
    pub upstream_timeout: u64,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl == 0 {
            bail!("--cache-ttl must be at least 1 second");
        }
        if self.upstream_timeout == 0 {
            bail!("--upstream-timeout must be at least 1 second");
        }
        if self.api_url.trim().is_empty() {
            bail!("--api-url must not be empty");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    /// The token, unless it is blank.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        config: RelayConfig,
    }

    fn parse(args: &[&str]) -> RelayConfig {
        let mut argv = vec!["squirrel-relay"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--listen",
            "127.0.0.1:8080",
            "--api-url",
            "http://localhost:9999",
            "--token",
            "abc",
            "--cache-ttl",
            "300",
            "--upstream-timeout",
            "3",
        ]);

        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.api_url, "http://localhost:9999");
        assert_eq!(config.token(), Some("abc"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let config = parse(&["--cache-ttl", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let config = parse(&["--token", "  "]);
        assert_eq!(config.token(), None);
    }

    #[test]
    fn test_invalid_ttl_fails_to_parse() {
        let result = TestCli::try_parse_from(["squirrel-relay", "--cache-ttl", "soon"]);
        assert!(result.is_err());
    }
}
