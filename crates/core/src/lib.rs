pub mod backend;
pub mod domain;
pub mod exposure;
pub mod recommend;
pub mod workflow;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RETRIES: u32 = 3;
    const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub api_url: Option<String>,
        pub api_token: Option<String>,
        pub sentry_dsn: Option<String>,
        pub timeout_secs: u64,
        pub retries: u32,
        pub poll_interval_ms: u64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                api_url: std::env::var("CARTEIRA_API_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                api_token: std::env::var("CARTEIRA_API_TOKEN")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                timeout_secs: parse_env("CARTEIRA_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
                retries: parse_env("CARTEIRA_API_RETRIES")?.unwrap_or(DEFAULT_RETRIES),
                poll_interval_ms: parse_env("CARTEIRA_POLL_INTERVAL_MS")?
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            })
        }

        pub fn require_api_url(&self) -> anyhow::Result<&str> {
            self.api_url
                .as_deref()
                .context("CARTEIRA_API_URL is required")
        }

        pub fn poll_interval(&self) -> Duration {
            Duration::from_millis(self.poll_interval_ms.max(1))
        }
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => {
                let v = s
                    .trim()
                    .parse::<T>()
                    .with_context(|| format!("{key} is not a valid number: {s}"))?;
                Ok(Some(v))
            }
            _ => Ok(None),
        }
    }
}
