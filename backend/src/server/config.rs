//! HTTP server configuration object and helpers.

use std::env;
use std::net::SocketAddr;
use std::num::NonZeroU64;

use skilltrade_backend::domain::EngineConfig;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) engine: EngineConfig,
    pub(crate) event_channel_capacity: usize,
    pub(crate) seed_demo_data: bool,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> std::io::Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| std::io::Error::other(format!("invalid value for {key}: {raw}"))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            Err(std::io::Error::other(format!("{key} is not valid UTF-8")))
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the environment, falling back to
    /// development defaults.
    ///
    /// Recognised variables: `BIND_ADDR`, `XP_PER_LEVEL`, `RETRY_BUDGET`,
    /// `EVENT_CHANNEL_CAPACITY`, `SEED_DEMO_DATA`.
    pub fn from_env() -> std::io::Result<Self> {
        let bind_addr = parse_env::<SocketAddr>("BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let mut engine = EngineConfig::default();
        if let Some(xp_per_level) = parse_env::<u64>("XP_PER_LEVEL")? {
            engine.xp_per_level = NonZeroU64::new(xp_per_level)
                .ok_or_else(|| std::io::Error::other("XP_PER_LEVEL must be at least 1"))?;
        }
        if let Some(retry_budget) = parse_env::<u32>("RETRY_BUDGET")? {
            engine.retry_budget = retry_budget;
        }

        let event_channel_capacity =
            parse_env::<usize>("EVENT_CHANNEL_CAPACITY")?.unwrap_or(256);
        if event_channel_capacity == 0 {
            return Err(std::io::Error::other(
                "EVENT_CHANNEL_CAPACITY must be at least 1",
            ));
        }

        let seed_demo_data = env::var("SEED_DEMO_DATA").ok().as_deref() == Some("1");

        Ok(Self {
            bind_addr,
            engine,
            event_channel_capacity,
            seed_demo_data,
        })
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
