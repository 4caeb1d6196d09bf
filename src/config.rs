use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use crate::ServerError;

pub const DEFAULT_PORT: u16 = 5555;

pub const BIND_VAR: &str = "AREACTOR_BIND";
pub const PORT_VAR: &str = "AREACTOR_PORT";
pub const MAX_EVENTS_VAR: &str = "AREACTOR_MAX_EVENTS";
pub const TICK_VAR: &str = "AREACTOR_TICK_MS";
pub const REHASH_VAR: &str = "AREACTOR_REHASH_MS";
pub const HASH_SEED_VAR: &str = "AREACTOR_HASH_SEED";

/// Server settings, every field can be overridden by its environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `AREACTOR_BIND`, all interfaces by default
    pub bind: IpAddr,
    /// `AREACTOR_PORT`
    pub port: u16,
    /// `AREACTOR_MAX_EVENTS`, events handled per poll
    pub max_events: usize,
    /// `AREACTOR_TICK_MS`, how often the maintenance pass runs
    pub tick: Duration,
    /// `AREACTOR_REHASH_MS`, time a maintenance pass may spend rehashing
    pub rehash_budget: Duration,
    /// `AREACTOR_HASH_SEED`, a random seed is picked when unset
    pub hash_seed: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_events: 1024,
            tick: Duration::from_millis(100),
            rehash_budget: Duration::from_millis(1),
            hash_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from whatever `lookup` returns for each variable,
    /// falling back to the defaults for the ones it does not know
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let mut config = Config::default();

        if let Some(bind) = parse::<IpAddr>(&lookup, BIND_VAR)? {
            config.bind = bind;
        }
        if let Some(port) = parse::<u16>(&lookup, PORT_VAR)? {
            config.port = port;
        }
        if let Some(max_events) = parse::<usize>(&lookup, MAX_EVENTS_VAR)? {
            if max_events == 0 {
                return Err(ServerError::InvalidConfig {
                    var: MAX_EVENTS_VAR,
                    value: max_events.to_string(),
                });
            }
            config.max_events = max_events;
        }
        if let Some(ms) = parse::<u64>(&lookup, TICK_VAR)? {
            config.tick = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, REHASH_VAR)? {
            config.rehash_budget = Duration::from_millis(ms);
        }
        config.hash_seed = parse(&lookup, HASH_SEED_VAR)?;

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ServerError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ServerError::InvalidConfig { var, value }),
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, net::SocketAddr, time::Duration};

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.addr(), "0.0.0.0:5555".parse::<SocketAddr>().unwrap());
        assert_eq!(config.hash_seed, None);
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            (BIND_VAR, "127.0.0.1"),
            (PORT_VAR, " 6000 "),
            (MAX_EVENTS_VAR, "16"),
            (TICK_VAR, "250"),
            (REHASH_VAR, "5"),
            (HASH_SEED_VAR, "42"),
        ]))
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:6000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_events, 16);
        assert_eq!(config.tick, Duration::from_millis(250));
        assert_eq!(config.rehash_budget, Duration::from_millis(5));
        assert_eq!(config.hash_seed, Some(42));
    }

    #[test]
    fn invalid_values() {
        let err = Config::from_lookup(lookup(&[(PORT_VAR, "70000")])).unwrap_err();
        assert!(
            matches!(err, ServerError::InvalidConfig { var: PORT_VAR, ref value } if value == "70000"),
            "{err}"
        );

        let err = Config::from_lookup(lookup(&[(BIND_VAR, "localhost")])).unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig { var: BIND_VAR, .. }));

        let err = Config::from_lookup(lookup(&[(MAX_EVENTS_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig { var: MAX_EVENTS_VAR, .. }));
    }
}
