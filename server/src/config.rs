use pitchside_shared::config::{BettingConfig, MatchConfig};

/// Server configuration, assembled once at startup and handed to the room
/// loop. The encryption key lives here so no global key material exists.
#[derive(Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Seed for the match rng; fixed seed gives a reproducible match
    pub rng_seed: u64,
    pub match_id: String,
    /// Betting stays open this long after the first participant joins
    pub betting_window_secs: u64,
    /// Room tick and snapshot push interval
    pub broadcast_interval_ms: u64,
    /// Key for sealing match archives; never logged
    pub encryption_key: [u8; 32],
    pub betting: BettingConfig,
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9100".to_string(),
            rng_seed: 42,
            match_id: "match-1".to_string(),
            betting_window_secs: 60,
            broadcast_interval_ms: 1000,
            encryption_key: [0x5a; 32],
            betting: BettingConfig::default(),
            match_config: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.broadcast_interval_ms == 0 {
            return Err("broadcast_interval_ms must be > 0".to_string());
        }
        if self.match_id.is_empty() {
            return Err("match_id must not be empty".to_string());
        }
        self.betting.validate()?;
        self.match_config.validate()?;
        Ok(())
    }
}
