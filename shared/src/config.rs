/// Betting policy applied by the room to every wager.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BettingConfig {
    /// Smallest accepted stake
    pub min_bet: u64,
    /// Largest accepted stake
    pub max_bet: u64,
    /// Minimum gap between two accepted bets from the same participant (ms)
    pub bet_cooldown_ms: u64,
    /// Balance granted to every fresh ledger
    pub starting_balance: u64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: 10,
            max_bet: 1000,
            bet_cooldown_ms: 5000,
            starting_balance: 1000,
        }
    }
}

impl BettingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_bet == 0 {
            return Err("min_bet must be > 0".to_string());
        }
        if self.max_bet < self.min_bet {
            return Err("max_bet must be >= min_bet".to_string());
        }
        if self.starting_balance < self.min_bet {
            return Err("starting_balance must cover at least one min_bet".to_string());
        }
        Ok(())
    }
}

/// Match simulation parameters.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    /// Simulated match length in seconds (90 minutes)
    pub duration_secs: u32,
    /// Simulated seconds added per room tick
    pub seconds_per_tick: u32,
    /// Players generated per team
    pub squad_size: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5400,
            seconds_per_tick: 1,
            squad_size: 5,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_secs == 0 {
            return Err("duration_secs must be > 0".to_string());
        }
        if self.seconds_per_tick == 0 {
            return Err("seconds_per_tick must be > 0".to_string());
        }
        if self.squad_size == 0 {
            return Err("squad_size must be > 0".to_string());
        }
        Ok(())
    }
}

/// Client reconnection policy.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Give up after this many consecutive failed attempts
    pub max_attempts: u32,
    /// First retry delay (ms); doubles each attempt
    pub base_delay_ms: u64,
    /// Retry delay ceiling (ms)
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be >= base_delay_ms".to_string());
        }
        Ok(())
    }
}
