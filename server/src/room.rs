//! Synchronous room core: one match, one ledger per connected participant,
//! per-participant bet cooldowns. Owned exclusively by the room loop task,
//! so every method runs as a discrete non-preemptible handler.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use pitchside_shared::config::{BettingConfig, MatchConfig};
use pitchside_shared::protocol::{MatchSnapshotWire, MatchStatus};

use crate::error::BetRejection;
use crate::ledger::{Ledger, TxKind};
use crate::simulator::{MatchSimulator, TeamSide};

pub struct JoinOutcome {
    pub balance: u64,
    pub snapshot: MatchSnapshotWire,
}

/// One credit applied during settlement, for broadcast to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementCredit {
    pub session_id: String,
    pub payout: u64,
    pub balance: u64,
}

pub struct RoomState {
    sim: MatchSimulator,
    ledgers: HashMap<String, Ledger>,
    last_bet_at: HashMap<String, Instant>,
    betting: BettingConfig,
}

impl RoomState {
    pub fn new(match_id: impl Into<String>, betting: BettingConfig, config: MatchConfig, rng_seed: u64) -> Self {
        Self {
            sim: MatchSimulator::new(match_id, config, ChaCha8Rng::seed_from_u64(rng_seed)),
            ledgers: HashMap::new(),
            last_bet_at: HashMap::new(),
            betting,
        }
    }

    pub fn participant_count(&self) -> usize {
        self.ledgers.len()
    }

    pub fn status(&self) -> MatchStatus {
        self.sim.status()
    }

    pub fn snapshot(&self) -> MatchSnapshotWire {
        self.sim.snapshot()
    }

    /// Allocate a fresh ledger for an unseen session id and report the
    /// participant's view of the room.
    pub fn join(&mut self, session_id: &str) -> JoinOutcome {
        let ledger = self
            .ledgers
            .entry(session_id.to_string())
            .or_insert_with(|| Ledger::new(self.betting.starting_balance));
        JoinOutcome {
            balance: ledger.balance(),
            snapshot: self.sim.snapshot(),
        }
    }

    /// Drop the participant's ledger and cooldown. Bets already placed stay
    /// in match history; a later payout for this id simply has no ledger to
    /// land in.
    pub fn leave(&mut self, session_id: &str) {
        self.ledgers.remove(session_id);
        self.last_bet_at.remove(session_id);
    }

    /// Validate and apply a bet. Checks run in strict order; the first
    /// failure rejects without touching any state. On success the debit,
    /// the bet record and the cooldown stamp commit together.
    pub fn place_bet(
        &mut self,
        session_id: &str,
        amount: u64,
        team: u8,
        now: Instant,
    ) -> Result<u64, BetRejection> {
        // (a) participant has a ledger
        let ledger = self
            .ledgers
            .get_mut(session_id)
            .ok_or(BetRejection::UnknownParticipant)?;

        // (b) amount within policy limits
        if amount < self.betting.min_bet {
            return Err(BetRejection::BelowMinimum {
                amount,
                min: self.betting.min_bet,
            });
        }
        if amount > self.betting.max_bet {
            return Err(BetRejection::AboveMaximum {
                amount,
                max: self.betting.max_bet,
            });
        }

        // (c) balance covers the stake
        if ledger.balance() < amount {
            return Err(BetRejection::InsufficientFunds {
                balance: ledger.balance(),
                amount,
            });
        }

        // (d) team is valid
        let side = TeamSide::from_wire(team)?;

        // (e) betting still open
        if self.sim.status() != MatchStatus::Pending {
            return Err(BetRejection::BettingClosed);
        }

        // (f) outside the cooldown window
        let cooldown = Duration::from_millis(self.betting.bet_cooldown_ms);
        if let Some(last) = self.last_bet_at.get(session_id) {
            let elapsed = now.duration_since(*last);
            if elapsed < cooldown {
                return Err(BetRejection::CooldownActive {
                    remaining_ms: (cooldown - elapsed).as_millis() as u64,
                });
            }
        }

        // All checks passed; nothing below can fail, so the three effects
        // commit as one.
        self.sim
            .place_bet(session_id, amount, team)
            .expect("bet pre-validated");
        let balance = ledger
            .debit(amount, TxKind::Bet, format!("bet {} on team {}", amount, team))
            .expect("balance pre-validated");
        self.last_bet_at.insert(session_id.to_string(), now);
        Ok(balance)
    }

    /// Start the match once the betting window closes.
    pub fn start_match(&mut self) -> bool {
        self.sim.start()
    }

    /// Advance the simulation; true when this tick completed the match.
    pub fn tick(&mut self, delta_secs: u32) -> bool {
        let before = self.sim.status();
        self.sim.tick(delta_secs);
        before == MatchStatus::InProgress && self.sim.status() == MatchStatus::Completed
    }

    /// Apply settlement payouts to the ledgers that still exist. Departed
    /// participants' payouts are skipped (their ledger died with the
    /// connection) and logged.
    pub fn settle_and_credit(&mut self) -> Vec<SettlementCredit> {
        let settlement = match self.sim.settle() {
            Ok(settlement) => settlement,
            Err(err) => {
                tracing::warn!("settlement skipped: {}", err);
                return Vec::new();
            }
        };

        let label = match settlement.winner {
            Some(TeamSide::Team1) => "team 1 win",
            Some(TeamSide::Team2) => "team 2 win",
            None => "draw refund",
        };

        let mut credits = Vec::new();
        for payout in settlement.payouts {
            match self.ledgers.get_mut(&payout.participant_id) {
                Some(ledger) => {
                    let balance =
                        ledger.credit(payout.amount, TxKind::Win, format!("payout: {}", label));
                    credits.push(SettlementCredit {
                        session_id: payout.participant_id,
                        payout: payout.amount,
                        balance,
                    });
                }
                None => {
                    tracing::info!(
                        session = %payout.participant_id,
                        amount = payout.amount,
                        "payout skipped: participant disconnected"
                    );
                }
            }
        }
        credits
    }

    pub fn simulator(&self) -> &MatchSimulator {
        &self.sim
    }
}
