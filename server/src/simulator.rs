//! Authoritative match simulation: lifecycle, odds model, scoring, settlement.
//!
//! All state is plaintext in memory; encryption happens only at the archive
//! export/import edge (`export_archive`/`import_archive`). The simulator
//! knows nothing about sessions or ledgers - settlement returns payouts for
//! the room to apply.

use std::time::{Duration, Instant};

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use pitchside_shared::config::MatchConfig;
use pitchside_shared::protocol::{round4, MatchSnapshotWire, MatchStatus, OddsWire, ScoreWire};

use crate::codec::{SealedRecord, SecureCodec};
use crate::error::{BetRejection, CodecError, SettleError};
use crate::ledger::now_millis;
use crate::squad::{self, AiPlayer, PlayerAction};

/// Behavior passes run at most this often, regardless of tick rate.
const BEHAVIOR_PASS_INTERVAL: Duration = Duration::from_secs(1);

/// A qualifying shot converts with roughly this probability, scaled by the
/// shooter's power against the opposing squad's mean defense. Tuned for a
/// low single-digit total score over a full 5400-pass match.
const GOAL_BASE_PROBABILITY: f64 = 0.0008;

/// Shots below this derived priority are not on target.
const SHOT_PRIORITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Team1,
    Team2,
}

impl TeamSide {
    pub fn from_wire(team: u8) -> Result<Self, BetRejection> {
        match team {
            1 => Ok(TeamSide::Team1),
            2 => Ok(TeamSide::Team2),
            team => Err(BetRejection::InvalidTeam { team }),
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            TeamSide::Team1 => TeamSide::Team2,
            TeamSide::Team2 => TeamSide::Team1,
        }
    }
}

/// Immutable wager record. Appended to the match history and never edited;
/// payout only touches ledgers, the record stays as historical fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub participant_id: String,
    pub amount: u64,
    pub team: TeamSide,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub participant_id: String,
    pub amount: u64,
}

#[derive(Debug, Clone)]
pub struct Settlement {
    /// None on a draw
    pub winner: Option<TeamSide>,
    pub payouts: Vec<Payout>,
}

/// Encrypted-at-rest form of a finished (or abandoned) match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchArchive {
    pub id: String,
    pub team1: Vec<AiPlayer>,
    pub team2: Vec<AiPlayer>,
    pub score: ScoreWire,
    pub time: u32,
    pub bets: Vec<Bet>,
    pub odds: OddsWire,
}

pub struct MatchSimulator {
    id: String,
    team1: Vec<AiPlayer>,
    team2: Vec<AiPlayer>,
    score: ScoreWire,
    time_secs: u32,
    status: MatchStatus,
    bets: Vec<Bet>,
    odds: OddsWire,
    settled: bool,
    last_behavior_pass: Option<Instant>,
    config: MatchConfig,
    rng: ChaCha8Rng,
}

impl MatchSimulator {
    pub fn new(id: impl Into<String>, config: MatchConfig, mut rng: ChaCha8Rng) -> Self {
        let team1 = squad::generate_squad(&mut rng, 1, config.squad_size);
        let team2 = squad::generate_squad(&mut rng, 2, config.squad_size);
        let odds = initial_odds(&team1, &team2);
        Self {
            id: id.into(),
            team1,
            team2,
            score: ScoreWire { team1: 0, team2: 0 },
            time_secs: 0,
            status: MatchStatus::Pending,
            bets: Vec::new(),
            odds,
            settled: false,
            last_behavior_pass: None,
            config,
            rng,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    /// The only pending -> in_progress trigger. Returns false if the match
    /// has already started or finished.
    pub fn start(&mut self) -> bool {
        if self.status != MatchStatus::Pending {
            return false;
        }
        self.status = MatchStatus::InProgress;
        true
    }

    /// Record a wager while betting is open. Policy checks beyond the
    /// match's own invariants (limits, balance, cooldown) live in the room.
    pub fn place_bet(
        &mut self,
        participant_id: impl Into<String>,
        amount: u64,
        team: u8,
    ) -> Result<(), BetRejection> {
        if self.status != MatchStatus::Pending {
            return Err(BetRejection::BettingClosed);
        }
        let team = TeamSide::from_wire(team)?;
        if amount == 0 {
            return Err(BetRejection::BelowMinimum { amount: 0, min: 1 });
        }
        self.bets.push(Bet {
            participant_id: participant_id.into(),
            amount,
            team,
            timestamp: now_millis(),
        });
        self.update_odds();
        Ok(())
    }

    /// Recompute odds from the bet pool. Pure function of the bet list:
    /// each side pays the opposing pool divided by its own (floored at 1).
    fn update_odds(&mut self) {
        let pool1 = self.pool(TeamSide::Team1).max(1);
        let pool2 = self.pool(TeamSide::Team2).max(1);
        self.odds = OddsWire {
            team1: pool2 as f64 / pool1 as f64,
            team2: pool1 as f64 / pool2 as f64,
        };
    }

    fn pool(&self, side: TeamSide) -> u64 {
        self.bets
            .iter()
            .filter(|bet| bet.team == side)
            .map(|bet| bet.amount)
            .sum()
    }

    /// Advance simulated time. Runs a behavior pass at most once per
    /// wall-clock second; flips to completed exactly once when the clock
    /// reaches the configured duration.
    pub fn tick(&mut self, delta_secs: u32) {
        if self.status != MatchStatus::InProgress {
            return;
        }
        self.time_secs = (self.time_secs + delta_secs).min(self.config.duration_secs);

        let now = Instant::now();
        let due = self
            .last_behavior_pass
            .map_or(true, |last| now.duration_since(last) >= BEHAVIOR_PASS_INTERVAL);
        if due {
            self.last_behavior_pass = Some(now);
            self.run_behavior_pass();
        }

        if self.time_secs >= self.config.duration_secs {
            self.status = MatchStatus::Completed;
        }
    }

    /// Re-derive every player's ephemeral behavior and resolve shots into
    /// goals. Player records themselves are never mutated.
    fn run_behavior_pass(&mut self) {
        let defense1 = squad::mean_defense(&self.team1);
        let defense2 = squad::mean_defense(&self.team2);

        let goals1 = pass_for_squad(&self.team1, defense2, &mut self.rng);
        let goals2 = pass_for_squad(&self.team2, defense1, &mut self.rng);
        self.score.team1 += goals1;
        self.score.team2 += goals2;
    }

    /// Determine payouts once the match is completed. At most once; the
    /// room applies the ledger credits. Draws refund every stake 1:1.
    pub fn settle(&mut self) -> Result<Settlement, SettleError> {
        if self.status != MatchStatus::Completed {
            return Err(SettleError::NotCompleted);
        }
        if self.settled {
            return Err(SettleError::AlreadySettled);
        }
        self.settled = true;

        let winner = if self.score.team1 > self.score.team2 {
            Some(TeamSide::Team1)
        } else if self.score.team2 > self.score.team1 {
            Some(TeamSide::Team2)
        } else {
            None
        };

        let payouts = self
            .bets
            .iter()
            .filter_map(|bet| {
                let amount = match winner {
                    Some(side) if bet.team == side => {
                        let odds = match side {
                            TeamSide::Team1 => self.odds.team1,
                            TeamSide::Team2 => self.odds.team2,
                        };
                        (bet.amount as f64 * odds).round() as u64
                    }
                    Some(_) => return None,
                    // Draw: stake back
                    None => bet.amount,
                };
                Some(Payout {
                    participant_id: bet.participant_id.clone(),
                    amount,
                })
            })
            .collect();

        Ok(Settlement { winner, payouts })
    }

    /// Plaintext view for broadcasting. Pure read: identical until the next
    /// `tick` or `place_bet`.
    pub fn snapshot(&self) -> MatchSnapshotWire {
        MatchSnapshotWire {
            id: self.id.clone(),
            score: self.score,
            time: self.time_secs,
            status: self.status,
            odds: OddsWire {
                team1: round4(self.odds.team1),
                team2: round4(self.odds.team2),
            },
        }
    }

    /// Encrypt the match record for storage. The only place squad and bet
    /// data leave memory.
    pub fn export_archive(&self, codec: &SecureCodec) -> Result<SealedRecord, CodecError> {
        codec.seal(&MatchArchive {
            id: self.id.clone(),
            team1: self.team1.clone(),
            team2: self.team2.clone(),
            score: self.score,
            time: self.time_secs,
            bets: self.bets.clone(),
            odds: self.odds,
        })
    }

    pub fn import_archive(
        codec: &SecureCodec,
        record: &SealedRecord,
    ) -> Result<MatchArchive, CodecError> {
        codec.open(record)
    }
}

fn initial_odds(team1: &[AiPlayer], team2: &[AiPlayer]) -> OddsWire {
    let strength1 = squad::squad_strength(team1).max(1.0);
    let strength2 = squad::squad_strength(team2).max(1.0);
    OddsWire {
        team1: strength2 / strength1,
        team2: strength1 / strength2,
    }
}

fn pass_for_squad(squad: &[AiPlayer], opposing_defense: f64, rng: &mut ChaCha8Rng) -> u32 {
    use rand::Rng;
    let mut goals = 0;
    for player in squad {
        let behavior = squad::derive_behavior(player, squad.len(), rng);
        if behavior.action != PlayerAction::Shoot || behavior.priority < SHOT_PRIORITY_THRESHOLD {
            continue;
        }
        let power = player.stats.power;
        let chance = GOAL_BASE_PROBABILITY * power / (power + opposing_defense);
        if rng.gen::<f64>() < chance {
            goals += 1;
        }
    }
    goals
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_sim() -> MatchSimulator {
        MatchSimulator::new(
            "m-test",
            MatchConfig::default(),
            ChaCha8Rng::seed_from_u64(12345),
        )
    }

    fn short_sim(duration_secs: u32) -> MatchSimulator {
        let config = MatchConfig {
            duration_secs,
            ..MatchConfig::default()
        };
        MatchSimulator::new("m-short", config, ChaCha8Rng::seed_from_u64(12345))
    }

    #[test]
    fn starts_pending_with_strength_odds() {
        let sim = test_sim();
        assert_eq!(sim.status(), MatchStatus::Pending);
        let snapshot = sim.snapshot();
        assert!(snapshot.odds.team1 > 0.0);
        assert!(snapshot.odds.team2 > 0.0);
        assert_eq!(snapshot.time, 0);
    }

    #[test]
    fn start_only_from_pending() {
        let mut sim = test_sim();
        assert!(sim.start());
        assert_eq!(sim.status(), MatchStatus::InProgress);
        assert!(!sim.start());
    }

    #[test]
    fn bet_rejected_once_started() {
        let mut sim = test_sim();
        sim.start();
        assert_eq!(
            sim.place_bet("p1", 100, 1),
            Err(BetRejection::BettingClosed)
        );
        assert!(sim.bets().is_empty());
    }

    #[test]
    fn bet_rejected_for_invalid_team() {
        let mut sim = test_sim();
        assert_eq!(
            sim.place_bet("p1", 100, 3),
            Err(BetRejection::InvalidTeam { team: 3 })
        );
    }

    #[test]
    fn odds_follow_bet_volume() {
        let mut sim = test_sim();
        sim.place_bet("p1", 300, 1).unwrap();
        sim.place_bet("p2", 100, 2).unwrap();
        let odds = sim.snapshot().odds;
        // Team 1 carries 3x the stake, so it pays a third of team 2.
        assert!((odds.team1 - 100.0 / 300.0).abs() < 1e-4);
        assert!((odds.team2 - 300.0 / 100.0).abs() < 1e-4);
    }

    #[test]
    fn odds_are_pure_function_of_bet_list() {
        let place = |sim: &mut MatchSimulator| {
            sim.place_bet("p1", 250, 1).unwrap();
            sim.place_bet("p2", 50, 2).unwrap();
            sim.place_bet("p3", 75, 2).unwrap();
        };
        let mut a = test_sim();
        let mut b = test_sim();
        place(&mut a);
        place(&mut b);
        assert_eq!(a.snapshot().odds, b.snapshot().odds);
    }

    #[test]
    fn one_sided_pool_floors_at_one() {
        let mut sim = test_sim();
        sim.place_bet("p1", 200, 1).unwrap();
        let odds = sim.snapshot().odds;
        // Empty opposing pool is floored at 1, not a division by zero.
        assert!((odds.team1 - 1.0 / 200.0).abs() < 1e-9);
        assert!((odds.team2 - 200.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_idempotent_without_mutation() {
        let mut sim = test_sim();
        sim.place_bet("p1", 100, 1).unwrap();
        assert_eq!(sim.snapshot(), sim.snapshot());
    }

    #[test]
    fn tick_ignored_while_pending() {
        let mut sim = test_sim();
        sim.tick(100);
        assert_eq!(sim.snapshot().time, 0);
        assert_eq!(sim.status(), MatchStatus::Pending);
    }

    #[test]
    fn completes_exactly_once_at_duration() {
        let mut sim = short_sim(10);
        sim.start();
        for _ in 0..9 {
            sim.tick(1);
        }
        assert_eq!(sim.status(), MatchStatus::InProgress);
        sim.tick(1);
        assert_eq!(sim.status(), MatchStatus::Completed);
        assert_eq!(sim.snapshot().time, 10);

        // Further ticks change nothing.
        sim.tick(5);
        assert_eq!(sim.snapshot().time, 10);
        assert_eq!(sim.status(), MatchStatus::Completed);
    }

    #[test]
    fn time_capped_at_duration() {
        let mut sim = short_sim(10);
        sim.start();
        sim.tick(500);
        assert_eq!(sim.snapshot().time, 10);
        assert_eq!(sim.status(), MatchStatus::Completed);
    }

    #[test]
    fn settle_requires_completion() {
        let mut sim = test_sim();
        assert_eq!(sim.settle().unwrap_err(), SettleError::NotCompleted);
        sim.start();
        assert_eq!(sim.settle().unwrap_err(), SettleError::NotCompleted);
    }

    #[test]
    fn settle_pays_winning_side_at_odds() {
        let mut sim = short_sim(1);
        sim.place_bet("winner", 100, 1).unwrap();
        sim.place_bet("loser", 400, 2).unwrap();
        sim.start();
        sim.tick(1);

        // Force a decisive score independent of simulated goals.
        sim.score = ScoreWire { team1: 2, team2: 0 };

        let odds_team1 = sim.odds.team1;
        let settlement = sim.settle().unwrap();
        assert_eq!(settlement.winner, Some(TeamSide::Team1));
        assert_eq!(settlement.payouts.len(), 1);
        let payout = &settlement.payouts[0];
        assert_eq!(payout.participant_id, "winner");
        assert_eq!(payout.amount, (100.0 * odds_team1).round() as u64);
    }

    #[test]
    fn settle_refunds_stakes_on_draw() {
        let mut sim = short_sim(1);
        sim.place_bet("p1", 150, 1).unwrap();
        sim.place_bet("p2", 60, 2).unwrap();
        sim.start();
        sim.tick(1);
        sim.score = ScoreWire { team1: 1, team2: 1 };

        let settlement = sim.settle().unwrap();
        assert_eq!(settlement.winner, None);
        let amounts: Vec<u64> = settlement.payouts.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![150, 60]);
    }

    #[test]
    fn settle_only_once() {
        let mut sim = short_sim(1);
        sim.start();
        sim.tick(1);
        sim.settle().unwrap();
        assert_eq!(sim.settle().unwrap_err(), SettleError::AlreadySettled);
    }

    #[test]
    fn behavior_passes_produce_plausible_scores() {
        let mut sim = test_sim();
        sim.start();
        for _ in 0..100_000 {
            sim.run_behavior_pass();
        }
        let score = sim.snapshot().score;
        let total = score.team1 + score.team2;
        // Roughly GOAL_BASE_PROBABILITY-scaled: some goals, nowhere near
        // one per pass.
        assert!(total > 0, "expected some goals over 100k passes");
        assert!(total < 2000, "scoring rate implausibly high: {}", total);
    }

    #[test]
    fn bets_are_append_only_history() {
        let mut sim = short_sim(1);
        sim.place_bet("p1", 100, 1).unwrap();
        sim.place_bet("p2", 200, 2).unwrap();
        sim.start();
        sim.tick(1);
        sim.settle().unwrap();
        // Settlement pays ledgers; the records persist untouched.
        assert_eq!(sim.bets().len(), 2);
        assert_eq!(sim.bets()[0].participant_id, "p1");
        assert_eq!(sim.bets()[1].amount, 200);
    }

    #[test]
    fn archive_roundtrips_through_codec() {
        let codec = SecureCodec::new(&[3u8; 32]);
        let mut sim = test_sim();
        sim.place_bet("p1", 100, 1).unwrap();

        let record = sim.export_archive(&codec).unwrap();
        let archive = MatchSimulator::import_archive(&codec, &record).unwrap();
        assert_eq!(archive.id, "m-test");
        assert_eq!(archive.team1.len(), 5);
        assert_eq!(archive.bets.len(), 1);
        assert_eq!(archive.bets[0].amount, 100);
    }
}
