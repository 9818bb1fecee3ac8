//! The serialized room event loop. One tokio task owns the `RoomState`;
//! connection tasks reach it through commands and hear back on a broadcast
//! channel. All mutation happens inside this task, so cross-field invariants
//! (balance vs transaction log, bet vs cooldown stamp) update atomically
//! without locks.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};

use pitchside_shared::config::BettingConfig;
use pitchside_shared::protocol::{MatchSnapshotWire, MatchStatus, WelcomeMsg, PROTOCOL_VERSION};

use crate::codec::SecureCodec;
use crate::config::ServerConfig;
use crate::room::RoomState;
use crate::simulator::MatchSimulator;

/// Commands from connection tasks to the room loop.
pub enum RoomCommand {
    Join {
        session_id: String,
        response: oneshot::Sender<WelcomeMsg>,
    },
    Leave {
        session_id: String,
    },
    PlaceBet {
        session_id: String,
        amount: u64,
        team: u8,
    },
}

/// Broadcasts from the room loop; connection tasks filter targeted variants
/// by session id.
#[derive(Debug, Clone)]
pub enum RoomBroadcast {
    MatchUpdate(MatchSnapshotWire),
    CurrencyUpdate { session_id: String, balance: u64 },
    BetError { session_id: String, message: String },
}

/// Run the room loop. Owns the match, every ledger, and the codec.
pub async fn run_room_loop(
    mut cmd_rx: mpsc::Receiver<RoomCommand>,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
    config: ServerConfig,
    codec: SecureCodec,
) {
    let mut room = RoomState::new(
        config.match_id.clone(),
        config.betting,
        config.match_config,
        config.rng_seed,
    );
    let betting: BettingConfig = config.betting;

    let mut tick_interval =
        tokio::time::interval(Duration::from_millis(config.broadcast_interval_ms));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let betting_window = Duration::from_secs(config.betting_window_secs);
    // Armed when the first participant joins.
    let mut start_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                // Auto-start after the betting window.
                if room.status() == MatchStatus::Pending {
                    if let Some(deadline) = start_deadline {
                        if Instant::now() >= deadline && room.start_match() {
                            tracing::info!("betting window closed; match started");
                        }
                    }
                }

                let completed = room.tick(config.match_config.seconds_per_tick);
                if completed {
                    let snapshot = room.snapshot();
                    tracing::info!(
                        team1 = snapshot.score.team1,
                        team2 = snapshot.score.team2,
                        "match completed"
                    );
                    for credit in room.settle_and_credit() {
                        tracing::info!(
                            session = %credit.session_id,
                            payout = credit.payout,
                            "payout credited"
                        );
                        let _ = broadcast_tx.send(RoomBroadcast::CurrencyUpdate {
                            session_id: credit.session_id,
                            balance: credit.balance,
                        });
                    }
                    match room.simulator().export_archive(&codec) {
                        // Read the record back before calling it stored; a
                        // sealed archive nothing can open is worthless.
                        Ok(record) => match MatchSimulator::import_archive(&codec, &record) {
                            Ok(archive) => tracing::info!(
                                iv = %record.iv,
                                bets = archive.bets.len(),
                                "match archive sealed"
                            ),
                            Err(err) => tracing::warn!(
                                "sealed archive failed verification: {}",
                                err
                            ),
                        },
                        Err(err) => tracing::warn!("match archive could not be sealed: {}", err),
                    }
                }

                // Push model: every participant gets the full snapshot each tick.
                let _ = broadcast_tx.send(RoomBroadcast::MatchUpdate(room.snapshot()));
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    RoomCommand::Join { session_id, response } => {
                        let outcome = room.join(&session_id);
                        if start_deadline.is_none() {
                            start_deadline = Some(Instant::now() + betting_window);
                        }
                        tracing::info!(session = %session_id, "participant joined");
                        let _ = response.send(WelcomeMsg {
                            protocol_version: PROTOCOL_VERSION,
                            session_id,
                            balance: outcome.balance,
                            match_state: outcome.snapshot,
                            betting,
                        });
                    }
                    RoomCommand::Leave { session_id } => {
                        room.leave(&session_id);
                        tracing::info!(session = %session_id, "participant left");
                    }
                    RoomCommand::PlaceBet { session_id, amount, team } => {
                        match room.place_bet(&session_id, amount, team, Instant::now()) {
                            Ok(balance) => {
                                let _ = broadcast_tx.send(RoomBroadcast::CurrencyUpdate {
                                    session_id,
                                    balance,
                                });
                                let _ = broadcast_tx.send(
                                    RoomBroadcast::MatchUpdate(room.snapshot()),
                                );
                            }
                            Err(rejection) => {
                                // Surfaced only to the offender; state untouched.
                                let _ = broadcast_tx.send(RoomBroadcast::BetError {
                                    session_id,
                                    message: rejection.to_string(),
                                });
                            }
                        }
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!("room loop ended");
}
