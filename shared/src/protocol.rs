use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::BettingConfig;

/// Protocol version - increment when making breaking changes.
/// Client should check this and show error if incompatible.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// Sent once after a successful join; carries everything the client
    /// needs to render the room.
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "currency_update")]
    CurrencyUpdate(CurrencyUpdateMsg),
    #[serde(rename = "match_update")]
    MatchUpdate(MatchSnapshotWire),
    #[serde(rename = "bet_error")]
    BetError(BetErrorMsg),
    #[serde(rename = "pong")]
    Pong(PongMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    /// Opaque per-connection id; dies with the connection.
    pub session_id: String,
    pub balance: u64,
    #[serde(rename = "match")]
    pub match_state: MatchSnapshotWire,
    pub betting: BettingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
pub struct CurrencyUpdateMsg {
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
pub struct BetErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
pub struct PongMsg {
    /// Echo of the client's ping timestamp (ms); lets the client compute
    /// round-trip time without clock synchronization.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
pub struct ScoreWire {
    pub team1: u32,
    pub team2: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
pub struct OddsWire {
    pub team1: f64,
    pub team2: f64,
}

/// Plaintext view of the match; encrypted internals never cross this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshotWire {
    pub id: String,
    pub score: ScoreWire,
    /// Simulated seconds elapsed
    pub time: u32,
    pub status: MatchStatus,
    pub odds: OddsWire,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../website/src/shared/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "join")]
    Join { room_id: String },
    #[serde(rename = "place_bet")]
    PlaceBet { team: u8, amount: u64 },
    #[serde(rename = "ping")]
    Ping { timestamp: u64 },
}

/// Round odds to 4 decimal places for the wire (stable snapshots, smaller JSON).
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> MatchSnapshotWire {
        MatchSnapshotWire {
            id: "m-1".to_string(),
            score: ScoreWire { team1: 2, team2: 1 },
            time: 3120,
            status: MatchStatus::InProgress,
            odds: OddsWire {
                team1: 1.5,
                team2: 0.6667,
            },
        }
    }

    #[test]
    fn server_msg_welcome_roundtrip() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            session_id: "s-7".to_string(),
            balance: 1000,
            match_state: sample_snapshot(),
            betting: BettingConfig::default(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"match\":"));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::Welcome(w) => {
                assert_eq!(w.protocol_version, PROTOCOL_VERSION);
                assert_eq!(w.session_id, "s-7");
                assert_eq!(w.balance, 1000);
                assert_eq!(w.match_state.status, MatchStatus::InProgress);
            }
            _ => panic!("Expected Welcome"),
        }
    }

    #[test]
    fn server_msg_match_update_roundtrip() {
        let msg = ServerMsg::MatchUpdate(sample_snapshot());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"match_update\""));
        assert!(json.contains("\"status\":\"in_progress\""));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::MatchUpdate(s) => {
                assert_eq!(s.score.team1, 2);
                assert_eq!(s.time, 3120);
            }
            _ => panic!("Expected MatchUpdate"),
        }
    }

    #[test]
    fn server_msg_bet_error_roundtrip() {
        let msg = ServerMsg::BetError(BetErrorMsg {
            message: "bet amount below minimum".to_string(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"bet_error\""));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::BetError(e) => assert!(e.message.contains("minimum")),
            _ => panic!("Expected BetError"),
        }
    }

    #[test]
    fn server_msg_pong_roundtrip() {
        let msg = ServerMsg::Pong(PongMsg {
            timestamp: 1_700_000_000_123,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"pong\""));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::Pong(p) => assert_eq!(p.timestamp, 1_700_000_000_123),
            _ => panic!("Expected Pong"),
        }
    }

    #[test]
    fn client_msg_join_roundtrip() {
        let msg = ClientMsg::Join {
            room_id: "main".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        let parsed: ClientMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMsg::Join { room_id } => assert_eq!(room_id, "main"),
            _ => panic!("Expected Join"),
        }
    }

    #[test]
    fn client_msg_place_bet_roundtrip() {
        let msg = ClientMsg::PlaceBet {
            team: 1,
            amount: 100,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"place_bet\""));
        let parsed: ClientMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMsg::PlaceBet { team, amount } => {
                assert_eq!(team, 1);
                assert_eq!(amount, 100);
            }
            _ => panic!("Expected PlaceBet"),
        }
    }

    #[test]
    fn match_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&MatchStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&MatchStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&MatchStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn round4_truncates_noise() {
        assert_eq!(round4(0.6666666), 0.6667);
        assert_eq!(round4(1.5), 1.5);
    }
}
