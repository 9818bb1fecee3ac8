use thiserror::Error;

/// A bet that failed policy validation. Surfaced only to the offending
/// participant as a `bet_error` message; never mutates room state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BetRejection {
    #[error("no ledger for this session; join the room first")]
    UnknownParticipant,
    #[error("bet amount {amount} is below the minimum of {min}")]
    BelowMinimum { amount: u64, min: u64 },
    #[error("bet amount {amount} is above the maximum of {max}")]
    AboveMaximum { amount: u64, max: u64 },
    #[error("insufficient balance: have {balance}, need {amount}")]
    InsufficientFunds { balance: u64, amount: u64 },
    #[error("invalid team number {team}; must be 1 or 2")]
    InvalidTeam { team: u8 },
    #[error("betting is closed; the match is no longer pending")]
    BettingClosed,
    #[error("bet cooldown active; wait {remaining_ms} ms before betting again")]
    CooldownActive { remaining_ms: u64 },
}

/// Failure sealing or opening an encrypted record. An open failure marks the
/// single record unreadable; it is never allowed to take down the room.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed sealed record: {0}")]
    Malformed(&'static str),
    #[error("authentication tag verification failed (tampered or corrupted record)")]
    Verification,
    #[error("sealed payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("debit of {amount} would overdraw balance {balance}")]
    InsufficientFunds { balance: u64, amount: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("match is not completed")]
    NotCompleted,
    #[error("match already settled")]
    AlreadySettled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_are_specific() {
        let msg = BetRejection::BelowMinimum { amount: 9, min: 10 }.to_string();
        assert!(msg.contains('9') && msg.contains("10"));

        let msg = BetRejection::CooldownActive { remaining_ms: 3200 }.to_string();
        assert!(msg.contains("cooldown") && msg.contains("3200"));

        let msg = BetRejection::InsufficientFunds {
            balance: 50,
            amount: 100,
        }
        .to_string();
        assert!(msg.contains("50") && msg.contains("100"));
    }
}
