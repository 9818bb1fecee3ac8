//! Per-participant balance with an append-only transaction log.
//!
//! Invariant: `balance == starting_balance + sum(tx.amount)` at all times.
//! A debit that would overdraw is rejected here, not merely by callers.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Bet,
    Win,
    Loss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Signed change applied to the balance
    pub amount: i64,
    pub kind: TxKind,
    pub description: String,
    /// Unix millis at record time
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    balance: u64,
    transactions: Vec<Transaction>,
}

pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Ledger {
    pub fn new(starting_balance: u64) -> Self {
        Self {
            balance: starting_balance,
            transactions: Vec::new(),
        }
    }

    /// Remove funds. Rejects without recording anything if the balance
    /// cannot cover the amount.
    pub fn debit(
        &mut self,
        amount: u64,
        kind: TxKind,
        description: impl Into<String>,
    ) -> Result<u64, LedgerError> {
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                balance: self.balance,
                amount,
            });
        }
        self.balance -= amount;
        self.transactions.push(Transaction {
            amount: -(amount as i64),
            kind,
            description: description.into(),
            timestamp: now_millis(),
        });
        Ok(self.balance)
    }

    /// Add funds.
    pub fn credit(&mut self, amount: u64, kind: TxKind, description: impl Into<String>) -> u64 {
        self.balance += amount;
        self.transactions.push(Transaction {
            amount: amount as i64,
            kind,
            description: description.into(),
            timestamp: now_millis(),
        });
        self.balance
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Transactions in insertion order, never reordered.
    pub fn history(&self) -> &[Transaction] {
        &self.transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_stake_and_empty_log() {
        let ledger = Ledger::new(1000);
        assert_eq!(ledger.balance(), 1000);
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn debit_records_negative_amount() {
        let mut ledger = Ledger::new(1000);
        let balance = ledger.debit(100, TxKind::Bet, "bet on team 1").unwrap();
        assert_eq!(balance, 900);
        assert_eq!(ledger.history().len(), 1);
        let tx = &ledger.history()[0];
        assert_eq!(tx.amount, -100);
        assert_eq!(tx.kind, TxKind::Bet);
    }

    #[test]
    fn overdraw_rejected_and_nothing_recorded() {
        let mut ledger = Ledger::new(50);
        let err = ledger.debit(100, TxKind::Bet, "too big").unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: 50,
                amount: 100
            }
        );
        assert_eq!(ledger.balance(), 50);
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn balance_matches_signed_sum_of_log() {
        let mut ledger = Ledger::new(1000);
        ledger.debit(100, TxKind::Bet, "bet").unwrap();
        ledger.credit(250, TxKind::Win, "payout");
        ledger.debit(400, TxKind::Bet, "bet").unwrap();

        let sum: i64 = ledger.history().iter().map(|tx| tx.amount).sum();
        assert_eq!(ledger.balance() as i64, 1000 + sum);
        assert_eq!(ledger.balance(), 750);
    }

    #[test]
    fn history_preserves_insertion_order() {
        let mut ledger = Ledger::new(1000);
        ledger.debit(10, TxKind::Bet, "first").unwrap();
        ledger.debit(20, TxKind::Bet, "second").unwrap();
        ledger.credit(30, TxKind::Win, "third");
        let descriptions: Vec<&str> = ledger
            .history()
            .iter()
            .map(|tx| tx.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);
    }
}
