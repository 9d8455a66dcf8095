use crate::domain::payment::Payment;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Platform commission withheld from every payout: 5%.
pub fn platform_fee_rate() -> Decimal {
    Decimal::new(5, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    Held,
    Released,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Held => "HELD",
            EscrowStatus::Released => "RELEASED",
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HELD" => Ok(EscrowStatus::Held),
            "RELEASED" => Ok(EscrowStatus::Released),
            other => Err(format!("unknown escrow status {other}")),
        }
    }
}

/// Funds held against one payment until the job is done.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Escrow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Escrow {
    pub fn held_for(payment: &Payment) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            amount: payment.amount,
            fee: (payment.amount * platform_fee_rate()).round_dp(2),
            status: EscrowStatus::Held,
            created_at: payment.created_at,
            released_at: None,
        }
    }

    /// What the provider receives once the escrow is released.
    pub fn payout(&self) -> Decimal {
        self.amount - self.fee
    }
}
