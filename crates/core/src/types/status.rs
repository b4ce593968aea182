//! Status enums for checkout sessions and gateway orders.

use serde::{Deserialize, Serialize};

/// Where a checkout session currently stands.
///
/// `Succeeded` and `Failed` are terminal for a session; a new checkout
/// attempt always starts a fresh session at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    Idle,
    AwaitingOrder,
    AwaitingGateway,
    Succeeded,
    Failed,
}

impl CheckoutStatus {
    /// Whether the session can make no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingOrder => write!(f, "awaiting_order"),
            Self::AwaitingGateway => write!(f, "awaiting_gateway"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Server-side state of a gateway order, reconciled from verification
/// results and gateway webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Order created at the gateway, no payment seen yet.
    #[default]
    Created,
    /// A payment was attempted but its signature did not verify.
    Attempted,
    /// The gateway reported the payment as failed.
    Failed,
    /// Payment verified or captured.
    Paid,
    /// Payment refunded.
    Refunded,
}

impl OrderState {
    /// Progress rank used to keep ledger updates monotonic.
    ///
    /// Webhooks can arrive late or out of order; a record never moves to a
    /// lower rank.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Attempted | Self::Failed => 1,
            Self::Paid => 2,
            Self::Refunded => 3,
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Attempted => write!(f, "attempted"),
            Self::Failed => write!(f, "failed"),
            Self::Paid => write!(f, "paid"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_status_terminal() {
        assert!(CheckoutStatus::Succeeded.is_terminal());
        assert!(CheckoutStatus::Failed.is_terminal());
        assert!(!CheckoutStatus::Idle.is_terminal());
        assert!(!CheckoutStatus::AwaitingGateway.is_terminal());
    }

    #[test]
    fn test_checkout_status_serde_matches_display() {
        for status in [
            CheckoutStatus::Idle,
            CheckoutStatus::AwaitingOrder,
            CheckoutStatus::AwaitingGateway,
            CheckoutStatus::Succeeded,
            CheckoutStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn test_order_state_rank_ordering() {
        assert!(OrderState::Created.rank() < OrderState::Failed.rank());
        assert!(OrderState::Failed.rank() < OrderState::Paid.rank());
        assert!(OrderState::Paid.rank() < OrderState::Refunded.rank());
        assert_eq!(OrderState::Attempted.rank(), OrderState::Failed.rank());
    }
}
