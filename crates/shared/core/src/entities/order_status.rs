use serde::{Deserialize, Serialize};

/// Order lifecycle status as reported by the backend
///
/// Transitions are monotone in practice (`Pending` first, then one of the
/// others) but nothing downstream enforces it: the latest update wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, waiting for execution
    Pending,
    /// Completely filled
    Executed,
    /// Cancelled by the user or by an emergency stop
    Cancelled,
    /// Rejected or errored at the backend
    Failed,
    /// Some quantity filled, remainder still working
    PartiallyFilled,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Executed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    /// Returns true if the order is still working
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled)
    }
}
