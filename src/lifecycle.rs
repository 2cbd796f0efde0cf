//! Order lifecycle state machine.
//!
//! The legal transitions are encoded in one explicit table ([`apply`]) so the
//! services can guard a status change inside the same database transaction
//! that persists it. There is no save hook anywhere that mutates a status.
//!
//! ```text
//! pending -> confirmed -> preparing -> shipped -> delivered
//!    \           |            |           |
//!     +----------+------------+-----------+--> cancelled
//! ```
//!
//! `delivered` and `cancelled` are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// A delivered or cancelled order can no longer be cancelled.
    pub fn cancellable(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Confirm,
    Prepare,
    Ship,
    Deliver,
    Cancel,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Prepare => "prepare",
            Transition::Ship => "ship",
            Transition::Deliver => "deliver",
            Transition::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirm" => Some(Transition::Confirm),
            "prepare" => Some(Transition::Prepare),
            "ship" => Some(Transition::Ship),
            "deliver" => Some(Transition::Deliver),
            "cancel" => Some(Transition::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. Returns `None` for every (status, event) pair that
/// is not listed as legal.
pub fn apply(from: OrderStatus, event: Transition) -> Option<OrderStatus> {
    use OrderStatus::*;
    match (from, event) {
        (Pending, Transition::Confirm) => Some(Confirmed),
        (Confirmed, Transition::Prepare) => Some(Preparing),
        (Preparing, Transition::Ship) => Some(Shipped),
        (Shipped, Transition::Deliver) => Some(Delivered),
        (Pending | Confirmed | Preparing | Shipped, Transition::Cancel) => Some(Cancelled),
        _ => None,
    }
}

/// Like [`apply`] but surfaces the illegal pair as a typed error.
pub fn advance(from: OrderStatus, event: Transition) -> Result<OrderStatus, AppError> {
    apply(from, event).ok_or(AppError::InvalidTransition { from, event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;
    use Transition::*;

    const STATUSES: [OrderStatus; 6] =
        [Pending, Confirmed, Preparing, Shipped, Delivered, Cancelled];
    const TRANSITIONS: [Transition; 5] = [Confirm, Prepare, Ship, Deliver, Cancel];

    #[test]
    fn happy_path_reaches_delivered() {
        let mut status = Pending;
        for event in [Confirm, Prepare, Ship, Deliver] {
            status = apply(status, event).unwrap();
        }
        assert_eq!(status, Delivered);
    }

    #[test]
    fn cancel_allowed_from_every_non_terminal_status() {
        for from in [Pending, Confirmed, Preparing, Shipped] {
            assert_eq!(apply(from, Cancel), Some(Cancelled), "from {from}");
        }
        assert_eq!(apply(Delivered, Cancel), None);
        assert_eq!(apply(Cancelled, Cancel), None);
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        for from in [Delivered, Cancelled] {
            for event in TRANSITIONS {
                assert_eq!(apply(from, event), None, "{from} + {event}");
            }
        }
    }

    #[test]
    fn exactly_the_listed_pairs_are_legal() {
        let legal = [
            (Pending, Confirm),
            (Confirmed, Prepare),
            (Preparing, Ship),
            (Shipped, Deliver),
            (Pending, Cancel),
            (Confirmed, Cancel),
            (Preparing, Cancel),
            (Shipped, Cancel),
        ];
        for from in STATUSES {
            for event in TRANSITIONS {
                let expected = legal.contains(&(from, event));
                assert_eq!(
                    apply(from, event).is_some(),
                    expected,
                    "{from} + {event}"
                );
            }
        }
    }

    #[test]
    fn advance_reports_the_offending_pair() {
        let err = advance(Delivered, Ship).unwrap_err();
        match err {
            AppError::InvalidTransition { from, event } => {
                assert_eq!(from, Delivered);
                assert_eq!(event, Ship);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancellable_matches_terminality() {
        for status in STATUSES {
            assert_eq!(status.cancellable(), !status.is_terminal());
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in STATUSES {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("paid"), None);
        for event in TRANSITIONS {
            assert_eq!(Transition::parse(event.as_str()), Some(event));
        }
    }
}
