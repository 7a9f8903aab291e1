use crate::domain::order::{GroupId, GroupStatus};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The client already holds a position or a pending order for the ticker.
    Conflict(String),
    Other(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Conflict(detail) => write!(f, "conflict: {detail}"),
            FailureReason::Other(detail) => f.write_str(detail),
        }
    }
}

/// Lifecycle of one submission inside a dialog.
///
/// `Done` and `Failed` are resting states: the operator may submit again from either.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OrderState {
    #[default]
    Idle,
    Submitting,
    Polling {
        group_id: GroupId,
        status: Option<GroupStatus>,
    },
    Done {
        group_id: Option<GroupId>,
    },
    Failed {
        reason: FailureReason,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Submit,
    Accepted(GroupId),
    NothingToExecute,
    Rejected(FailureReason),
    Polled(GroupId, GroupStatus),
    Executed(GroupId),
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IllegalTransition {
    pub from: OrderState,
    pub event: OrderEvent,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "illegal order transition: {} on {:?}",
            self.from.name(),
            self.event
        )
    }
}

impl std::error::Error for IllegalTransition {}

impl OrderState {
    pub fn name(&self) -> &'static str {
        match self {
            OrderState::Idle => "idle",
            OrderState::Submitting => "submitting",
            OrderState::Polling { .. } => "polling",
            OrderState::Done { .. } => "done",
            OrderState::Failed { .. } => "failed",
        }
    }

    /// Whether a new submission may start.
    pub fn accepts_submit(&self) -> bool {
        matches!(
            self,
            OrderState::Idle | OrderState::Done { .. } | OrderState::Failed { .. }
        )
    }

    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            OrderState::Polling { group_id, .. } => Some(group_id),
            OrderState::Done { group_id } => group_id.as_ref(),
            _ => None,
        }
    }

    pub fn transition(&self, event: OrderEvent) -> Result<OrderState, IllegalTransition> {
        let next = match (self, &event) {
            (_, OrderEvent::Reset) => Some(OrderState::Idle),
            (s, OrderEvent::Submit) if s.accepts_submit() => Some(OrderState::Submitting),
            (OrderState::Submitting, OrderEvent::Accepted(group_id)) => Some(OrderState::Polling {
                group_id: group_id.clone(),
                status: None,
            }),
            (OrderState::Submitting, OrderEvent::NothingToExecute) => {
                Some(OrderState::Done { group_id: None })
            }
            (OrderState::Submitting, OrderEvent::Rejected(reason)) => Some(OrderState::Failed {
                reason: reason.clone(),
            }),
            (OrderState::Polling { group_id, .. }, OrderEvent::Polled(polled, status))
                if polled == group_id =>
            {
                Some(OrderState::Polling {
                    group_id: group_id.clone(),
                    status: Some(status.clone()),
                })
            }
            (OrderState::Polling { group_id, .. }, OrderEvent::Executed(done))
                if done == group_id =>
            {
                Some(OrderState::Done {
                    group_id: Some(group_id.clone()),
                })
            }
            _ => None,
        };

        next.ok_or_else(|| IllegalTransition {
            from: self.clone(),
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gid(s: &str) -> GroupId {
        GroupId::new(s)
    }

    fn run(events: Vec<OrderEvent>) -> Result<OrderState, IllegalTransition> {
        events
            .into_iter()
            .try_fold(OrderState::Idle, |s, e| s.transition(e))
    }

    #[test]
    fn happy_path_reaches_done() {
        let status = GroupStatus {
            executed_all: true,
            ..Default::default()
        };
        let s = run(vec![
            OrderEvent::Submit,
            OrderEvent::Accepted(gid("g1")),
            OrderEvent::Polled(gid("g1"), GroupStatus::default()),
            OrderEvent::Polled(gid("g1"), status.clone()),
            OrderEvent::Executed(gid("g1")),
        ])
        .unwrap();
        assert_eq!(
            s,
            OrderState::Done {
                group_id: Some(gid("g1"))
            }
        );
        assert!(s.accepts_submit());
    }

    #[test]
    fn polled_snapshot_is_overwritten_each_tick() {
        let first = GroupStatus {
            created_operation_id: Some(1),
            ..Default::default()
        };
        let second = GroupStatus {
            created_operation_id: Some(2),
            ..Default::default()
        };
        let s = run(vec![
            OrderEvent::Submit,
            OrderEvent::Accepted(gid("g1")),
            OrderEvent::Polled(gid("g1"), first),
            OrderEvent::Polled(gid("g1"), second.clone()),
        ])
        .unwrap();
        assert_eq!(
            s,
            OrderState::Polling {
                group_id: gid("g1"),
                status: Some(second)
            }
        );
    }

    #[test]
    fn nothing_to_execute_and_rejection_are_resting_states() {
        let s = run(vec![OrderEvent::Submit, OrderEvent::NothingToExecute]).unwrap();
        assert_eq!(s, OrderState::Done { group_id: None });

        let s = run(vec![
            OrderEvent::Submit,
            OrderEvent::Rejected(FailureReason::Other("boom".into())),
            OrderEvent::Submit,
        ])
        .unwrap();
        assert_eq!(s, OrderState::Submitting);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        // Polling requires a group id, so it can only be entered through Accepted.
        assert!(OrderState::Idle
            .transition(OrderEvent::Polled(gid("g1"), GroupStatus::default()))
            .is_err());
        assert!(OrderState::Idle
            .transition(OrderEvent::Accepted(gid("g1")))
            .is_err());
        assert!(OrderState::Submitting.transition(OrderEvent::Submit).is_err());

        let polling = OrderState::Polling {
            group_id: gid("g1"),
            status: None,
        };
        assert!(polling.transition(OrderEvent::Submit).is_err());
        let err = polling
            .transition(OrderEvent::Executed(gid("other")))
            .unwrap_err();
        assert_eq!(err.from, polling);
    }

    #[test]
    fn reset_is_always_allowed() {
        let polling = OrderState::Polling {
            group_id: gid("g1"),
            status: None,
        };
        assert_eq!(polling.transition(OrderEvent::Reset).unwrap(), OrderState::Idle);
        assert_eq!(
            OrderState::Submitting.transition(OrderEvent::Reset).unwrap(),
            OrderState::Idle
        );
    }
}
