use chrono::Duration;

/// A latched gateway that reports within this window counts as back online
pub const RECOVERY_WINDOW_MINUTES: i64 = 3;

/// Hysteresis state of the offline alarm, derived from the persisted latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineAlarmState {
    /// No offline notification outstanding
    Normal,
    /// An offline notification went out and has not been cleared
    AlarmedOffline,
}

impl OfflineAlarmState {
    pub fn from_latch(has_sent_offline_notification: bool) -> Self {
        if has_sent_offline_notification {
            OfflineAlarmState::AlarmedOffline
        } else {
            OfflineAlarmState::Normal
        }
    }
}

/// A transition the alarm pass must act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineTransition {
    /// Crossed the silence threshold; send the offline notification
    RaiseAlarm,
    /// Reported again after a latched alarm; send the recovery notification
    ClearAlarm,
}

/// Decide what the offline alarm does for one gateway. Outside the two
/// transitions the state holds: a latched gateway that stays silent is not
/// re-notified, and silence shorter than the threshold raises nothing.
pub fn evaluate_offline_transition(
    state: OfflineAlarmState,
    silent_for: Duration,
    threshold_minutes: i64,
) -> Option<OfflineTransition> {
    match state {
        OfflineAlarmState::Normal if silent_for >= Duration::minutes(threshold_minutes) => {
            Some(OfflineTransition::RaiseAlarm)
        }
        OfflineAlarmState::AlarmedOffline
            if silent_for <= Duration::minutes(RECOVERY_WINDOW_MINUTES) =>
        {
            Some(OfflineTransition::ClearAlarm)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raises_once_threshold_is_crossed() {
        let transition =
            evaluate_offline_transition(OfflineAlarmState::Normal, Duration::minutes(15), 10);

        assert_eq!(transition, Some(OfflineTransition::RaiseAlarm));
    }

    #[test]
    fn raises_exactly_at_threshold() {
        let transition =
            evaluate_offline_transition(OfflineAlarmState::Normal, Duration::minutes(10), 10);

        assert_eq!(transition, Some(OfflineTransition::RaiseAlarm));
    }

    #[test]
    fn stays_quiet_below_threshold() {
        let transition =
            evaluate_offline_transition(OfflineAlarmState::Normal, Duration::minutes(9), 10);

        assert_eq!(transition, None);
    }

    #[test]
    fn does_not_renotify_while_latched() {
        let transition = evaluate_offline_transition(
            OfflineAlarmState::AlarmedOffline,
            Duration::minutes(16),
            10,
        );

        assert_eq!(transition, None);
    }

    #[test]
    fn clears_after_a_recent_report() {
        let transition = evaluate_offline_transition(
            OfflineAlarmState::AlarmedOffline,
            Duration::minutes(1),
            10,
        );

        assert_eq!(transition, Some(OfflineTransition::ClearAlarm));
    }

    #[test]
    fn clears_exactly_at_the_recovery_window() {
        let transition = evaluate_offline_transition(
            OfflineAlarmState::AlarmedOffline,
            Duration::minutes(RECOVERY_WINDOW_MINUTES),
            10,
        );

        assert_eq!(transition, Some(OfflineTransition::ClearAlarm));
    }

    #[test]
    fn holds_the_latch_between_recovery_and_threshold() {
        // A report older than the recovery window does not clear the latch
        let transition = evaluate_offline_transition(
            OfflineAlarmState::AlarmedOffline,
            Duration::minutes(5),
            10,
        );

        assert_eq!(transition, None);
    }

    #[test]
    fn latch_maps_to_state() {
        assert_eq!(
            OfflineAlarmState::from_latch(true),
            OfflineAlarmState::AlarmedOffline
        );
        assert_eq!(
            OfflineAlarmState::from_latch(false),
            OfflineAlarmState::Normal
        );
    }
}
