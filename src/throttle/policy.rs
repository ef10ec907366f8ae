//! Read kinds and trigger policies for monitor entries.

/// Which read primitive a monitor uses for its pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    /// Logic level, `0` or `1`.
    Digital,
    /// Raw ADC count.
    Analog,
}

/// Boolean rule combining the elapsed-time and value-change conditions.
///
/// | Policy             | Fires when                          |
/// |--------------------|-------------------------------------|
/// | `OnTimer`          | interval elapsed                    |
/// | `OnChange`         | value differs from last fired value |
/// | `OnTimerAndChange` | both                                |
/// | `OnTimerOrChange`  | either                              |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    OnTimer,
    OnChange,
    OnTimerAndChange,
    OnTimerOrChange,
}

impl TriggerPolicy {
    /// Fire decision for one evaluation.
    pub const fn should_fire(self, is_time_elapsed: bool, has_changed: bool) -> bool {
        match self {
            Self::OnTimer => is_time_elapsed,
            Self::OnChange => has_changed,
            Self::OnTimerAndChange => is_time_elapsed && has_changed,
            Self::OnTimerOrChange => is_time_elapsed || has_changed,
        }
    }
}
