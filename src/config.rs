use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_STATES: usize = 10_000;

/// Bounds on the work a single build may do.
///
/// Checked before every new state is admitted, both by exploration and by subset
/// construction. Exceeding it is reported as `Error::StateLimitExceeded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_states: usize,
}

impl Limits {
    pub fn new(max_states: usize) -> Self {
        Limits { max_states }
    }

    pub fn unbounded() -> Self {
        Limits {
            max_states: usize::MAX,
        }
    }

    /// Whether a build that already holds `current` states may admit one more.
    #[inline]
    pub fn admits(&self, current: usize) -> bool {
        current < self.max_states
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits::new(DEFAULT_MAX_STATES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_ceiling() {
        let limits = Limits::new(2);
        assert!(limits.admits(0));
        assert!(limits.admits(1));
        assert!(!limits.admits(2));
        assert!(Limits::unbounded().admits(1 << 40));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let limits: Limits = serde_json::from_str("{}").unwrap();
        assert_eq!(limits, Limits::default());
        let limits: Limits = serde_json::from_str(r#"{"max_states": 7}"#).unwrap();
        assert_eq!(limits.max_states, 7);
    }
}
