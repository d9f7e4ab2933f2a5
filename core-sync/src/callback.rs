//! Scheduler callback payloads.

use std::fmt;

/// Payload tag of the recurring sync callback.
pub const SYNC_CALLBACK_TAG: &str = "nd_sync_spotify";

/// A callback delivered by the host scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCallback {
    /// Run one full sync pass
    Sync,
    /// A tag this engine did not register
    Unknown(String),
}

impl SchedulerCallback {
    pub fn parse(payload: &str) -> Self {
        match payload.trim() {
            SYNC_CALLBACK_TAG => SchedulerCallback::Sync,
            other => SchedulerCallback::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            SchedulerCallback::Sync => SYNC_CALLBACK_TAG,
            SchedulerCallback::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for SchedulerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_tag() {
        assert_eq!(SchedulerCallback::parse("nd_sync_spotify"), SchedulerCallback::Sync);
        assert_eq!(SchedulerCallback::parse(" nd_sync_spotify\n"), SchedulerCallback::Sync);
    }

    #[test]
    fn test_parse_unknown_tag() {
        let callback = SchedulerCallback::parse("nd_cleanup");
        assert_eq!(callback, SchedulerCallback::Unknown("nd_cleanup".to_string()));
        assert_eq!(callback.to_string(), "nd_cleanup");
    }
}
