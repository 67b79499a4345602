use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Tracing sessions a restricted user may open per calendar day.
pub const MAX_DAILY_SESSIONS: u32 = 5;

/// Auth/session-limit provider consulted before a tracing surface mounts.
pub trait AccessPolicy: Send + Sync {
    /// Unrestricted users never consume session allowance.
    fn is_unrestricted(&self) -> bool;

    /// Whether a restricted user may open another session now.
    fn is_session_permitted(&self) -> bool;

    /// Count one opened session against the allowance.
    fn record_session(&self);
}

#[derive(Debug)]
struct DailyUsage {
    date: NaiveDate,
    sessions_used: u32,
}

/// In-process daily session counter. The count resets when the local date
/// changes.
#[derive(Debug)]
pub struct DailySessionPolicy {
    unrestricted: bool,
    max_sessions: u32,
    usage: Mutex<DailyUsage>,
}

impl DailySessionPolicy {
    pub fn new(max_sessions: u32) -> Self {
        Self {
            unrestricted: false,
            max_sessions,
            usage: Mutex::new(DailyUsage {
                date: today(),
                sessions_used: 0,
            }),
        }
    }

    pub fn unrestricted() -> Self {
        Self {
            unrestricted: true,
            ..Self::new(MAX_DAILY_SESSIONS)
        }
    }

    pub fn sessions_used(&self) -> u32 {
        let mut usage = self.usage.lock();
        roll_over(&mut usage);
        usage.sessions_used
    }

    pub fn remaining_sessions(&self) -> u32 {
        self.max_sessions.saturating_sub(self.sessions_used())
    }
}

impl Default for DailySessionPolicy {
    fn default() -> Self {
        Self::new(MAX_DAILY_SESSIONS)
    }
}

impl AccessPolicy for DailySessionPolicy {
    fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    fn is_session_permitted(&self) -> bool {
        self.unrestricted || self.sessions_used() < self.max_sessions
    }

    fn record_session(&self) {
        if self.unrestricted {
            return;
        }
        let mut usage = self.usage.lock();
        roll_over(&mut usage);
        usage.sessions_used += 1;
        info!(
            "Tracing session {}/{} used today",
            usage.sessions_used, self.max_sessions
        );
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn roll_over(usage: &mut DailyUsage) {
    let today = today();
    if usage.date != today {
        debug!("New day, resetting session count");
        usage.date = today;
        usage.sessions_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reached_after_max_sessions() {
        let policy = DailySessionPolicy::new(2);
        assert!(policy.is_session_permitted());

        policy.record_session();
        policy.record_session();
        assert!(!policy.is_session_permitted());
        assert_eq!(policy.remaining_sessions(), 0);
    }

    #[test]
    fn test_unrestricted_never_counts() {
        let policy = DailySessionPolicy::unrestricted();
        for _ in 0..10 {
            policy.record_session();
        }
        assert!(policy.is_session_permitted());
        assert_eq!(policy.sessions_used(), 0);
    }

    #[test]
    fn test_count_resets_on_new_day() {
        let policy = DailySessionPolicy::new(1);
        policy.record_session();
        assert!(!policy.is_session_permitted());

        policy.usage.lock().date = today().pred_opt().unwrap();
        assert!(policy.is_session_permitted());
        assert_eq!(policy.sessions_used(), 0);
    }
}
