use time::{Date, Duration};

use super::IssuerCode;

/// An inclusive date range of one issuer's history requested in a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub code: IssuerCode,
    pub from: Date,
    pub to: Date,
}

impl FetchWindow {
    /// Slice `[today - history_days, today]` into windows of `window_days`,
    /// newest first.
    ///
    /// Each window starts on the day the next-newer one ends on, so the union
    /// covers the whole range without gaps. The oldest window is clipped to
    /// the lower bound.
    pub fn plan(code: &IssuerCode, today: Date, history_days: u32, window_days: u32) -> Vec<Self> {
        let window = Duration::days(i64::from(window_days.max(1)));
        let lower = today
            .checked_sub(Duration::days(i64::from(history_days)))
            .unwrap_or(Date::MIN);

        let mut windows = Vec::new();
        let mut to = today;
        loop {
            let from = to.checked_sub(window).unwrap_or(Date::MIN).max(lower);
            windows.push(Self {
                code: code.clone(),
                from,
                to,
            });
            if from <= lower {
                break;
            }
            to = from;
        }
        windows
    }
}
