//! Time-window gating for another access pattern.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use tracing::debug;

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    error::{WardenError, WardenResult},
};
use warden_core::{
    clock::{Clock, SystemClock},
    traits::AccessPattern,
};

/// Restricts a base pattern to an hour window and, optionally, to a set of
/// weekdays.
///
/// The window is `[start_hour, end_hour)` in the configured offset. A window
/// whose start is after its end wraps midnight (`22..6` covers 22:00 to
/// 05:59). Outside the window the result is a deny and the base pattern is
/// not consulted.
pub struct TimeBasedAccessPattern {
    id: String,
    description: String,
    priority: i32,
    base: Box<dyn AccessPattern>,
    start_hour: u32,
    end_hour: u32,
    weekdays: Option<Vec<Weekday>>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl TimeBasedAccessPattern {
    /// Wrap `base` in an hour window. Hours are 0–24 and must differ.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        base: Box<dyn AccessPattern>,
        start_hour: u32,
        end_hour: u32,
        priority: i32,
    ) -> WardenResult<Self> {
        let id = id.into();
        if start_hour > 24 || end_hour > 24 || start_hour == end_hour {
            return Err(WardenError::InvalidPattern {
                pattern: id,
                reason: format!("invalid hour window {}-{}", start_hour, end_hour),
            });
        }
        Ok(Self {
            id,
            description: description.into(),
            priority,
            base,
            start_hour,
            end_hour,
            weekdays: None,
            offset: Utc.fix(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_weekdays(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.weekdays = Some(days.into_iter().collect());
        self
    }

    /// Interpret the window at `offset` instead of UTC.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn window_label(&self) -> String {
        format!("{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }

    fn hour_in_window(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    fn deny(&self, reason: String) -> AccessPatternResult {
        let mut result = AccessPatternResult::deny(&self.id, reason);
        result.metadata.window = Some(self.window_label());
        result
    }
}

#[async_trait]
impl AccessPattern for TimeBasedAccessPattern {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, ctx: &AccessContext) -> WardenResult<bool> {
        self.base.applies_to(ctx)
    }

    async fn validate(&self, ctx: &AccessContext) -> WardenResult<AccessPatternResult> {
        let now = self.clock.now().with_timezone(&self.offset);

        if !self.hour_in_window(now.hour()) {
            debug!(pattern_id = %self.id, hour = now.hour(), window = %self.window_label(), "outside time window");
            return Ok(self.deny(format!(
                "Access denied outside allowed hours {}",
                self.window_label()
            )));
        }

        if let Some(days) = &self.weekdays {
            let today = now.weekday();
            if !days.contains(&today) {
                debug!(pattern_id = %self.id, weekday = %today, "outside allowed weekdays");
                return Ok(self.deny(format!("Access denied on {}", today)));
            }
        }

        self.base.validate(ctx).await
    }
}
