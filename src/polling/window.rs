use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};

use crate::error::ConfigError;

/// Half-open hour range `[start, end)` within one day, `0 <= start < end <= 24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourRange {
    start: u32,
    end: u32,
}

impl HourRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ConfigError> {
        if start < end && end <= 24 {
            Ok(HourRange { start, end })
        } else {
            Err(ConfigError::InvalidWindow(format!(
                "hour range {}-{} must satisfy 0 <= start < end <= 24",
                start, end
            )))
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start <= hour && hour < self.end
    }
}

/// Weekday/hour ranges during which periodic polling may start, evaluated in
/// a fixed UTC offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshWindow {
    offset: FixedOffset,
    days: [Vec<HourRange>; 7],
}

/// Default window spec: weeknight and weekend game slots.
pub const DEFAULT_WINDOW_SPEC: &str = "thu=19-24,sat=12-24,sun=12-24,mon=19-24";

impl RefreshWindow {
    /// A window with no allowed hours.
    pub fn empty(offset: FixedOffset) -> Self {
        RefreshWindow {
            offset,
            days: Default::default(),
        }
    }

    /// Every hour of every day.
    pub fn always(offset: FixedOffset) -> Self {
        let mut w = Self::empty(offset);
        for day in w.days.iter_mut() {
            day.push(HourRange { start: 0, end: 24 });
        }
        w
    }

    pub fn with_range(mut self, day: Weekday, range: HourRange) -> Self {
        self.days[day.num_days_from_monday() as usize].push(range);
        self
    }

    /// Parse `day=start-end` entries separated by commas, e.g.
    /// `sun=12-24,mon=19-24`. A day may appear more than once.
    pub fn parse(spec: &str, offset: FixedOffset) -> Result<Self, ConfigError> {
        let mut window = Self::empty(offset);
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (day, hours) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidWindow(format!("`{}` is not of the form day=start-end", entry))
            })?;
            let day: Weekday = day
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidWindow(format!("unknown weekday `{}`", day.trim())))?;
            let (start, end) = hours.split_once('-').ok_or_else(|| {
                ConfigError::InvalidWindow(format!("`{}` is not an hour range", hours))
            })?;
            let parse_hour = |s: &str| {
                s.trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError::InvalidWindow(format!("`{}` is not an hour", s.trim())))
            };
            let range = HourRange::new(parse_hour(start)?, parse_hour(end)?)?;
            window = window.with_range(day, range);
        }
        Ok(window)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        let day = local.weekday().num_days_from_monday() as usize;
        let hour = local.hour();
        self.days[day].iter().any(|r| r.contains(hour))
    }
}

impl Default for RefreshWindow {
    fn default() -> Self {
        let utc = Utc.fix();
        Self::parse(DEFAULT_WINDOW_SPEC, utc).unwrap_or_else(|_| Self::empty(utc))
    }
}
