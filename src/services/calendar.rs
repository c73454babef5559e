use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One operating window. `end_time` may be on the following calendar day
/// (the venue trades through midnight); `last_arrival` always lies between
/// start and (possibly next-day) end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub last_arrival: NaiveTime,
}

/// Date-keyed override of the default window, e.g. a ticketed special event
/// with extended hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialHours {
    pub date: NaiveDate,
    pub name: String,
    #[serde(flatten)]
    pub hours: OperatingHours,
}

/// Operating calendar: one recurring default rule plus named special dates.
///
/// Modeled as an injected immutable value, read-only at request time, so
/// tests can substitute alternate calendars without process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingCalendar {
    pub default_hours: OperatingHours,
    #[serde(default)]
    pub special_dates: Vec<SpecialHours>,
}

/// Window resolved for a concrete date.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedWindow {
    #[serde(flatten)]
    pub hours: OperatingHours,
    pub is_special: bool,
    pub label: Option<String>,
}

fn hms(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("static clock time")
}

impl Default for OperatingCalendar {
    /// The house default: doors at 23:00, close at 06:00, last arrival 02:00.
    fn default() -> Self {
        Self {
            default_hours: OperatingHours {
                start_time: hms(23, 0),
                end_time: hms(6, 0),
                last_arrival: hms(2, 0),
            },
            special_dates: Vec::new(),
        }
    }
}

impl OperatingCalendar {
    /// Loads the calendar from a JSON file, e.g.
    /// `{"default_hours": {...}, "special_dates": [...]}`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let calendar: OperatingCalendar = serde_json::from_str(&raw)?;
        info!(
            "Operating calendar loaded from {} ({} special dates)",
            path,
            calendar.special_dates.len()
        );
        Ok(calendar)
    }

    /// Resolves the operating window for a date. Exact-date match against the
    /// override list wins; otherwise the recurring default applies. Absence
    /// of an override is the common case, not an error.
    pub fn resolve_window(&self, date: NaiveDate) -> ResolvedWindow {
        match self.special_dates.iter().find(|s| s.date == date) {
            Some(special) => ResolvedWindow {
                hours: special.hours,
                is_special: true,
                label: Some(special.name.clone()),
            },
            None => ResolvedWindow {
                hours: self.default_hours,
                is_special: false,
                label: None,
            },
        }
    }
}
