use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::services::calendar::{OperatingCalendar, OperatingHours};

/// Arrival slots are offered on a fixed half-hour grid.
pub const SLOT_INTERVAL_MINUTES: u32 = 30;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Derives the discrete arrival slots for a date from the operating
/// calendar. Stateless: the sequence is recomputed per call, never cached.
#[derive(Clone)]
pub struct SlotGenerator {
    calendar: Arc<OperatingCalendar>,
}

impl SlotGenerator {
    pub fn new(calendar: Arc<OperatingCalendar>) -> Self {
        Self { calendar }
    }

    /// Ordered arrival slots for `date`, at 30-minute increments from the
    /// open time up to and including the last-arrival time.
    pub fn generate_slots(&self, date: NaiveDate) -> Vec<NaiveTime> {
        let window = self.calendar.resolve_window(date);
        slots_for_window(&window.hours)
    }

    /// True iff `(date, time)` could have been produced by
    /// [`generate_slots`]. This is the sole gate for client-submitted
    /// arrival times.
    pub fn is_valid_slot(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.generate_slots(date).contains(&time)
    }
}

fn slots_for_window(hours: &OperatingHours) -> Vec<NaiveTime> {
    let start_minutes = hours.start_time.hour() * 60 + hours.start_time.minute();
    let mut end_minutes = hours.last_arrival.hour() * 60 + hours.last_arrival.minute();

    // Sessions cross midnight: a last arrival whose clock hour is numerically
    // below the opening hour belongs to the next calendar day.
    if hours.last_arrival.hour() < hours.start_time.hour() {
        end_minutes += MINUTES_PER_DAY;
    }

    let mut slots = Vec::new();
    let mut cursor = start_minutes;
    while cursor <= end_minutes {
        let wrapped = cursor % MINUTES_PER_DAY;
        let slot = NaiveTime::from_hms_opt(wrapped / 60, wrapped % 60, 0)
            .expect("wrapped minutes stay within a day");
        slots.push(slot);
        cursor += SLOT_INTERVAL_MINUTES;
    }
    slots
}
