use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

use crate::models::{Availability, DayOfWeek, DaySlots, TimeRange};

/// Offered when a doctor has never published availability.
pub const DEFAULT_SLOTS: [(u32, u32); 6] = [(9, 0), (10, 0), (11, 0), (14, 0), (15, 0), (16, 0)];

pub fn default_slots() -> Vec<NaiveTime> {
    DEFAULT_SLOTS
        .iter()
        .filter_map(|(h, m)| NaiveTime::from_hms_opt(*h, *m, 0))
        .collect()
}

/// Turns a date and a weekly schedule into hour-aligned start times.
///
/// A slot at `h:00` is offered when the whole hour `[h:00, h+1:00)` fits inside
/// one declared range. Days without a key, with an empty range list, or whose
/// ranges fit no whole hour are reported as [`DaySlots::Unavailable`].
pub fn generate_slots(date: NaiveDate, availability: &Availability) -> DaySlots {
    let day = DayOfWeek::from_date(date);

    let ranges = match availability.ranges_for(day) {
        Some(ranges) if !ranges.is_empty() => ranges,
        _ => return DaySlots::Unavailable,
    };

    let mut slots: Vec<NaiveTime> = ranges.iter().flat_map(hourly_starts).collect();
    slots.sort();
    slots.dedup();

    if slots.is_empty() {
        DaySlots::Unavailable
    } else {
        DaySlots::Slots(slots)
    }
}

/// Availability may be absent altogether, in which case the generic list applies.
pub fn offerable_slots(date: NaiveDate, availability: Option<&Availability>) -> DaySlots {
    match availability {
        Some(availability) => generate_slots(date, availability),
        None => DaySlots::Slots(default_slots()),
    }
}

fn hourly_starts(range: &TimeRange) -> Vec<NaiveTime> {
    let first_hour = if range.start.minute() == 0 && range.start.second() == 0 {
        range.start.hour()
    } else {
        range.start.hour() + 1
    };

    (first_hour..24)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .take_while(|start| fits(*start, range.end))
        .collect()
}

fn fits(start: NaiveTime, end: NaiveTime) -> bool {
    // 23:00 + 1h wraps to 00:00, which never fits a same-day range.
    let (slot_end, wrapped) = start.overflowing_add_signed(Duration::hours(1));
    wrapped == 0 && slot_end <= end
}
