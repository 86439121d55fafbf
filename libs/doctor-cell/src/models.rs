use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub specialty: String,
    #[serde(default)]
    pub qualification: Option<String>,
    #[serde(default)]
    pub experience_years: Option<i32>,
    #[serde(default)]
    pub availability: Option<Availability>,
    /// Set when the stored schedule could not be parsed; `availability` is then `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_error: Option<String>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("Unknown"),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string()
    }

    pub fn display_name(&self) -> String {
        format!("Dr. {} ({})", self.full_name(), self.specialty)
    }

    /// The published schedule, or the parse failure recorded when it was loaded.
    pub fn schedule(&self) -> Result<Option<&Availability>, AvailabilityError> {
        match &self.availability_error {
            Some(detail) => Err(AvailabilityError::Stored(detail.clone())),
            None => Ok(self.availability.as_ref()),
        }
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Weekday keys as stored in `availability.working_hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DayOfWeek {
    type Err = AvailabilityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.key() == value)
            .ok_or_else(|| AvailabilityError::UnknownWeekday(value.to_string()))
    }
}

/// A half-open window `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, AvailabilityError> {
        let range = Self { start, end };
        if start >= end {
            return Err(AvailabilityError::EmptyRange(range.to_string()));
        }
        Ok(range)
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl FromStr for TimeRange {
    type Err = AvailabilityError;

    /// Parses `HH:MM-HH:MM`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || AvailabilityError::Parse(value.to_string());

        let (start, end) = value.trim().split_once('-').ok_or_else(malformed)?;
        let start = parse_clock(start).ok_or_else(malformed)?;
        let end = parse_clock(end).ok_or_else(malformed)?;

        TimeRange::new(start, end)
    }
}

fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Validated weekly schedule. Ranges are sorted and pairwise disjoint per day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawAvailability", into = "RawAvailability")]
pub struct Availability {
    working_hours: BTreeMap<DayOfWeek, Vec<TimeRange>>,
}

impl Availability {
    pub fn new(working_hours: BTreeMap<DayOfWeek, Vec<TimeRange>>) -> Result<Self, AvailabilityError> {
        let mut validated = BTreeMap::new();

        for (day, mut ranges) in working_hours {
            ranges.sort();
            for pair in ranges.windows(2) {
                if pair[0].overlaps(&pair[1]) {
                    return Err(AvailabilityError::Overlap {
                        day,
                        first: pair[0].to_string(),
                        second: pair[1].to_string(),
                    });
                }
            }
            validated.insert(day, ranges);
        }

        Ok(Self { working_hours: validated })
    }

    /// `None` when the day has no key at all; `Some(&[])` when it is explicitly closed.
    pub fn ranges_for(&self, day: DayOfWeek) -> Option<&[TimeRange]> {
        self.working_hours.get(&day).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAvailability {
    #[serde(default)]
    working_hours: BTreeMap<String, Vec<String>>,
}

impl TryFrom<RawAvailability> for Availability {
    type Error = AvailabilityError;

    fn try_from(raw: RawAvailability) -> Result<Self, Self::Error> {
        let mut working_hours = BTreeMap::new();
        for (key, ranges) in raw.working_hours {
            let day: DayOfWeek = key.parse()?;
            let parsed = ranges
                .iter()
                .map(|range| range.parse::<TimeRange>())
                .collect::<Result<Vec<_>, _>>()?;
            working_hours.insert(day, parsed);
        }
        Availability::new(working_hours)
    }
}

impl From<Availability> for RawAvailability {
    fn from(availability: Availability) -> Self {
        let working_hours = availability
            .working_hours
            .into_iter()
            .map(|(day, ranges)| {
                (
                    day.key().to_string(),
                    ranges.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();
        Self { working_hours }
    }
}

/// Slots offered for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "slots", rename_all = "snake_case")]
pub enum DaySlots {
    /// The doctor does not work that day.
    Unavailable,
    Slots(Vec<NaiveTime>),
}

impl DaySlots {
    pub fn contains(&self, time: NaiveTime) -> bool {
        match self {
            DaySlots::Unavailable => false,
            DaySlots::Slots(slots) => slots.contains(&time),
        }
    }
}

// ==============================================================================
// SPECIALTY RECOMMENDATION
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "specialty", rename_all = "snake_case")]
pub enum SpecialtyRecommendation {
    Specialty(String),
    AllSpecialties,
}

#[derive(Debug, Deserialize)]
pub struct RecommendSpecialtyRequest {
    pub symptoms: String,
}

#[derive(Debug, Deserialize)]
pub struct DoctorListQuery {
    pub specialty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Cannot parse time range '{0}', expected HH:MM-HH:MM")]
    Parse(String),

    #[error("Time range {0} must start before it ends")]
    EmptyRange(String),

    #[error("Unknown weekday '{0}'")]
    UnknownWeekday(String),

    #[error("Ranges {first} and {second} overlap on {day}")]
    Overlap {
        day: DayOfWeek,
        first: String,
        second: String,
    },

    #[error("Stored availability is invalid: {0}")]
    Stored(String),
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error(transparent)]
    InvalidAvailability(#[from] AvailabilityError),

    #[error("Only the doctor may change their own availability")]
    NotOwner,

    #[error("Specialty recommendation failed: {0}")]
    Recommendation(String),

    #[error("Doctor store failure: {0}")]
    Store(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        let message = err.to_string();
        match err {
            DoctorError::NotFound => AppError::NotFound(message),
            DoctorError::InvalidAvailability(_) => AppError::Validation(message),
            DoctorError::NotOwner => AppError::Authorization(message),
            DoctorError::Recommendation(_) => AppError::ExternalService(message),
            DoctorError::Store(_) => AppError::Persistence(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_working_hours_json() {
        let availability: Availability = serde_json::from_value(json!({
            "working_hours": {
                "monday": ["14:00-17:00", "09:00-12:00"],
                "sunday": []
            }
        }))
        .unwrap();

        assert_eq!(
            availability.ranges_for(DayOfWeek::Monday).unwrap(),
            &[TimeRange { start: t(9, 0), end: t(12, 0) }, TimeRange { start: t(14, 0), end: t(17, 0) }]
        );
        assert_eq!(availability.ranges_for(DayOfWeek::Sunday), Some(&[][..]));
        assert_eq!(availability.ranges_for(DayOfWeek::Tuesday), None);
    }

    #[test]
    fn serializes_back_to_wire_format() {
        let availability: Availability = serde_json::from_value(json!({
            "working_hours": { "friday": ["08:30-12:00"] }
        }))
        .unwrap();

        assert_eq!(
            serde_json::to_value(&availability).unwrap(),
            json!({ "working_hours": { "friday": ["08:30-12:00"] } })
        );
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert_matches!("9-17".parse::<TimeRange>(), Err(AvailabilityError::Parse(_)));
        assert_matches!("09:00".parse::<TimeRange>(), Err(AvailabilityError::Parse(_)));
        assert_matches!("09:00-24:00".parse::<TimeRange>(), Err(AvailabilityError::Parse(_)));
        assert_matches!("17:00-09:00".parse::<TimeRange>(), Err(AvailabilityError::EmptyRange(_)));
        assert_matches!("10:00-10:00".parse::<TimeRange>(), Err(AvailabilityError::EmptyRange(_)));
    }

    #[test]
    fn rejects_unknown_weekday_and_overlaps() {
        let unknown = serde_json::from_value::<Availability>(json!({
            "working_hours": { "Monday": ["09:00-10:00"] }
        }));
        assert!(unknown.is_err());

        let overlapping = serde_json::from_value::<Availability>(json!({
            "working_hours": { "monday": ["09:00-12:00", "11:00-13:00"] }
        }));
        assert!(overlapping.is_err());
    }

    #[test]
    fn adjacent_ranges_are_allowed() {
        let availability: Availability = serde_json::from_value(json!({
            "working_hours": { "monday": ["09:00-12:00", "12:00-13:00"] }
        }))
        .unwrap();
        assert_eq!(availability.ranges_for(DayOfWeek::Monday).unwrap().len(), 2);
    }

    #[test]
    fn flagged_schedule_reports_parse_detail() {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            specialty: "Cardiology".to_string(),
            qualification: None,
            experience_years: None,
            availability: None,
            availability_error: Some("Cannot parse time range '9-17', expected HH:MM-HH:MM".to_string()),
        };

        let err = doctor.schedule().unwrap_err();
        assert_matches!(&err, AvailabilityError::Stored(detail) if detail.contains("9-17"));
        assert_matches!(
            AppError::from(DoctorError::from(err)),
            AppError::Validation(message) if message.contains("9-17")
        );
    }

    #[test]
    fn weekday_from_date() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        assert_eq!(DayOfWeek::from_date(monday), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::from_date(monday.succ_opt().unwrap()), DayOfWeek::Tuesday);
    }
}
