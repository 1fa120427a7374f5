//! Heart-rate zone calculation
//!
//! Max heart rate follows the age-based formula (220 - age for men,
//! 226 - age for women). Four zones are derived from it at fixed percentages,
//! with the aerobic zone designated as the workout target.

use crate::error::WorkoutError;
use crate::types::{Gender, HeartRateZone};

/// Youngest supported age
pub const MIN_AGE: u32 = 18;

/// Oldest supported age
pub const MAX_AGE: u32 = 100;

struct ZoneTemplate {
    id: &'static str,
    name: &'static str,
    min_percent: f64,
    max_percent: f64,
    description: &'static str,
    duration: &'static str,
    goal: &'static str,
    is_target: bool,
}

const ZONE_TEMPLATES: [ZoneTemplate; 4] = [
    ZoneTemplate {
        id: "warmup",
        name: "Warm-up",
        min_percent: 0.4,
        max_percent: 0.5,
        description: "Prepares the body for effort.",
        duration: "5-10 min",
        goal: "Preparation",
        is_target: false,
    },
    ZoneTemplate {
        id: "light",
        name: "Light Training",
        min_percent: 0.5,
        max_percent: 0.6,
        description: "Improves general health and helps recovery.",
        duration: "10-20 min",
        goal: "Base endurance",
        is_target: false,
    },
    ZoneTemplate {
        id: "aerobic",
        name: "Aerobic",
        min_percent: 0.6,
        max_percent: 0.8,
        description: "Improves respiratory and cardiovascular capacity.",
        duration: "20-40 min",
        goal: "Cardiovascular",
        is_target: true,
    },
    ZoneTemplate {
        id: "anaerobic",
        name: "Anaerobic",
        min_percent: 0.8,
        max_percent: 0.9,
        description: "Builds lactic acid tolerance.",
        duration: "5-10 min",
        goal: "Power",
        is_target: false,
    },
];

/// Estimated maximum heart rate for an age and gender
pub fn max_heart_rate(age: u32, gender: Gender) -> Result<i32, WorkoutError> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(WorkoutError::InvalidAge(age));
    }

    let age = age as i32;
    Ok(match gender {
        Gender::Male => 220 - age,
        Gender::Female => 226 - age,
    })
}

/// Build the four training zones for a given max heart rate
pub fn zones_for_max_heart_rate(max_heart_rate: i32) -> Vec<HeartRateZone> {
    let max = f64::from(max_heart_rate);
    ZONE_TEMPLATES
        .iter()
        .map(|t| HeartRateZone {
            id: t.id.to_string(),
            name: t.name.to_string(),
            min_percent: t.min_percent,
            max_percent: t.max_percent,
            min_bpm: (max * t.min_percent).round() as i32,
            max_bpm: (max * t.max_percent).round() as i32,
            description: t.description.to_string(),
            duration: t.duration.to_string(),
            goal: t.goal.to_string(),
            is_target: t.is_target,
        })
        .collect()
}

/// Compute the training zones for an age and gender
pub fn calculate_zones(age: u32, gender: Gender) -> Result<Vec<HeartRateZone>, WorkoutError> {
    let max = max_heart_rate(age, gender)?;
    Ok(zones_for_max_heart_rate(max))
}

/// The zone marked as target, falling back to the first zone
pub fn select_target_zone(zones: &[HeartRateZone]) -> Option<&HeartRateZone> {
    zones.iter().find(|z| z.is_target).or_else(|| zones.first())
}

/// Look a zone up by identifier
pub fn find_zone<'a>(
    zones: &'a [HeartRateZone],
    id: &str,
) -> Result<&'a HeartRateZone, WorkoutError> {
    zones
        .iter()
        .find(|z| z.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| WorkoutError::UnknownZone(id.to_string()))
}
