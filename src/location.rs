use anyhow::{Context, Result};
use rand::{Rng, RngCore};
use regex::Regex;

use crate::models::Location;

pub const UNKNOWN_STATE: &str = "Unknown";

pub const US_STATES: [&str; 50] = [
    "Alabama", "Alaska", "Arizona", "Arkansas", "California", "Colorado",
    "Connecticut", "Delaware", "Florida", "Georgia", "Hawaii", "Idaho",
    "Illinois", "Indiana", "Iowa", "Kansas", "Kentucky", "Louisiana",
    "Maine", "Maryland", "Massachusetts", "Michigan", "Minnesota",
    "Mississippi", "Missouri", "Montana", "Nebraska", "Nevada", "New Hampshire",
    "New Jersey", "New Mexico", "New York", "North Carolina", "North Dakota",
    "Ohio", "Oklahoma", "Oregon", "Pennsylvania", "Rhode Island",
    "South Carolina", "South Dakota", "Tennessee", "Texas", "Utah",
    "Vermont", "Virginia", "Washington", "West Virginia", "Wisconsin", "Wyoming",
];

// Abbreviations the city pattern recognises.
const CITY_ABBREVIATIONS: &str = "CA|NY|TX|FL|IL|PA|OH|GA|NC|MI|NJ|VA|WA|AZ|MA|TN|IN|MO|MD|WI|CO|MN|SC|AL|LA|KY|OR|OK|CT|IA|UT|AR|NV|MS|KS|NM|NE|WV|ID|HI|NH|ME|RI|MT|DE|SD|ND|AK|VT|WY";

// Only these resolve to a full name; every other match becomes "Unknown".
const ABBREVIATION_NAMES: &[(&str, &str)] = &[
    ("CA", "California"),
    ("NY", "New York"),
    ("TX", "Texas"),
    ("FL", "Florida"),
    ("IL", "Illinois"),
    ("PA", "Pennsylvania"),
    ("OH", "Ohio"),
    ("GA", "Georgia"),
    ("NC", "North Carolina"),
    ("MI", "Michigan"),
    ("NJ", "New Jersey"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("AZ", "Arizona"),
    ("MA", "Massachusetts"),
];

/// Produces a plausible US location for a post. This is not geolocation:
/// when the text names nothing recognisable the state is picked at random.
pub struct LocationInferrer {
    city_pattern: Regex,
    rng: Box<dyn RngCore>,
}

impl LocationInferrer {
    pub fn new() -> Result<Self> {
        Self::with_rng(Box::new(rand::thread_rng()))
    }

    pub fn with_rng(rng: Box<dyn RngCore>) -> Result<Self> {
        let pattern = format!(r"\b([A-Z][a-z]+),?\s+({})\b", CITY_ABBREVIATIONS);
        let city_pattern = Regex::new(&pattern).context("Failed to compile city pattern")?;
        Ok(Self { city_pattern, rng })
    }

    /// `username` is accepted for parity with the record shape but does not
    /// influence the result yet.
    pub fn infer(&mut self, text: &str, _username: &str) -> Location {
        if let Some(state) = find_state_name(text) {
            return placeholder(state);
        }

        if let Some(caps) = self.city_pattern.captures(text) {
            let city = &caps[1];
            let state = resolve_abbreviation(&caps[2]).unwrap_or(UNKNOWN_STATE);
            return Location {
                state: state.to_string(),
                city: city.to_string(),
                county: format!("{} County", city),
            };
        }

        let idx = self.rng.gen_range(0..US_STATES.len());
        placeholder(US_STATES[idx])
    }
}

fn find_state_name(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    US_STATES
        .iter()
        .find(|state| lower.contains(&state.to_lowercase()))
        .copied()
}

fn resolve_abbreviation(abbr: &str) -> Option<&'static str> {
    ABBREVIATION_NAMES
        .iter()
        .find(|(code, _)| *code == abbr)
        .map(|(_, name)| *name)
}

fn placeholder(state: &str) -> Location {
    Location {
        state: state.to_string(),
        city: state.to_string(),
        county: format!("{} County", state),
    }
}
