//! Keyword response resolver
//!
//! Maps free text to one of a fixed set of canned answers. Topics are tested
//! in table order against the lower-cased query; the first keyword hit wins,
//! and anything else gets the fallback.

use serde::Serialize;
use std::fmt;

/// Topic of a canned answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Temperature,
    Salinity,
    Location,
    Profile,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Temperature => "temperature",
            Topic::Salinity => "salinity",
            Topic::Location => "location",
            Topic::Profile => "profile",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry of the canned-response table
#[derive(Debug)]
pub struct CannedResponse {
    pub topic: Topic,
    pub keywords: &'static [&'static str],
    pub text: &'static str,
}

pub const TEMPERATURE_RESPONSE: &str = "Based on data from the active ARGO floats, surface temperatures range from 25°C to 29°C. The thermocline typically sits between 80 and 120 m depth, and deeper waters cool to 2-4°C at 2000 m.";

pub const SALINITY_RESPONSE: &str = "Salinity measurements from the ARGO floats show typical values between 34.9 and 35.3 PSU (Practical Salinity Units). Higher salinity is usually observed where evaporation is high and freshwater input is limited.";

pub const LOCATION_RESPONSE: &str = "The ARGO floats are tracked across the Indian Ocean between roughly 6°S and 18°S. These autonomous instruments drift with the currents and report temperature and salinity profiles every 10 days.";

pub const PROFILE_RESPONSE: &str = "Ocean profiles from ARGO floats reveal typical stratification: a warm surface mixed layer, a sharp thermocline and halocline, and stable deep waters. Each profile extends from the surface to 2000 m depth.";

pub const FALLBACK_RESPONSE: &str = "I can help you explore ARGO float data including temperature, salinity, float locations and ocean profiles. Try asking \"What is the temperature today?\" or \"Show me salinity levels\".";

/// Canned answers in priority order
pub const RESPONSES: &[CannedResponse] = &[
    CannedResponse {
        topic: Topic::Temperature,
        keywords: &["temperature"],
        text: TEMPERATURE_RESPONSE,
    },
    CannedResponse {
        topic: Topic::Salinity,
        keywords: &["salinity"],
        text: SALINITY_RESPONSE,
    },
    CannedResponse {
        topic: Topic::Location,
        keywords: &["location", "float"],
        text: LOCATION_RESPONSE,
    },
    CannedResponse {
        topic: Topic::Profile,
        keywords: &["profile"],
        text: PROFILE_RESPONSE,
    },
];

/// A resolved answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// `None` for the fallback
    pub topic: Option<Topic>,
    pub text: &'static str,
}

/// Resolve a query to its canned answer. Total: every input yields an answer.
pub fn resolve(query: &str) -> Resolution {
    let query = query.to_lowercase();

    RESPONSES
        .iter()
        .find(|r| r.keywords.iter().any(|k| query.contains(k)))
        .map(|r| Resolution {
            topic: Some(r.topic),
            text: r.text,
        })
        .unwrap_or(Resolution {
            topic: None,
            text: FALLBACK_RESPONSE,
        })
}
