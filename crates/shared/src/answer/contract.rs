use std::fmt;

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel the model uses when it has nothing left to ask.
pub const FOLLOW_UP_NONE: &str = "none";
/// Placeholder the model writes for parameters it has not gathered yet.
pub const UNDEFINED_MARKER: &str = "\"undefined\"";

/// Structured answer embedded in the model's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentAnswer {
    pub follow_up_question: String,
    pub passenger_count: Scalar,
    pub seat_class: String,
    pub legs: Vec<TravelLeg>,
    pub results: Vec<FlightResult>,
}

impl AgentAnswer {
    pub fn has_follow_up(&self) -> bool {
        self.follow_up_question.trim() != FOLLOW_UP_NONE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TravelLeg {
    pub departure_location: String,
    pub destination_location: String,
    pub departure_date: String,
    #[serde(default)]
    pub return_date: Option<String>,
    /// Trip-type hint: `roundtrip`, `oneway` or `undefined`.
    #[serde(rename = "return")]
    pub return_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlightResult {
    pub airline: String,
    pub flight_number: Scalar,
    pub departing_time: String,
    pub arriving_time: String,
    pub departing_airport: String,
    pub arriving_airport: String,
    pub number_of_flight_changes: Scalar,
    pub flight_duration: Scalar,
    pub aircraft_type: String,
    pub cost: Scalar,
}

/// Small models emit counts and prices either quoted or bare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
}

impl Scalar {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Text(raw) => leading_integer(raw),
            Self::Number(value) if value.is_finite() => Some(value.trunc() as i64),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(raw) => f.write_str(raw),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

// Accepts "2", " 2 passengers", "-1"; rejects "two".
fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['-', '+']));
    let digits_len = trimmed[sign_len..]
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    trimmed[..sign_len + digits_len].parse().ok()
}

pub fn agent_answer_schema() -> Result<Value, serde_json::Error> {
    serde_json::to_value(schema_for!(AgentAnswer))
}
