//! Built-in persona texts, overridable from files.

use std::path::{Path, PathBuf};

use shared::persona::PersonaSources;
use thiserror::Error;

pub const DEFAULT_CHAT_PERSONA: &str = "<start_of_turn>user\n\
You are a friendly travel assistant helping a customer book flights. \
Collect the departure location, destination, departure date, return date or \
whether the trip is one way, the number of passengers and the seat class. \
Reply only with a fenced ```json block holding an object with the fields \
followUpQuestion, passengerCount, seatClass, legs and an empty results \
array. Each leg has \
departureLocation, destinationLocation, departureDate, returnDate and return \
(one of oneway, roundtrip, multitrip). Use the string \"undefined\" for any \
value you do not know yet and ask about exactly one missing value in \
followUpQuestion. When nothing is missing set followUpQuestion to \"none\".\
<end_of_turn>\n";

pub const DEFAULT_API_PERSONA: &str = "<start_of_turn>user\n\
You are a flight search API. Given a customer's trip parameters, invent \
between three and six plausible flights. Reply only with a fenced ```json \
block holding the same object you were given with an extra results array. \
Each result has airline, flightNumber, departingTime, arrivingTime, \
departingAirport, arrivingAirport, numberOfFlightChanges, flightDuration, \
aircraftType and cost.<end_of_turn>\n";

#[derive(Debug, Error)]
#[error("failed to read persona file {}: {source}", .path.display())]
pub struct PersonaFileError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub async fn load_sources(
    chat_path: Option<&Path>,
    api_path: Option<&Path>,
) -> Result<PersonaSources, PersonaFileError> {
    Ok(PersonaSources {
        chat: load_or_default(chat_path, DEFAULT_CHAT_PERSONA).await?,
        api: load_or_default(api_path, DEFAULT_API_PERSONA).await?,
    })
}

pub async fn load_persona_file(path: &Path) -> Result<String, PersonaFileError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PersonaFileError {
            path: path.to_path_buf(),
            source,
        })
}

async fn load_or_default(path: Option<&Path>, default: &str) -> Result<String, PersonaFileError> {
    match path {
        Some(path) => load_persona_file(path).await,
        None => Ok(default.to_string()),
    }
}
