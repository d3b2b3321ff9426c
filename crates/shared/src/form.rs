use std::fmt;

use tracing::warn;

use crate::answer::{AgentAnswer, TravelLeg};

pub const MAX_PASSENGERS: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripType {
    #[default]
    RoundTrip,
    OneWay,
    MultiTrip,
}

impl TripType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RoundTrip => "Return",
            Self::OneWay => "One way",
            Self::MultiTrip => "Multi-city",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl SeatClass {
    pub fn from_model_text(value: &str) -> Self {
        match value.trim() {
            "first" | "first class" => Self::First,
            "business" | "business class" => Self::Business,
            "premium economy" => Self::PremiumEconomy,
            _ => Self::Economy,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Economy => "Economy",
            Self::PremiumEconomy => "Premium economy",
            Self::Business => "Business",
            Self::First => "First",
        }
    }
}

/// One row of the destinations list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegRow {
    pub from: String,
    pub to: String,
    pub depart: String,
    pub return_date: String,
    pub return_visible: bool,
}

impl LegRow {
    fn from_leg(leg: &TravelLeg) -> Self {
        Self {
            from: leg.departure_location.clone(),
            to: leg.destination_location.clone(),
            depart: leg.departure_date.clone(),
            return_date: leg.return_date.clone().unwrap_or_default(),
            return_visible: !is_one_way_hint(&leg.return_hint),
        }
    }
}

impl fmt::Display for LegRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} departing {}", self.from, self.to, self.depart)?;
        if self.return_visible {
            write!(f, ", returning {}", self.return_date)?;
        }
        Ok(())
    }
}

pub trait TripFormPort: Send {
    fn trip_type(&self) -> TripType;
    fn set_trip_type(&mut self, trip_type: TripType);
    fn passenger_count(&self) -> u32;
    fn set_passenger_count(&mut self, count: u32);
    fn seat_class(&self) -> SeatClass;
    fn set_seat_class(&mut self, seat_class: SeatClass);
    fn legs(&self) -> Vec<LegRow>;
    fn set_legs(&mut self, legs: Vec<LegRow>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripFormState {
    pub trip_type: TripType,
    pub passenger_count: u32,
    pub seat_class: SeatClass,
    pub legs: Vec<LegRow>,
}

impl Default for TripFormState {
    fn default() -> Self {
        Self {
            trip_type: TripType::default(),
            passenger_count: 1,
            seat_class: SeatClass::default(),
            legs: Vec::new(),
        }
    }
}

impl TripFormPort for TripFormState {
    fn trip_type(&self) -> TripType {
        self.trip_type
    }

    fn set_trip_type(&mut self, trip_type: TripType) {
        self.trip_type = trip_type;
    }

    fn passenger_count(&self) -> u32 {
        self.passenger_count
    }

    fn set_passenger_count(&mut self, count: u32) {
        self.passenger_count = count.clamp(1, MAX_PASSENGERS);
    }

    fn seat_class(&self) -> SeatClass {
        self.seat_class
    }

    fn set_seat_class(&mut self, seat_class: SeatClass) {
        self.seat_class = seat_class;
    }

    fn legs(&self) -> Vec<LegRow> {
        self.legs.clone()
    }

    fn set_legs(&mut self, legs: Vec<LegRow>) {
        self.legs = legs;
    }
}

impl fmt::Display for TripFormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} | {} passenger(s) | {}",
            self.trip_type.label(),
            self.passenger_count,
            self.seat_class.label()
        )?;
        for (index, leg) in self.legs.iter().enumerate() {
            writeln!(f, "  {}. {leg}", index + 1)?;
        }
        Ok(())
    }
}

/// Pushes the trip parameters from an agent answer into the search form.
pub fn refresh_search_form(form: &mut dyn TripFormPort, answer: &AgentAnswer) {
    match answer.passenger_count.as_integer() {
        Some(count) => {
            let count = u32::try_from(count.max(1)).unwrap_or(MAX_PASSENGERS);
            form.set_passenger_count(count.min(MAX_PASSENGERS));
        }
        None => warn!(
            passenger_count = %answer.passenger_count,
            "agent passenger count is not a number; keeping current value"
        ),
    }

    form.set_seat_class(SeatClass::from_model_text(&answer.seat_class));

    let legs = answer.legs.iter().map(LegRow::from_leg).collect::<Vec<_>>();
    if answer
        .legs
        .iter()
        .any(|leg| is_one_way_hint(&leg.return_hint))
    {
        form.set_trip_type(TripType::OneWay);
    }
    form.set_legs(legs);
}

fn is_one_way_hint(hint: &str) -> bool {
    matches!(hint.trim(), "oneway" | "undefined")
}
