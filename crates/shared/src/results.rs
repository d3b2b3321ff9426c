use crate::answer::FlightResult;

const COLUMN_GAP: &str = "  ";

/// One rendered line of the search results table, columns in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub airline: String,
    pub flight_number: String,
    pub timing: String,
    pub depart_airport: String,
    pub arrive_airport: String,
    pub stops: String,
    pub duration: String,
    pub aircraft: String,
    pub cost: String,
}

impl ResultRow {
    pub fn columns(&self) -> [&str; 9] {
        [
            &self.airline,
            &self.flight_number,
            &self.timing,
            &self.depart_airport,
            &self.arrive_airport,
            &self.stops,
            &self.duration,
            &self.aircraft,
            &self.cost,
        ]
    }
}

impl From<&FlightResult> for ResultRow {
    fn from(result: &FlightResult) -> Self {
        Self {
            airline: result.airline.clone(),
            flight_number: result.flight_number.to_string(),
            timing: format!("{} - {}", result.departing_time, result.arriving_time),
            depart_airport: result.departing_airport.clone(),
            arrive_airport: result.arriving_airport.clone(),
            stops: format!("{} changes", result.number_of_flight_changes),
            duration: result.flight_duration.to_string(),
            aircraft: result.aircraft_type.clone(),
            cost: result.cost.to_string(),
        }
    }
}

pub fn result_rows(results: &[FlightResult]) -> Vec<ResultRow> {
    results.iter().map(ResultRow::from).collect()
}

/// Lays rows out as left-aligned text columns.
pub fn render_table(rows: &[ResultRow]) -> String {
    let mut widths = [0_usize; 9];
    for row in rows {
        for (width, column) in widths.iter_mut().zip(row.columns()) {
            *width = (*width).max(column.chars().count());
        }
    }

    let mut table = String::new();
    for row in rows {
        let line = row
            .columns()
            .iter()
            .zip(widths)
            .map(|(column, width)| format!("{column:<width$}"))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        table.push_str(line.trim_end());
        table.push('\n');
    }
    table
}
