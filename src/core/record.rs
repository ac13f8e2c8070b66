use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column names of the driving log, in storage order.
pub const TRIP_COLUMNS: [&str; 6] = [
    "Date",
    "Driver",
    "Km After",
    "Driven Km",
    "Comment",
    "User",
];

/// Column names of the fuel log, in storage order.
pub const FUELING_COLUMNS: [&str; 7] = [
    "Date",
    "Fueler",
    "Km",
    "Euros",
    "Liters",
    "Note",
    "Km since last fueling",
];

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Error produced when a stored row cannot be turned back into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError(pub String);

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid row: {}", self.0)
    }
}

impl std::error::Error for RowError {}

/// One recorded driving event ending at a given odometer reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub date: NaiveDate,
    pub driver: String,
    /// Odometer reading at the end of the trip.
    pub odometer_after: u64,
    /// Kilometers driven, always `odometer_after` minus the previous reading.
    pub distance: u64,
    pub comment: Option<String>,
    /// Who entered the trip.
    pub recorded_by: String,
}

impl Trip {
    /// Odometer reading at the start of the trip.
    pub fn odometer_before(&self) -> u64 {
        self.odometer_after - self.distance
    }

    /// Returns `true` when `odometer` lies strictly inside this trip.
    pub fn spans(&self, odometer: u64) -> bool {
        self.odometer_before() < odometer && odometer < self.odometer_after
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            format_date(self.date),
            self.driver.clone(),
            self.odometer_after.to_string(),
            self.distance.to_string(),
            self.comment.clone().unwrap_or_default(),
            self.recorded_by.clone(),
        ]
    }

    pub fn from_row(row: &[String]) -> Result<Self, RowError> {
        if row.len() < TRIP_COLUMNS.len() {
            return Err(RowError(format!(
                "expected {} trip columns, found {}",
                TRIP_COLUMNS.len(),
                row.len()
            )));
        }
        let odometer_after = parse_km(&row[2])?;
        let distance = parse_km(&row[3])?;
        if distance > odometer_after {
            return Err(RowError(format!(
                "driven km {distance} exceeds km after {odometer_after}"
            )));
        }
        Ok(Self {
            date: parse_date(&row[0])?,
            driver: row[1].clone(),
            odometer_after,
            distance,
            comment: optional(&row[4]),
            recorded_by: row[5].clone(),
        })
    }
}

/// One recorded refueling event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fueling {
    pub date: NaiveDate,
    pub fueler: String,
    pub odometer: u64,
    /// Amount paid, in euros.
    pub cost: f64,
    /// Liters bought, when known.
    pub volume: Option<f64>,
    pub note: Option<String>,
    /// Kilometers since the previous fueling, or 0 for the first one.
    pub distance_since_last: u64,
}

impl Fueling {
    /// Odometer reading of the previous fueling.
    pub fn interval_start(&self) -> u64 {
        self.odometer.saturating_sub(self.distance_since_last)
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            format_date(self.date),
            self.fueler.clone(),
            self.odometer.to_string(),
            self.cost.to_string(),
            self.volume.map(|v| v.to_string()).unwrap_or_default(),
            self.note.clone().unwrap_or_default(),
            self.distance_since_last.to_string(),
        ]
    }

    pub fn from_row(row: &[String]) -> Result<Self, RowError> {
        if row.len() < FUELING_COLUMNS.len() {
            return Err(RowError(format!(
                "expected {} fueling columns, found {}",
                FUELING_COLUMNS.len(),
                row.len()
            )));
        }
        let cost = parse_amount(&row[3])?;
        let volume = match row[4].trim() {
            "" => None,
            v => Some(parse_amount(v)?),
        };
        Ok(Self {
            date: parse_date(&row[0])?,
            fueler: row[1].clone(),
            odometer: parse_km(&row[2])?,
            cost,
            volume,
            note: optional(&row[5]),
            distance_since_last: parse_km(&row[6])?,
        })
    }
}

/// Formats a date the way the logs store it, e.g. `05.03.2024`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses `dd.mm.yyyy`, falling back to ISO `yyyy-mm-dd`.
pub fn parse_date(input: &str) -> Result<NaiveDate, RowError> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .map_err(|e| RowError(format!("invalid date {input:?}: {e}")))
}

/// Parses whole kilometers. Integral decimal text such as `150.0` is accepted.
fn parse_km(input: &str) -> Result<u64, RowError> {
    let input = input.trim();
    if let Ok(km) = input.parse::<u64>() {
        return Ok(km);
    }
    match input.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => Ok(v as u64),
        _ => Err(RowError(format!("invalid kilometers {input:?}"))),
    }
}

fn parse_amount(input: &str) -> Result<f64, RowError> {
    let input = input.trim();
    match input.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(RowError(format!("invalid amount {input:?}"))),
    }
}

fn optional(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}
