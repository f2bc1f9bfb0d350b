use std::num::IntErrorKind;

use serde::Serialize;
use serde_json::Value;

use crate::error::RequestError;

/// Minutes attributed to each delay cause. Missing cells stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayCauses {
    pub carrier: Option<f64>,
    pub weather: Option<f64>,
    pub nas: Option<f64>,
    pub security: Option<f64>,
    pub late_aircraft: Option<f64>,
}

impl DelayCauses {
    /// Sum of all causes, missing values counted as 0.
    pub fn total_minutes(&self) -> f64 {
        [
            self.carrier,
            self.weather,
            self.nas,
            self.security,
            self.late_aircraft,
        ]
        .iter()
        .map(|m| m.unwrap_or(0.0))
        .sum()
    }
}

/// One historical flight, as used for training.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    pub day_of_week: u8,
    pub month: u32,
    pub day: u32,
    pub year: i32,
    pub dep_time: u16,       // HHMM
    pub arr_time: u16,       // HHMM
    pub crs_arr_time: u16,   // HHMM, scheduled
    pub airline: String,
    pub origin: String,
    pub dest: String,
    pub delays: DelayCauses,
}

impl FlightRecord {
    pub fn row(&self) -> FlightRow<'_> {
        FlightRow {
            day_of_week: f64::from(self.day_of_week),
            dep_time: f64::from(self.dep_time),
            arr_time: f64::from(self.arr_time),
            crs_arr_time: f64::from(self.crs_arr_time),
            month: f64::from(self.month),
            day: f64::from(self.day),
            airline: &self.airline,
            origin: &self.origin,
            dest: &self.dest,
        }
    }
}

/// A single raw row with the training-time field names, before one-hot expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightRow<'a> {
    pub day_of_week: f64,
    pub dep_time: f64,
    pub arr_time: f64,
    pub crs_arr_time: f64,
    pub month: f64,
    pub day: f64,
    pub airline: &'a str,
    pub origin: &'a str,
    pub dest: &'a str,
}

/// Names of the request keys, in the order they are checked for presence.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "dayOfWeek",
    "month",
    "day",
    "departureTime",
    "arrivalTime",
    "airline",
    "originAirport",
    "destAirport",
];

/// A validated `POST /predict` body.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub day_of_week: i64,
    pub month: u32,
    pub day: u32,
    pub departure_time: i64,
    pub arrival_time: i64,
    pub airline: String,
    pub origin_airport: String,
    pub dest_airport: String,
}

impl PredictionRequest {
    /// Validate a JSON body: presence of every field first, then month/day
    /// ranges, then the remaining coercions.
    pub fn from_json(body: &Value) -> Result<Self, RequestError> {
        let field = |name: &'static str| required(body, name);

        for name in REQUIRED_FIELDS {
            field(name)?;
        }

        let month = coerce_int("month", field("month")?)?;
        let day = coerce_int("day", field("day")?)?;
        if !(1..=12).contains(&month) {
            return Err(RequestError::MonthOutOfRange);
        }
        if !(1..=31).contains(&day) {
            return Err(RequestError::DayOutOfRange);
        }

        Ok(Self {
            day_of_week: coerce_int("dayOfWeek", field("dayOfWeek")?)?,
            month: month as u32,
            day: day as u32,
            departure_time: coerce_int("departureTime", field("departureTime")?)?,
            arrival_time: coerce_int("arrivalTime", field("arrivalTime")?)?,
            airline: coerce_str("airline", field("airline")?)?,
            origin_airport: coerce_str("originAirport", field("originAirport")?)?,
            dest_airport: coerce_str("destAirport", field("destAirport")?)?,
        })
    }

    /// The request has a single arrival time; it fills both the actual and
    /// the scheduled arrival slots.
    pub fn row(&self) -> FlightRow<'_> {
        FlightRow {
            day_of_week: self.day_of_week as f64,
            dep_time: self.departure_time as f64,
            arr_time: self.arrival_time as f64,
            crs_arr_time: self.arrival_time as f64,
            month: f64::from(self.month),
            day: f64::from(self.day),
            airline: &self.airline,
            origin: &self.origin_airport,
            dest: &self.dest_airport,
        }
    }
}

fn required<'a>(body: &'a Value, name: &'static str) -> Result<&'a Value, RequestError> {
    match body.get(name) {
        None | Some(Value::Null) => Err(RequestError::MissingField(name)),
        Some(v) => Ok(v),
    }
}

fn coerce_int(field: &'static str, v: &Value) -> Result<i64, RequestError> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                match n.as_f64() {
                    // `as` saturates, so huge values still fail the range checks.
                    Some(f) if f.is_finite() => Ok(f.trunc() as i64),
                    _ => Err(RequestError::invalid(field, format!("{n} is not an integer"))),
                }
            }
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(i),
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => Ok(i64::MAX),
                IntErrorKind::NegOverflow => Ok(i64::MIN),
                _ => Err(RequestError::invalid(field, format!("{s:?}: {e}"))),
            },
        },
        other => Err(RequestError::invalid(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

fn coerce_str(field: &'static str, v: &Value) -> Result<String, RequestError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(RequestError::invalid(
            field,
            format!("expected a string, got {other}"),
        )),
    }
}

/// Class label reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelayLabel {
    OnTime,
    Delayed,
}

impl DelayLabel {
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            DelayLabel::Delayed
        } else {
            DelayLabel::OnTime
        }
    }
}

/// Response body of `POST /predict`. Percentages rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOut {
    pub prediction: DelayLabel,
    #[serde(rename = "isDelayed")]
    pub is_delayed: bool,
    pub confidence: f64,
    pub probability_delayed: f64,
    pub probability_ontime: f64,
}

impl PredictionOut {
    /// `proba` is `[P(on-time), P(delayed)]`.
    pub fn from_proba(class: u8, proba: [f64; 2]) -> Self {
        let label = DelayLabel::from_class(class);
        Self {
            prediction: label,
            is_delayed: label == DelayLabel::Delayed,
            confidence: percent(proba[0].max(proba[1])),
            probability_delayed: percent(proba[1]),
            probability_ontime: percent(proba[0]),
        }
    }
}

fn percent(p: f64) -> f64 {
    (p * 100.0 * 100.0).round() / 100.0
}
