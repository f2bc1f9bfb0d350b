//! Historical flight CSV loading and label derivation.

use std::{collections::BTreeMap, io::Read, path::Path};

use chrono::{Datelike, NaiveDate};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::types::{DelayCauses, FlightRecord};

/// Total delay minutes above which a flight counts as delayed.
pub const DELAY_THRESHOLD_MINUTES: f64 = 30.0;

/// 1 when the summed delay causes exceed the threshold, else 0.
///
/// `inspect` and the trainer both label through this function.
pub fn delay_label(causes: &DelayCauses) -> u8 {
    u8::from(causes.total_minutes() > DELAY_THRESHOLD_MINUTES)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "DayOfWeek")]
    day_of_week: u8,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "DepTime")]
    dep_time: u16,
    #[serde(rename = "ArrTime")]
    arr_time: u16,
    #[serde(rename = "CRSArrTime")]
    crs_arr_time: u16,
    #[serde(rename = "Airline")]
    airline: String,
    #[serde(rename = "Origin")]
    origin: String,
    #[serde(rename = "Dest")]
    dest: String,
    #[serde(rename = "CarrierDelay", default)]
    carrier_delay: Option<f64>,
    #[serde(rename = "WeatherDelay", default)]
    weather_delay: Option<f64>,
    #[serde(rename = "NASDelay", default)]
    nas_delay: Option<f64>,
    #[serde(rename = "SecurityDelay", default)]
    security_delay: Option<f64>,
    #[serde(rename = "LateAircraftDelay", default)]
    late_aircraft_delay: Option<f64>,
}

const DATE_FORMATS: [&str; 3] = ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Day-first dates, with ISO as a fallback.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // Some exports carry a time part after the date.
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Parse records from any CSV source with a header row. Extra columns are ignored.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<FlightRecord>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let date = parse_date(&row.date).ok_or_else(|| DatasetError::InvalidDate {
            row: i + 1,
            value: row.date.clone(),
        })?;
        out.push(FlightRecord {
            day_of_week: row.day_of_week,
            month: date.month(),
            day: date.day(),
            year: date.year(),
            dep_time: row.dep_time,
            arr_time: row.arr_time,
            crs_arr_time: row.crs_arr_time,
            airline: row.airline,
            origin: row.origin,
            dest: row.dest,
            delays: DelayCauses {
                carrier: row.carrier_delay,
                weather: row.weather_delay,
                nas: row.nas_delay,
                security: row.security_delay,
                late_aircraft: row.late_aircraft_delay,
            },
        });
    }
    Ok(out)
}

pub fn load_records(path: &Path) -> Result<Vec<FlightRecord>, DatasetError> {
    let file = std::fs::File::open(path)?;
    read_records(std::io::BufReader::new(file))
}

/// Label distribution, as printed by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub delayed: usize,
    pub on_time: usize,
    /// Percentage of delayed flights.
    pub delay_rate: f64,
}

impl DatasetSummary {
    pub fn from_records(records: &[FlightRecord]) -> Self {
        let delayed = records.iter().filter(|r| delay_label(&r.delays) == 1).count();
        let total = records.len();
        Self {
            total,
            delayed,
            on_time: total - delayed,
            delay_rate: if total == 0 {
                0.0
            } else {
                delayed as f64 / total as f64 * 100.0
            },
        }
    }
}

/// Most frequent year in the data; ties go to the earliest year.
pub fn dominant_year(records: &[FlightRecord]) -> Option<i32> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.year).or_default() += 1;
    }
    // BTreeMap iterates ascending; max_by_key keeps the last max, so reverse.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(year, _)| year)
}

/// Shuffled train/test row indices. The test side gets `ceil(n * test_size)` rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f64 * test_size).ceil() as usize).min(n);
    let train = idx.split_off(n_test);
    (train, idx)
}
