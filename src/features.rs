//! Feature schema and the single encode-and-align routine shared by
//! training, serving and the `check` command.
//!
//! A schema is the ordered list of column names the classifier was fit on:
//! the numeric columns first, then one indicator column per distinct
//! categorical value (`Airline_<v>`, `Origin_<v>`, `Dest_<v>`). Column
//! position is what the classifier indexes by, so every vector handed to it
//! is built by position-in-schema, never by map iteration order.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::FlightRow;

/// Numeric columns, in schema order.
pub const NUMERIC_COLUMNS: [&str; 6] = ["DayOfWeek", "DepTime", "ArrTime", "CRSArrTime", "month", "day"];

/// Categorical fields, in schema order. Indicator columns are `<field>_<value>`.
pub const CATEGORICAL_FIELDS: [&str; 3] = ["Airline", "Origin", "Dest"];

pub fn indicator_column(field: &str, value: &str) -> String {
    format!("{field}_{value}")
}

/// One-hot expansion of a single row: every column this row produces, with its value.
///
/// A single row yields exactly one indicator per categorical field.
pub fn one_hot(row: &FlightRow<'_>) -> Vec<(String, f64)> {
    let numeric = [
        row.day_of_week,
        row.dep_time,
        row.arr_time,
        row.crs_arr_time,
        row.month,
        row.day,
    ];
    let categorical = [row.airline, row.origin, row.dest];

    let mut cols = Vec::with_capacity(NUMERIC_COLUMNS.len() + CATEGORICAL_FIELDS.len());
    for (name, value) in NUMERIC_COLUMNS.iter().zip(numeric) {
        cols.push((name.to_string(), value));
    }
    for (field, value) in CATEGORICAL_FIELDS.iter().zip(categorical) {
        cols.push((indicator_column(field, value), 1.0));
    }
    cols
}

/// A row laid out in schema order, plus the produced columns the schema does not know.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub values: Vec<f32>,
    /// Indicator columns for categorical values never seen in training.
    /// They are absent from `values`: the field reads as "no information".
    pub dropped: Vec<String>,
}

/// Immutable, ordered column list fixed at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Fit a schema on the training rows: numeric columns, then each
    /// categorical field's distinct values in ascending order.
    pub fn fit<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = FlightRow<'a>>,
    {
        let mut seen: [BTreeSet<&'a str>; 3] = Default::default();
        for row in rows {
            seen[0].insert(row.airline);
            seen[1].insert(row.origin);
            seen[2].insert(row.dest);
        }

        let mut columns: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
        for (field, values) in CATEGORICAL_FIELDS.iter().zip(&seen) {
            columns.extend(values.iter().map(|v| indicator_column(field, v)));
        }

        // Distinct values under distinct prefixes: no duplicates possible.
        let index = columns.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect();
        Self { columns, index }
    }

    pub fn from_columns(columns: Vec<String>) -> Result<Self, String> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(format!("duplicate feature column {name:?}"));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Encode one row and align it to this schema.
    ///
    /// Every schema column is present (0 when the row does not produce it),
    /// columns are in schema order, and produced columns unknown to the
    /// schema are dropped and reported rather than failing the row.
    pub fn align(&self, row: &FlightRow<'_>) -> AlignedRow {
        let mut values = vec![0.0f32; self.columns.len()];
        let mut dropped = Vec::new();
        for (name, value) in one_hot(row) {
            match self.position(&name) {
                Some(pos) => values[pos] = value as f32,
                None => dropped.push(name),
            }
        }
        AlignedRow { values, dropped }
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = String;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_columns(columns)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.columns
    }
}
