//! Filter System - named text transformations
//!
//! A filter receives its resolved arguments and the piped output of the
//! previous segment, and produces the text of its segment.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;
use thiserror::Error;

use crate::context::{is_empty_value, value_to_string, Context};

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("expects {expected} argument(s), got {got}")]
    Arguments { expected: &'static str, got: usize },

    #[error("needs a value, either as an argument or piped in")]
    MissingInput,

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("unknown number profile '{0}'")]
    UnknownProfile(String),

    #[error("'{0}' is not a recognised date")]
    InvalidDate(String),

    #[error("invalid format '{0}'")]
    InvalidFormat(String),
}

/// Filter trait - a pure text transformation
pub trait Filter {
    fn name(&self) -> &'static str;
    fn apply(
        &self,
        context: &Context,
        arguments: &[Value],
        input: Option<&Value>,
    ) -> Result<String, FilterError>;
}

// --- Built-in Filters ---

fn case_source<'a>(arguments: &'a [Value], input: Option<&'a Value>) -> Option<&'a Value> {
    arguments.first().or(input)
}

pub struct UpperFilter;

impl Filter for UpperFilter {
    fn name(&self) -> &'static str { "upper" }

    fn apply(&self, _: &Context, arguments: &[Value], input: Option<&Value>) -> Result<String, FilterError> {
        Ok(case_source(arguments, input)
            .map(|v| value_to_string(v).to_uppercase())
            .unwrap_or_default())
    }
}

pub struct LowerFilter;

impl Filter for LowerFilter {
    fn name(&self) -> &'static str { "lower" }

    fn apply(&self, _: &Context, arguments: &[Value], input: Option<&Value>) -> Result<String, FilterError> {
        Ok(case_source(arguments, input)
            .map(|v| value_to_string(v).to_lowercase())
            .unwrap_or_default())
    }
}

/// `{$when|date *%d.%m.%Y*}` or `{date *%d.%m.%Y* $when}`
pub struct DateFilter;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

impl DateFilter {
    fn parse(value: &Value) -> Result<DateTime<FixedOffset>, FilterError> {
        let text = value_to_string(value);
        let trimmed = text.trim();

        if let Some(seconds) = as_number(value) {
            return DateTime::from_timestamp(seconds.floor() as i64, 0)
                .map(|dt| dt.fixed_offset())
                .ok_or(FilterError::InvalidDate(text));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt);
        }
        for format in DATE_TIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                    return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
                }
            }
        }
        Err(FilterError::InvalidDate(text))
    }
}

impl Filter for DateFilter {
    fn name(&self) -> &'static str { "date" }

    fn apply(&self, _: &Context, arguments: &[Value], input: Option<&Value>) -> Result<String, FilterError> {
        let (format, value) = match arguments {
            [format] => (format, input.ok_or(FilterError::MissingInput)?),
            [format, value] => (format, value),
            _ => {
                return Err(FilterError::Arguments {
                    expected: "1 or 2",
                    got: arguments.len(),
                })
            }
        };

        if is_empty_value(value) {
            return Ok(String::new());
        }

        let format = value_to_string(format);
        let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(FilterError::InvalidFormat(format.clone()));
        }

        let date = Self::parse(value)?;
        let mut out = String::new();
        write!(out, "{}", date.format_with_items(items.iter()))
            .map_err(|_| FilterError::InvalidFormat(format.clone()))?;
        Ok(out)
    }
}

/// Decimal and thousands separators of a number profile
pub fn number_profile(name: &str) -> Option<(&'static str, &'static str)> {
    match name {
        "eu" => Some((",", " ")),
        "eu2" => Some((",", ".")),
        "en" => Some((".", ",")),
        _ => None,
    }
}

/// Most decimals `number` will print
pub const MAX_DECIMALS: usize = 15;

/// `{$total|number *eu* *2*}` or `{number *eu* *2* $total}`
pub struct NumberFilter;

impl Filter for NumberFilter {
    fn name(&self) -> &'static str { "number" }

    fn apply(&self, _: &Context, arguments: &[Value], input: Option<&Value>) -> Result<String, FilterError> {
        let value = match arguments.len() {
            0..=2 => input.ok_or(FilterError::MissingInput)?,
            3 => &arguments[2],
            got => {
                return Err(FilterError::Arguments {
                    expected: "at most 3",
                    got,
                })
            }
        };

        if is_empty_value(value) {
            return Ok(String::new());
        }

        let profile = arguments.first().map(value_to_string).unwrap_or_else(|| "en".to_string());
        let (decimal, thousands) =
            number_profile(&profile).ok_or_else(|| FilterError::UnknownProfile(profile.clone()))?;

        let decimals = match arguments.get(1) {
            Some(raw) => {
                let raw = value_to_string(raw);
                raw.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|&d| d <= MAX_DECIMALS)
                    .ok_or_else(|| FilterError::InvalidNumber(raw.clone()))?
            }
            None => 0,
        };

        let number = as_number(value).ok_or_else(|| FilterError::InvalidNumber(value_to_string(value)))?;
        Ok(format_number(number, decimals, decimal, thousands))
    }
}

/// Numeric reading of a value: JSON numbers and numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Formats with fixed decimals, rounding half away from zero, grouping the
/// integer part by thousands. Decimals are capped at [`MAX_DECIMALS`].
pub fn format_number(value: f64, decimals: usize, decimal: &str, thousands: &str) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;

    let digits = format!("{:.*}", decimals, rounded.abs());
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

    let mut out = String::new();
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push_str(thousands);
        }
        out.push(ch);
    }
    if !fraction.is_empty() {
        out.push_str(decimal);
        out.push_str(fraction);
    }
    out
}

/// Filter registry - name to implementation, names are case-insensitive
pub struct FilterRegistry {
    filters: HashMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    /// Registry without any filters
    pub fn empty() -> Self {
        Self { filters: HashMap::new() }
    }

    /// Registry with `upper`, `lower`, `date` and `number`
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(UpperFilter));
        registry.register(Box::new(LowerFilter));
        registry.register(Box::new(DateFilter));
        registry.register(Box::new(NumberFilter));
        registry
    }

    /// Adds a filter, replacing any filter of the same name
    pub fn register(&mut self, filter: Box<dyn Filter>) {
        self.filters.insert(filter.name().to_lowercase(), filter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(&name.to_lowercase()).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
