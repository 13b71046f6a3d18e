//! Wire-level helpers for the spreadsheet-backed API.
//!
//! Some sheets expose human readable column names (`"Work Category"`) instead
//! of the camelCase field names used by the domain types. The translation is
//! kept here, at the boundary, and applied in both directions.

use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::{Map, Value};

// ============================================================================
// Field name mapping
// ============================================================================

/// Bidirectional table of `(model field, wire column)` pairs.
///
/// Keys that are not in the table pass through unchanged in both directions.
#[derive(Debug)]
pub struct FieldMap {
  pairs: &'static [(&'static str, &'static str)],
}

impl FieldMap {
  pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
    Self { pairs }
  }

  /// Rename wire columns to model fields. Accepts one object or an array of objects.
  pub fn to_model(&self, value: Value) -> Value {
    self.rename(value, |key| {
      self
        .pairs
        .iter()
        .find(|(_, wire)| *wire == key)
        .map(|(model, _)| *model)
    })
  }

  /// Rename model fields to wire columns. Accepts one object or an array of objects.
  pub fn to_wire(&self, value: Value) -> Value {
    self.rename(value, |key| {
      self
        .pairs
        .iter()
        .find(|(model, _)| *model == key)
        .map(|(_, wire)| *wire)
    })
  }

  fn rename<'a>(&self, value: Value, lookup: impl Fn(&str) -> Option<&'a str> + Copy) -> Value {
    match value {
      Value::Array(items) => Value::Array(
        items
          .into_iter()
          .map(|item| self.rename(item, lookup))
          .collect(),
      ),
      Value::Object(fields) => {
        let mut renamed = Map::with_capacity(fields.len());
        for (key, field) in fields {
          match lookup(&key) {
            Some(mapped) => {
              renamed.insert(mapped.to_string(), field);
            }
            None => {
              // A mapped column wins over a passthrough key with the same name
              renamed.entry(key).or_insert(field);
            }
          }
        }
        Value::Object(renamed)
      }
      other => other,
    }
  }
}

/// Expense ledger sheet.
pub static WORK_FIELDS: FieldMap = FieldMap::new(&[
  ("id", "ID"),
  ("date", "Date"),
  ("workCategory", "Work Category"),
  ("workDetails", "Work Details"),
  ("paidBy", "Paid By"),
  ("amount", "Amount"),
  ("modeOfTransaction", "Mode of Transaction"),
]);

/// Investment ledger sheet.
pub static INVESTMENT_FIELDS: FieldMap = FieldMap::new(&[
  ("id", "ID"),
  ("date", "Date"),
  ("name", "Name"),
  ("amount", "Amount"),
]);

/// Transaction records parsed from bank SMS.
pub static SMS_FIELDS: FieldMap = FieldMap::new(&[
  ("id", "ID"),
  ("smsDate", "SMS Date"),
  ("senderAddress", "Sender Address"),
  ("transactionType", "Transaction Type"),
  ("amount", "Amount"),
  ("upiId", "UPI ID"),
  ("transactionId", "Transaction ID"),
  ("partyName", "Party Name"),
  ("fullMessage", "Full Message"),
]);

// ============================================================================
// Lenient scalar decoding
// ============================================================================

/// Currency markers accepted around an amount, matched case-insensitively.
/// Longer spellings come first so `Rs.` is not read as `Rs` plus `.500`.
const CURRENCY_MARKERS: &[&str] = &["₹", "rs.", "rs", "inr"];

/// Outcome of reading a sheet cell that should hold a number.
#[derive(Debug, PartialEq)]
enum Cell {
  Number(f64),
  Blank,
  Invalid(String),
}

/// Parse a sheet cell that should hold a number.
///
/// Cells come back as numbers, numeric strings with thousands separators and
/// an optional currency marker, or empty strings. Anything else is rejected
/// rather than guessed at.
fn number_from_value(value: &Value) -> Cell {
  match value {
    Value::Null => Cell::Blank,
    Value::Number(n) => n.as_f64().map_or(Cell::Invalid(n.to_string()), Cell::Number),
    Value::String(s) => parse_amount(s),
    Value::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
    other => Cell::Invalid(other.to_string()),
  }
}

fn parse_amount(raw: &str) -> Cell {
  let mut text = raw.trim();
  if text.is_empty() {
    return Cell::Blank;
  }

  for marker in CURRENCY_MARKERS {
    if let Some(rest) = strip_prefix_ignore_case(text, marker) {
      text = rest.trim_start();
      break;
    }
  }
  for marker in CURRENCY_MARKERS {
    if let Some(rest) = strip_suffix_ignore_case(text, marker) {
      text = rest.trim_end();
      break;
    }
  }

  let digits: String = text
    .chars()
    .filter(|c| *c != ',' && !c.is_whitespace())
    .collect();
  let is_plain = !digits.is_empty()
    && digits
      .chars()
      .all(|c| c.is_ascii_digit() || c == '.' || c == '-');

  match digits.parse::<f64>() {
    Ok(n) if is_plain && n.is_finite() => Cell::Number(n),
    _ => Cell::Invalid(raw.to_string()),
  }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
  let head = s.get(..prefix.len())?;
  head
    .eq_ignore_ascii_case(prefix)
    .then(|| &s[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
  let split = s.len().checked_sub(suffix.len())?;
  let tail = s.get(split..)?;
  tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

fn string_from_value(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    other => Some(other.to_string()),
  }
}

/// Number that may arrive as a string. Blank cells decode as `0`.
///
/// A non-blank cell that is not a number fails the record.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  match number_from_value(&value) {
    Cell::Number(n) => Ok(n),
    Cell::Blank => Ok(0.0),
    Cell::Invalid(raw) => Err(D::Error::custom(format!("not a number: {:?}", raw))),
  }
}

/// Optional number that may arrive as a string.
///
/// Blank cells and cells that are not a number decode as `None`.
pub fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  match number_from_value(&value) {
    Cell::Number(n) => Ok(Some(n)),
    Cell::Blank | Cell::Invalid(_) => Ok(None),
  }
}

/// String that may arrive as a number (ids, phone numbers). Null decodes as empty.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(string_from_value(value).unwrap_or_default())
}

/// Optional string that may arrive as a number. Null and blank decode as `None`.
pub fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(string_from_value(value).filter(|s| !s.is_empty()))
}
