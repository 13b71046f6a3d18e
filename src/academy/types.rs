//! Domain records exchanged with the academy backend.
//!
//! Field names follow the backend's camelCase JSON. Optional fields are left
//! out when serializing so a cached list reads back in the same shape.

use serde::{Deserialize, Serialize};

use super::api_types::{lenient_f64, lenient_opt_f64, lenient_opt_string, lenient_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Coach,
  Student,
  Support,
}

/// Account of any role: admin, coach, student (player) or support staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  pub name: String,
  #[serde(default, deserialize_with = "lenient_string")]
  pub phone: String,
  #[serde(default)]
  pub email: String,
  pub role: Role,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub age: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub batch: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub batch_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub father_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mother_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub alt_phone: Option<String>,
  /// "Normal" or "Special"
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub coaching_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_f64")]
  pub monthly_fee: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub specialization: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub join_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skill_level: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub batting_style: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bowling_style: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fitness_level: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub experience: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_f64")]
  pub rating: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_f64")]
  pub students_count: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub permissions: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub assigned_coach_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_first_login: Option<bool>,
  /// Profile picture URL
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub avatar: Option<String>,
}

/// Training group run by one coach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub coach: String,
  #[serde(default, deserialize_with = "lenient_string")]
  pub coach_id: String,
  #[serde(default)]
  pub schedule: String,
  #[serde(default)]
  pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
  Video,
  Photo,
  Document,
}

/// Media item in the content library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(rename = "type")]
  pub kind: ContentKind,
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail_url: Option<String>,
  #[serde(default)]
  pub upload_date: String,
  #[serde(default)]
  pub uploaded_by: String,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub batch_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  Present,
  Absent,
  Late,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  pub date: String,
  #[serde(deserialize_with = "lenient_string")]
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_name: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub batch_id: String,
  pub status: AttendanceStatus,
  #[serde(default, deserialize_with = "lenient_string")]
  pub marked_by: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remarks: Option<String>,
}

/// Payload of a single `markAttendance` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
  pub user_id: String,
  pub batch_id: String,
  pub date: String,
  pub status: AttendanceStatus,
  pub marked_by: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remarks: Option<String>,
}

/// Yo-Yo intermittent recovery test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoyoTestResult {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  #[serde(deserialize_with = "lenient_string")]
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_name: Option<String>,
  pub test_date: String,
  #[serde(deserialize_with = "lenient_f64")]
  pub level: f64,
  #[serde(deserialize_with = "lenient_f64")]
  pub shuttles: f64,
  #[serde(deserialize_with = "lenient_f64")]
  pub distance: f64,
  #[serde(deserialize_with = "lenient_f64")]
  pub score: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remarks: Option<String>,
}

/// Dashboard overview computed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
  #[serde(default, deserialize_with = "lenient_f64")]
  pub total_revenue: f64,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub active_students: f64,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub sessions_this_month: f64,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub growth_rate: f64,
}

/// One fee payment in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecord {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  /// Paying student. The sheet column is all lowercase.
  #[serde(rename = "userid", deserialize_with = "lenient_string")]
  pub user_id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default, deserialize_with = "lenient_string")]
  pub phone: String,
  #[serde(deserialize_with = "lenient_f64")]
  pub amount: f64,
  /// cash, upi, bank_transfer or cheque
  #[serde(default)]
  pub paid_type: String,
  pub date: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remarks: Option<String>,
}

/// Bank transaction parsed from an SMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsTransaction {
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub id: Option<String>,
  #[serde(default)]
  pub sms_date: String,
  #[serde(default)]
  pub sender_address: String,
  /// Usually "credit" or "debit"
  #[serde(default)]
  pub transaction_type: String,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub amount: f64,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub upi_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_string")]
  pub transaction_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub party_name: Option<String>,
  #[serde(default)]
  pub full_message: String,
}

/// Server-side filter for `listSmsTransactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsFilter {
  pub limit: Option<u32>,
  /// "credit" or "debit"
  pub transaction_type: Option<String>,
  /// Inclusive start date, `YYYY-MM-DD`
  pub from: Option<String>,
  /// Inclusive end date, `YYYY-MM-DD`
  pub to: Option<String>,
}

impl SmsFilter {
  pub fn is_empty(&self) -> bool {
    self.query_params().is_empty()
  }

  /// Query parameters in a fixed order. Blank values are omitted.
  pub fn query_params(&self) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(limit) = self.limit {
      params.push(("limit", limit.to_string()));
    }
    let text = [
      ("type", &self.transaction_type),
      ("from", &self.from),
      ("to", &self.to),
    ];
    for (name, value) in text {
      if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        params.push((name, v.to_string()));
      }
    }
    params
  }
}

/// Expense ("work") ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  pub date: String,
  #[serde(default)]
  pub work_category: String,
  #[serde(default)]
  pub work_details: String,
  #[serde(default)]
  pub paid_by: String,
  #[serde(deserialize_with = "lenient_f64")]
  pub amount: f64,
  #[serde(default)]
  pub mode_of_transaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
  #[serde(deserialize_with = "lenient_string")]
  pub id: String,
  pub date: String,
  pub name: String,
  #[serde(deserialize_with = "lenient_f64")]
  pub amount: f64,
}
