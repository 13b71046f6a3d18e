//! Caching definitions for academy resources.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

use super::api_types::{FieldMap, INVESTMENT_FIELDS, SMS_FIELDS, WORK_FIELDS};
use super::resource::Record;
use super::types::{
  Analytics, Attendance, Batch, Content, FeeRecord, Investment, SmsFilter, SmsTransaction, User,
  Work, YoyoTestResult,
};

// ============================================================================
// Resource families
// ============================================================================

/// Independently cached resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
  Users,
  Batches,
  Content,
  Attendance,
  FitnessTests,
  Analytics,
  Fees,
  SmsTransactions,
  Works,
  Investments,
}

/// Backend action names and wire mapping of one resource family.
///
/// A `None` action means the backend does not offer that operation.
#[derive(Debug)]
pub struct ResourceSpec {
  pub name: &'static str,
  pub list: Option<&'static str>,
  pub get: Option<&'static str>,
  pub create: Option<&'static str>,
  pub update: Option<&'static str>,
  pub upsert: Option<&'static str>,
  pub delete: Option<&'static str>,
  pub field_map: Option<&'static FieldMap>,
}

static USERS: ResourceSpec = ResourceSpec {
  name: "users",
  list: Some("listUsers"),
  get: Some("getUser"),
  create: Some("createUser"),
  // The backend has no separate update for accounts
  update: Some("upsertUser"),
  upsert: Some("upsertUser"),
  delete: Some("deleteUser"),
  field_map: None,
};

static BATCHES: ResourceSpec = ResourceSpec {
  name: "batches",
  list: Some("listBatches"),
  get: None,
  create: Some("createBatch"),
  update: Some("updateBatch"),
  upsert: None,
  delete: Some("deleteBatch"),
  field_map: None,
};

static CONTENT: ResourceSpec = ResourceSpec {
  name: "content",
  list: Some("listContent"),
  get: None,
  create: Some("createContent"),
  update: Some("updateContent"),
  upsert: None,
  delete: Some("deleteContent"),
  field_map: None,
};

static ATTENDANCE: ResourceSpec = ResourceSpec {
  name: "attendance",
  list: Some("listAttendanceRecords"),
  get: None,
  create: Some("createAttendanceRecord"),
  update: Some("updateAttendanceRecord"),
  upsert: None,
  delete: None,
  field_map: None,
};

static FITNESS_TESTS: ResourceSpec = ResourceSpec {
  name: "yoyoTest",
  list: Some("listYoyoTestResults"),
  get: None,
  create: Some("createYoyoTestResult"),
  update: Some("updateYoyoTestResult"),
  upsert: None,
  delete: Some("deleteYoyoTestResult"),
  field_map: None,
};

static ANALYTICS: ResourceSpec = ResourceSpec {
  name: "analytics",
  list: None,
  get: None,
  create: None,
  update: None,
  upsert: None,
  delete: None,
  field_map: None,
};

static FEES: ResourceSpec = ResourceSpec {
  name: "fees",
  list: Some("listFees"),
  get: None,
  create: Some("createFee"),
  update: Some("updateFee"),
  upsert: None,
  delete: Some("deleteFee"),
  field_map: None,
};

static SMS_TRANSACTIONS: ResourceSpec = ResourceSpec {
  name: "sms",
  list: Some("listSmsTransactions"),
  get: None,
  create: None,
  update: None,
  upsert: None,
  delete: None,
  field_map: Some(&SMS_FIELDS),
};

static WORKS: ResourceSpec = ResourceSpec {
  name: "works",
  list: Some("listWorks"),
  get: None,
  create: Some("createWork"),
  update: Some("upsertWork"),
  upsert: Some("upsertWork"),
  delete: Some("deleteWork"),
  field_map: Some(&WORK_FIELDS),
};

static INVESTMENTS: ResourceSpec = ResourceSpec {
  name: "investments",
  list: Some("listInvestments"),
  get: None,
  create: Some("createInvestment"),
  update: Some("upsertInvestment"),
  upsert: Some("upsertInvestment"),
  delete: Some("deleteInvestment"),
  field_map: Some(&INVESTMENT_FIELDS),
};

/// Action returning the analytics snapshot object.
pub const ANALYTICS_OVERVIEW_ACTION: &str = "getAnalyticsOverview";
/// Action listing accounts with the coach role.
pub const COACHES_ACTION: &str = "getCoaches";
/// Action listing students assigned to one coach.
pub const COACH_STUDENTS_ACTION: &str = "getCoachStudents";
/// Action listing the fee ledger of one student.
pub const STUDENT_FEES_ACTION: &str = "getStudentFees";

impl Resource {
  pub const ALL: [Resource; 10] = [
    Resource::Users,
    Resource::Batches,
    Resource::Content,
    Resource::Attendance,
    Resource::FitnessTests,
    Resource::Analytics,
    Resource::Fees,
    Resource::SmsTransactions,
    Resource::Works,
    Resource::Investments,
  ];

  pub fn spec(self) -> &'static ResourceSpec {
    match self {
      Self::Users => &USERS,
      Self::Batches => &BATCHES,
      Self::Content => &CONTENT,
      Self::Attendance => &ATTENDANCE,
      Self::FitnessTests => &FITNESS_TESTS,
      Self::Analytics => &ANALYTICS,
      Self::Fees => &FEES,
      Self::SmsTransactions => &SMS_TRANSACTIONS,
      Self::Works => &WORKS,
      Self::Investments => &INVESTMENTS,
    }
  }

  /// Name used in cache keys and last-sync markers.
  pub fn name(self) -> &'static str {
    self.spec().name
  }

  /// Look up a resource by its name, case-insensitively.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|r| r.name().eq_ignore_ascii_case(name))
  }

  /// Unparameterized read keys dropped after any mutation of this resource.
  ///
  /// Parameterized reads (one coach's students, one student's fees, a
  /// filtered SMS list) are not included and stay cached until a forced
  /// refresh or a global clear.
  pub fn invalidation_keys(self) -> Vec<String> {
    let mut keys = vec![AcademyQueryKey::List(self).cache_key()];
    match self {
      Self::Users => keys.push(AcademyQueryKey::Coaches.cache_key()),
      Self::Analytics => keys.push(AcademyQueryKey::AnalyticsOverview.cache_key()),
      _ => {}
    }
    keys
  }
}

impl std::fmt::Display for Resource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

// ============================================================================
// Record implementations
// ============================================================================

impl Record for User {
  const RESOURCE: Resource = Resource::Users;
}

impl Record for Batch {
  const RESOURCE: Resource = Resource::Batches;
}

impl Record for Content {
  const RESOURCE: Resource = Resource::Content;
}

impl Record for Attendance {
  const RESOURCE: Resource = Resource::Attendance;
}

impl Record for YoyoTestResult {
  const RESOURCE: Resource = Resource::FitnessTests;
}

impl Record for Analytics {
  const RESOURCE: Resource = Resource::Analytics;
}

impl Record for FeeRecord {
  const RESOURCE: Resource = Resource::Fees;
}

impl Record for SmsTransaction {
  const RESOURCE: Resource = Resource::SmsTransactions;
}

impl Record for Work {
  const RESOURCE: Resource = Resource::Works;
}

impl Record for Investment {
  const RESOURCE: Resource = Resource::Investments;
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for academy API reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcademyQueryKey {
  /// Full list of a resource
  List(Resource),
  /// Accounts with the coach role
  Coaches,
  /// Students assigned to one coach
  CoachStudents { coach_id: String },
  /// Fee ledger of one student
  StudentFees { student_id: String },
  /// SMS transactions matching a filter
  SmsFiltered(SmsFilter),
  /// Analytics snapshot
  AnalyticsOverview,
}

impl QueryKey for AcademyQueryKey {
  fn cache_key(&self) -> String {
    match self {
      Self::List(resource) => format!("{}_list", resource.name()),
      Self::Coaches => "users_coaches".to_string(),
      Self::CoachStudents { coach_id } => format!("users_coach_students:{}", coach_id),
      Self::StudentFees { student_id } => format!("fees_student:{}", student_id),
      Self::SmsFiltered(filter) if filter.is_empty() => {
        Self::List(Resource::SmsTransactions).cache_key()
      }
      Self::SmsFiltered(filter) => {
        format!("sms_filtered:{}", hash_params(&filter.query_params()))
      }
      Self::AnalyticsOverview => "analytics_overview".to_string(),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::List(resource) => format!("all {}", resource),
      Self::Coaches => "coaches".to_string(),
      Self::CoachStudents { coach_id } => format!("students of coach {}", coach_id),
      Self::StudentFees { student_id } => format!("fees of student {}", student_id),
      Self::SmsFiltered(filter) => {
        if filter.is_empty() {
          "all sms".to_string()
        } else {
          let parts: Vec<String> = filter
            .query_params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
          format!("sms where {}", parts.join(", "))
        }
      }
      Self::AnalyticsOverview => "analytics overview".to_string(),
    }
  }
}

/// SHA256 over a canonical `name=value` encoding, for stable fixed-length keys.
fn hash_params(params: &[(&str, String)]) -> String {
  let mut hasher = Sha256::new();
  for (name, value) in params {
    hasher.update(name.as_bytes());
    hasher.update(b"=");
    hasher.update(value.as_bytes());
    hasher.update(b"\n");
  }
  hex::encode(hasher.finalize())
}
