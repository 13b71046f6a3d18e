//! Generic client for one resource family.
//!
//! Reads go through the [`CacheLayer`]; mutations always go to the network and
//! drop the resource's read keys once the backend accepts them.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::{CacheLayer, QueryKey};

use super::cache::{
  AcademyQueryKey, Resource, ResourceSpec, ANALYTICS_OVERVIEW_ACTION, COACHES_ACTION,
  COACH_STUDENTS_ACTION, STUDENT_FEES_ACTION,
};
use super::api_types::FieldMap;
use super::client::{decode, decode_rows, encode, Transport};
use super::error::ApiError;
use super::types::{
  Analytics, Attendance, AttendanceMark, FeeRecord, SmsFilter, SmsTransaction, User,
};

/// Action recording one attendance mark.
const MARK_ATTENDANCE_ACTION: &str = "markAttendance";

/// A record type served by the backend, tied to its resource family.
///
/// The family supplies the action names, the wire field mapping and the read
/// keys a mutation invalidates.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
  const RESOURCE: Resource;
}

/// Cached access to every record of type `T`.
pub struct ResourceClient<T, B> {
  transport: Arc<B>,
  cache: CacheLayer,
  _record: PhantomData<fn() -> T>,
}

// Manual impl: neither the record type nor the transport needs to be Clone
impl<T, B> Clone for ResourceClient<T, B> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      cache: self.cache.clone(),
      _record: PhantomData,
    }
  }
}

impl<T: Record, B: Transport> ResourceClient<T, B> {
  pub fn new(transport: Arc<B>, cache: CacheLayer) -> Self {
    Self {
      transport,
      cache,
      _record: PhantomData,
    }
  }

  fn spec(&self) -> &'static ResourceSpec {
    T::RESOURCE.spec()
  }

  fn action(
    &self,
    operation: &'static str,
    action: Option<&'static str>,
  ) -> Result<&'static str, ApiError> {
    action.ok_or(ApiError::Unsupported {
      resource: self.spec().name,
      operation,
    })
  }

  /// All records, from the cache unless `force` is set.
  pub async fn list(&self, force: bool) -> Result<Vec<T>, ApiError> {
    let action = self.action("list", self.spec().list)?;
    self
      .list_by(&AcademyQueryKey::List(T::RESOURCE), action, &[], force)
      .await
  }

  /// Read-through for any list read of this resource, keyed by `key`.
  ///
  /// Rows that do not decode are dropped from the result. The fresh list is
  /// stamped against this resource's last-sync time.
  pub async fn list_by(
    &self,
    key: &AcademyQueryKey,
    action: &str,
    params: &[(&str, String)],
    force: bool,
  ) -> Result<Vec<T>, ApiError> {
    self.read(key, action, params, force, decode_rows::<T>).await
  }

  async fn read<R>(
    &self,
    key: &AcademyQueryKey,
    action: &str,
    params: &[(&str, String)],
    force: bool,
    decoder: fn(Value, Option<&FieldMap>) -> Result<R, ApiError>,
  ) -> Result<R, ApiError>
  where
    R: Serialize + DeserializeOwned,
  {
    let field_map = self.spec().field_map;
    let transport = &self.transport;

    let result = self
      .cache
      .fetch(key, T::RESOURCE.name(), force, || async move {
        let value = transport.get(action, params).await?;
        decoder(value, field_map)
      })
      .await?;

    if result.is_from_cache() {
      debug!(query = %key.description(), "Served from cache");
    }
    Ok(result.data)
  }

  /// One record by id. Never cached.
  pub async fn get(&self, id: &str) -> Result<T, ApiError> {
    let action = self.action("get", self.spec().get)?;
    let value = self.transport.get(action, &[("id", id.to_string())]).await?;
    decode(value, self.spec().field_map)
  }

  pub async fn create<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Value, ApiError> {
    let action = self.action("create", self.spec().create)?;
    self.mutate(action, payload).await
  }

  pub async fn update<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Value, ApiError> {
    let action = self.action("update", self.spec().update)?;
    self.mutate(action, payload).await
  }

  pub async fn upsert<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Value, ApiError> {
    let action = self.action("upsert", self.spec().upsert)?;
    self.mutate(action, payload).await
  }

  /// Delete by id. The id is sent as `id` for every resource.
  pub async fn delete(&self, id: &str) -> Result<Value, ApiError> {
    let action = self.action("delete", self.spec().delete)?;
    self.post(action, &json!({ "id": id }), false).await
  }

  async fn mutate<P: Serialize + ?Sized>(
    &self,
    action: &'static str,
    payload: &P,
  ) -> Result<Value, ApiError> {
    self.post(action, payload, true).await
  }

  async fn post<P: Serialize + ?Sized>(
    &self,
    action: &'static str,
    payload: &P,
    map_fields: bool,
  ) -> Result<Value, ApiError> {
    let field_map = if map_fields { self.spec().field_map } else { None };
    let fields = encode(payload, field_map)?;

    let response = self.transport.post(action, fields).await.map_err(|e| {
      warn!(resource = %T::RESOURCE, action, error = %e, "Mutation failed");
      e
    })?;

    self.invalidate().await;
    Ok(response)
  }

  /// Drop the resource's unparameterized read keys.
  pub async fn invalidate(&self) {
    let keys = T::RESOURCE.invalidation_keys();
    debug!(resource = %T::RESOURCE, ?keys, "Invalidating");
    self.cache.invalidate(&keys).await;
  }

  pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
    self
      .cache
      .local()
      .get_last_sync_time(T::RESOURCE.name())
      .await
  }
}

// ============================================================================
// Resource-specific reads and writes
// ============================================================================

impl<B: Transport> ResourceClient<User, B> {
  /// Accounts with the coach role.
  pub async fn coaches(&self, force: bool) -> Result<Vec<User>, ApiError> {
    self
      .list_by(&AcademyQueryKey::Coaches, COACHES_ACTION, &[], force)
      .await
  }

  /// Students assigned to one coach.
  pub async fn coach_students(&self, coach_id: &str, force: bool) -> Result<Vec<User>, ApiError> {
    let key = AcademyQueryKey::CoachStudents {
      coach_id: coach_id.to_string(),
    };
    self
      .list_by(
        &key,
        COACH_STUDENTS_ACTION,
        &[("coachId", coach_id.to_string())],
        force,
      )
      .await
  }
}

impl<B: Transport> ResourceClient<FeeRecord, B> {
  /// Fee ledger of one student.
  pub async fn for_student(&self, student_id: &str, force: bool) -> Result<Vec<FeeRecord>, ApiError> {
    let key = AcademyQueryKey::StudentFees {
      student_id: student_id.to_string(),
    };
    self
      .list_by(
        &key,
        STUDENT_FEES_ACTION,
        &[("studentId", student_id.to_string())],
        force,
      )
      .await
  }
}

impl<B: Transport> ResourceClient<SmsTransaction, B> {
  /// Transactions matching `filter`. An empty filter reads the full list.
  pub async fn filtered(
    &self,
    filter: &SmsFilter,
    force: bool,
  ) -> Result<Vec<SmsTransaction>, ApiError> {
    let action = self.action("list", self.spec().list)?;
    let key = AcademyQueryKey::SmsFiltered(filter.clone());
    let params = filter.query_params();
    self.list_by(&key, action, &params, force).await
  }
}

impl<B: Transport> ResourceClient<Analytics, B> {
  /// Dashboard overview. A single object, not a list.
  pub async fn overview(&self, force: bool) -> Result<Analytics, ApiError> {
    self
      .read(
        &AcademyQueryKey::AnalyticsOverview,
        ANALYTICS_OVERVIEW_ACTION,
        &[],
        force,
        decode::<Analytics>,
      )
      .await
  }
}

impl<B: Transport> ResourceClient<Attendance, B> {
  /// Record one attendance mark.
  pub async fn mark(&self, entry: &AttendanceMark) -> Result<Value, ApiError> {
    self.mutate(MARK_ATTENDANCE_ACTION, entry).await
  }

  /// Record a mark per entry, one request at a time.
  ///
  /// Stops at the first failure. Writes already accepted are kept and the
  /// failure is reported as [`ApiError::PartialFailure`]. The attendance list
  /// is invalidated whenever at least one write went through.
  pub async fn mark_all(&self, entries: &[AttendanceMark]) -> Result<usize, ApiError> {
    let total = entries.len();
    let mut completed = 0;

    for entry in entries {
      let fields = encode(entry, None)?;
      match self.transport.post(MARK_ATTENDANCE_ACTION, fields).await {
        Ok(_) => completed += 1,
        Err(e) => {
          warn!(completed, total, error = %e, "Bulk attendance stopped");
          if completed > 0 {
            self.invalidate().await;
          }
          return Err(ApiError::PartialFailure {
            completed,
            total,
            source: Box::new(e),
          });
        }
      }
    }

    if completed > 0 {
      self.invalidate().await;
    }
    Ok(completed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::academy::testing::FakeTransport;
  use crate::academy::types::{AttendanceStatus, Batch, Work};
  use crate::cache::{LocalCache, CACHE_NAMESPACE};

  fn client<T: Record>(transport: &Arc<FakeTransport>) -> (ResourceClient<T, FakeTransport>, LocalCache) {
    let local = LocalCache::in_memory();
    let client = ResourceClient::new(Arc::clone(transport), CacheLayer::new(local.clone()));
    (client, local)
  }

  fn users_json() -> Value {
    json!([
      { "id": "u1", "name": "Asha", "role": "student", "batchId": "b1" },
      { "id": "c1", "name": "Vikram", "role": "coach" }
    ])
  }

  #[tokio::test]
  async fn test_list_reads_network_once_then_cache() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "listUsers" => Ok(users_json()),
      _ => Ok(json!({ "success": true })),
    }));
    let (users, local) = client::<User>(&transport);

    let first = users.list(false).await.unwrap();
    let second = users.list(false).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(transport.calls_to("listUsers"), 1);
    let cached: Option<Vec<User>> = local.get(CACHE_NAMESPACE, "users_list").await;
    assert_eq!(cached.map(|u| u.len()), Some(2));
    assert!(users.last_sync_time().await.is_some());
  }

  #[tokio::test]
  async fn test_list_skips_blank_rows_and_caches_the_rest() {
    let transport = Arc::new(FakeTransport::new(|_, _| {
      Ok(json!([
        { "id": "u1", "name": "Asha", "role": "student" },
        { "id": "", "name": "", "role": "" }
      ]))
    }));
    let (users, local) = client::<User>(&transport);

    let list = users.list(false).await.unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, "u1");
    let cached: Option<Vec<User>> = local.get(CACHE_NAMESPACE, "users_list").await;
    assert_eq!(cached, Some(list));
  }

  #[tokio::test]
  async fn test_bad_amount_drops_only_that_row() {
    let transport = Arc::new(FakeTransport::new(|_, _| {
      Ok(json!([
        { "ID": "w1", "Date": "2024-03-01", "Amount": "Rs. 500" },
        { "ID": "w2", "Date": "2024-03-02", "Amount": "12-5" }
      ]))
    }));
    let (works, _) = client::<Work>(&transport);

    let list = works.list(false).await.unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].amount, 500.0);
  }

  #[tokio::test]
  async fn test_create_invalidates_list() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "listBatches" => Ok(json!([{ "id": "b1", "name": "Morning" }])),
      _ => Ok(json!({ "success": true, "id": "b2" })),
    }));
    let (batches, local) = client::<Batch>(&transport);

    batches.list(false).await.unwrap();
    batches
      .create(&json!({ "name": "Evening", "coachId": "c1" }))
      .await
      .unwrap();

    let cached: Option<Vec<Batch>> = local.get(CACHE_NAMESPACE, "batches_list").await;
    assert!(cached.is_none());

    batches.list(false).await.unwrap();
    assert_eq!(transport.calls_to("listBatches"), 2);
    let posted = transport.posts_to("createBatch");
    assert_eq!(posted[0]["name"], "Evening");
  }

  #[tokio::test]
  async fn test_force_bypasses_cache() {
    let transport = Arc::new(FakeTransport::new(|_, _| Ok(json!([]))));
    let (batches, _) = client::<Batch>(&transport);

    batches.list(false).await.unwrap();
    batches.list(true).await.unwrap();

    assert_eq!(transport.calls_to("listBatches"), 2);
  }

  #[tokio::test]
  async fn test_backend_error_leaves_cache_untouched() {
    let transport = Arc::new(FakeTransport::new(|_, _| {
      Err(ApiError::Backend("Sheet not found".to_string()))
    }));
    let (batches, local) = client::<Batch>(&transport);

    let err = batches.list(false).await.unwrap_err();

    assert_eq!(err.to_string(), "Sheet not found");
    let cached: Option<Vec<Batch>> = local.get(CACHE_NAMESPACE, "batches_list").await;
    assert!(cached.is_none());
    assert!(batches.last_sync_time().await.is_none());
  }

  #[tokio::test]
  async fn test_failed_mutation_keeps_cache() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "listBatches" => Ok(json!([{ "id": "b1", "name": "Morning" }])),
      _ => Err(ApiError::Backend("Batch not found".to_string())),
    }));
    let (batches, local) = client::<Batch>(&transport);

    batches.list(false).await.unwrap();
    assert!(batches.delete("b9").await.is_err());

    let cached: Option<Vec<Batch>> = local.get(CACHE_NAMESPACE, "batches_list").await;
    assert!(cached.is_some());
  }

  #[tokio::test]
  async fn test_unsupported_operation_skips_network() {
    let transport = Arc::new(FakeTransport::new(|_, _| Ok(json!({}))));
    let (sms, _) = client::<SmsTransaction>(&transport);

    let err = sms.create(&json!({ "amount": 1 })).await.unwrap_err();

    assert!(matches!(
      err,
      ApiError::Unsupported { resource: "sms", operation: "create" }
    ));
    assert_eq!(transport.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_user_mutation_drops_coaches_but_not_coach_students() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "getCoaches" => Ok(json!([{ "id": "c1", "name": "Vikram", "role": "coach" }])),
      "getCoachStudents" => Ok(json!([{ "id": "u1", "name": "Asha", "role": "student" }])),
      _ => Ok(json!({ "success": true })),
    }));
    let (users, _) = client::<User>(&transport);

    users.coaches(false).await.unwrap();
    users.coach_students("c1", false).await.unwrap();
    users.upsert(&json!({ "id": "u1", "name": "Asha K" })).await.unwrap();
    users.coaches(false).await.unwrap();
    users.coach_students("c1", false).await.unwrap();

    assert_eq!(transport.calls_to("getCoaches"), 2);
    assert_eq!(transport.calls_to("getCoachStudents"), 1);
    assert_eq!(
      transport.params_of("getCoachStudents")[0],
      vec![("coachId".to_string(), "c1".to_string())]
    );
  }

  #[tokio::test]
  async fn test_user_update_uses_upsert_action() {
    let transport = Arc::new(FakeTransport::new(|_, _| Ok(json!({ "success": true }))));
    let (users, _) = client::<User>(&transport);

    users.update(&json!({ "id": "u1", "role": "coach" })).await.unwrap();

    assert_eq!(transport.posts_to("upsertUser").len(), 1);
  }

  #[tokio::test]
  async fn test_works_are_mapped_both_ways() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "listWorks" => Ok(json!([{
        "ID": "w1",
        "Date": "2024-03-01",
        "Work Category": "Ground",
        "Paid By": "Ravi",
        "Amount": "1,500",
        "Mode of Transaction": "upi"
      }])),
      _ => Ok(json!({ "success": true })),
    }));
    let (works, _) = client::<Work>(&transport);

    let list = works.list(false).await.unwrap();
    assert_eq!(list[0].work_category, "Ground");
    assert_eq!(list[0].amount, 1500.0);

    works
      .create(&json!({ "date": "2024-03-02", "workCategory": "Balls", "amount": 900 }))
      .await
      .unwrap();
    let posted = &transport.posts_to("createWork")[0];
    assert_eq!(posted["Work Category"], "Balls");
    assert_eq!(posted["Amount"], 900);
    assert!(posted.get("workCategory").is_none());

    works.delete("w1").await.unwrap();
    assert_eq!(transport.posts_to("deleteWork")[0]["id"], "w1");
  }

  #[tokio::test]
  async fn test_sms_filters_are_cached_separately() {
    let transport = Arc::new(FakeTransport::new(|_, params| {
      let kind = params
        .iter()
        .find(|(k, _)| *k == "type")
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| "credit".to_string());
      Ok(json!([{ "SMS Date": "2024-05-01", "Transaction Type": kind, "Amount": "10" }]))
    }));
    let (sms, _) = client::<SmsTransaction>(&transport);
    let debit = SmsFilter {
      transaction_type: Some("debit".to_string()),
      ..Default::default()
    };

    let all = sms.filtered(&SmsFilter::default(), false).await.unwrap();
    let debits = sms.filtered(&debit, false).await.unwrap();
    sms.filtered(&debit, false).await.unwrap();
    sms.list(false).await.unwrap();

    assert_eq!(all[0].transaction_type, "credit");
    assert_eq!(debits[0].transaction_type, "debit");
    assert_eq!(transport.calls_to("listSmsTransactions"), 2);
  }

  #[tokio::test]
  async fn test_analytics_overview_is_an_object() {
    let transport = Arc::new(FakeTransport::new(|_, _| {
      Ok(json!({ "totalRevenue": 125000, "activeStudents": "42" }))
    }));
    let (analytics, local) = client::<Analytics>(&transport);

    let overview = analytics.overview(false).await.unwrap();
    analytics.overview(false).await.unwrap();

    assert_eq!(overview.total_revenue, 125000.0);
    assert_eq!(overview.active_students, 42.0);
    assert_eq!(transport.calls_to("getAnalyticsOverview"), 1);
    assert!(local.get_last_sync_time("analytics").await.is_some());
    assert!(matches!(
      analytics.list(false).await,
      Err(ApiError::Unsupported { .. })
    ));
  }

  #[tokio::test]
  async fn test_get_is_not_cached() {
    let transport = Arc::new(FakeTransport::new(|_, _| {
      Ok(json!({ "id": "u1", "name": "Asha", "role": "student" }))
    }));
    let (users, _) = client::<User>(&transport);

    users.get("u1").await.unwrap();
    let user = users.get("u1").await.unwrap();

    assert_eq!(user.name, "Asha");
    assert_eq!(transport.calls_to("getUser"), 2);
  }

  fn marks(n: usize) -> Vec<AttendanceMark> {
    (0..n)
      .map(|i| AttendanceMark {
        user_id: format!("u{}", i),
        batch_id: "b1".to_string(),
        date: "2024-06-01".to_string(),
        status: AttendanceStatus::Present,
        marked_by: "c1".to_string(),
        remarks: None,
      })
      .collect()
  }

  #[tokio::test]
  async fn test_mark_all_reports_partial_failure() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "listAttendanceRecords" => Ok(json!([])),
      _ => Ok(json!({ "success": true })),
    }));
    transport.fail_post_after(2, ApiError::Backend("quota exceeded".to_string()));
    let (attendance, local) = client::<Attendance>(&transport);
    attendance.list(false).await.unwrap();

    let err = attendance.mark_all(&marks(4)).await.unwrap_err();

    match err {
      ApiError::PartialFailure { completed, total, source } => {
        assert_eq!((completed, total), (2, 4));
        assert_eq!(source.to_string(), "quota exceeded");
      }
      other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.posts_to("markAttendance").len(), 3);
    let cached: Option<Vec<Attendance>> = local.get(CACHE_NAMESPACE, "attendance_list").await;
    assert!(cached.is_none());
  }

  #[tokio::test]
  async fn test_mark_all_first_failure_keeps_cache() {
    let transport = Arc::new(FakeTransport::new(|action, _| match action {
      "listAttendanceRecords" => Ok(json!([])),
      _ => Ok(json!({ "success": true })),
    }));
    transport.fail_post_after(0, ApiError::Backend("down".to_string()));
    let (attendance, local) = client::<Attendance>(&transport);
    attendance.list(false).await.unwrap();

    let err = attendance.mark_all(&marks(3)).await.unwrap_err();

    assert!(matches!(err, ApiError::PartialFailure { completed: 0, total: 3, .. }));
    let cached: Option<Vec<Attendance>> = local.get(CACHE_NAMESPACE, "attendance_list").await;
    assert!(cached.is_some());
  }

  #[tokio::test]
  async fn test_mark_all_success() {
    let transport = Arc::new(FakeTransport::new(|_, _| Ok(json!({ "success": true }))));
    let (attendance, _) = client::<Attendance>(&transport);

    assert_eq!(attendance.mark_all(&marks(3)).await.unwrap(), 3);
    assert_eq!(attendance.mark_all(&[]).await.unwrap(), 0);
    let posted = transport.posts_to("markAttendance");
    assert_eq!(posted[1]["userId"], "u1");
    assert_eq!(posted[1]["status"], "present");
  }
}
