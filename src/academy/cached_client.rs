//! Cached academy client: one resource client per family over a shared cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::{json, Value};
use tracing::info;

use crate::cache::{CacheLayer, LocalCache, StoreLocation};
use crate::config::Config;

use super::cache::Resource;
use super::client::{decode, encode, HttpTransport, Transport};
use super::error::ApiError;
use super::resource::ResourceClient;
use super::types::{
  Analytics, Attendance, AttendanceMark, AttendanceStatus, Batch, Content, FeeRecord, Investment,
  SmsFilter, SmsTransaction, User, Work, YoyoTestResult,
};

const LOGIN_ACTION: &str = "login";
const CHANGE_PASSWORD_ACTION: &str = "changePassword";

/// Academy backend client with transparent caching.
///
/// Cheap to clone: clones share the transport and the local cache.
pub struct AcademyClient<B: Transport = HttpTransport> {
  transport: Arc<B>,
  local: LocalCache,
  pub users: ResourceClient<User, B>,
  pub batches: ResourceClient<Batch, B>,
  pub content: ResourceClient<Content, B>,
  pub attendance: ResourceClient<Attendance, B>,
  pub fitness_tests: ResourceClient<YoyoTestResult, B>,
  pub analytics: ResourceClient<Analytics, B>,
  pub fees: ResourceClient<FeeRecord, B>,
  pub sms: ResourceClient<SmsTransaction, B>,
  pub works: ResourceClient<Work, B>,
  pub investments: ResourceClient<Investment, B>,
}

impl<B: Transport> Clone for AcademyClient<B> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      local: self.local.clone(),
      users: self.users.clone(),
      batches: self.batches.clone(),
      content: self.content.clone(),
      attendance: self.attendance.clone(),
      fitness_tests: self.fitness_tests.clone(),
      analytics: self.analytics.clone(),
      fees: self.fees.clone(),
      sms: self.sms.clone(),
      works: self.works.clone(),
      investments: self.investments.clone(),
    }
  }
}

impl AcademyClient<HttpTransport> {
  /// Create a client for the configured backend and cache location.
  pub fn new(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(&config.backend.url)?;
    let location = if config.cache.enabled {
      StoreLocation::File(config.cache_path()?)
    } else {
      StoreLocation::Disabled
    };
    Ok(Self::with_transport(transport, LocalCache::new(location)))
  }
}

impl<B: Transport> AcademyClient<B> {
  pub fn with_transport(transport: B, local: LocalCache) -> Self {
    let transport = Arc::new(transport);
    let layer = CacheLayer::new(local.clone());

    Self {
      users: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      batches: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      content: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      attendance: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      fitness_tests: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      analytics: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      fees: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      sms: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      works: ResourceClient::new(Arc::clone(&transport), layer.clone()),
      investments: ResourceClient::new(Arc::clone(&transport), layer),
      transport,
      local,
    }
  }

  pub fn cache(&self) -> &LocalCache {
    &self.local
  }

  /// Authenticate by phone and password. Never cached.
  pub async fn login(&self, phone: &str, password: &str) -> Result<User, ApiError> {
    let fields = encode(&json!({ "phone": phone, "password": password }), None)?;
    let response = self.transport.post(LOGIN_ACTION, fields).await?;
    // The account may come back bare or wrapped in `user`
    let user = match response {
      Value::Object(mut body) if body.contains_key("user") => {
        body.remove("user").unwrap_or(Value::Null)
      }
      other => other,
    };
    decode(user, None)
  }

  /// Set a new password for an account. Never cached.
  pub async fn change_password(&self, id: &str, new_password: &str) -> Result<Value, ApiError> {
    let fields = encode(&json!({ "id": id, "newPassword": new_password }), None)?;
    self.transport.post(CHANGE_PASSWORD_ACTION, fields).await
  }

  pub async fn analytics(&self, force: bool) -> Result<Analytics, ApiError> {
    self.analytics.overview(force).await
  }

  pub async fn sms_transactions(
    &self,
    filter: &SmsFilter,
    force: bool,
  ) -> Result<Vec<SmsTransaction>, ApiError> {
    self.sms.filtered(filter, force).await
  }

  pub async fn mark_attendance(&self, entry: &AttendanceMark) -> Result<Value, ApiError> {
    self.attendance.mark(entry).await
  }

  /// Mark every player of `batch_id` with the same status.
  ///
  /// Players outside the batch are skipped. Returns the number of marks
  /// written; see [`ResourceClient::mark_all`] for the failure behaviour.
  pub async fn mark_batch_attendance(
    &self,
    batch_id: &str,
    players: &[User],
    date: &str,
    status: AttendanceStatus,
    marked_by: &str,
  ) -> Result<usize, ApiError> {
    let entries: Vec<AttendanceMark> = players
      .iter()
      .filter(|p| p.batch_id.as_deref() == Some(batch_id))
      .map(|p| AttendanceMark {
        user_id: p.id.clone(),
        batch_id: batch_id.to_string(),
        date: date.to_string(),
        status,
        marked_by: marked_by.to_string(),
        remarks: None,
      })
      .collect();

    self.attendance.mark_all(&entries).await
  }

  /// Drop every cached read and last-sync marker so the next reads refetch.
  pub async fn sync_all(&self) {
    self.local.clear_all().await;
    info!("Cleared local cache for full sync");
  }

  pub async fn last_sync_time(&self, resource: Resource) -> Option<DateTime<Utc>> {
    self.local.get_last_sync_time(resource.name()).await
  }
}
