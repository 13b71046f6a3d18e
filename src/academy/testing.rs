//! Scripted transport for tests.

use std::sync::Mutex;

use serde_json::{Map, Value};

use super::client::Transport;
use super::error::ApiError;

type Responder = Box<dyn Fn(&str, &[(String, String)]) -> Result<Value, ApiError> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum Call {
  Get {
    action: String,
    params: Vec<(String, String)>,
  },
  Post {
    action: String,
    fields: Value,
  },
}

impl Call {
  fn action(&self) -> &str {
    match self {
      Call::Get { action, .. } | Call::Post { action, .. } => action,
    }
  }
}

/// Records every request and answers with a closure of `(action, params)`.
///
/// Posts are answered with the same closure, called with no params.
pub struct FakeTransport {
  responder: Responder,
  calls: Mutex<Vec<Call>>,
  post_failure: Mutex<Option<(usize, ApiError)>>,
}

impl FakeTransport {
  pub fn new<F>(responder: F) -> Self
  where
    F: Fn(&str, &[(String, String)]) -> Result<Value, ApiError> + Send + Sync + 'static,
  {
    Self {
      responder: Box::new(responder),
      calls: Mutex::new(Vec::new()),
      post_failure: Mutex::new(None),
    }
  }

  /// Let `successes` posts through, then fail the next one with `error`.
  pub fn fail_post_after(&self, successes: usize, error: ApiError) {
    *self.post_failure.lock().unwrap() = Some((successes, error));
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn calls_to(&self, action: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.action() == action)
      .count()
  }

  pub fn params_of(&self, action: &str) -> Vec<Vec<(String, String)>> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Get { action: a, params } if a == action => Some(params),
        _ => None,
      })
      .collect()
  }

  pub fn posts_to(&self, action: &str) -> Vec<Value> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Post { action: a, fields } if a == action => Some(fields),
        _ => None,
      })
      .collect()
  }

  fn take_post_failure(&self) -> Option<ApiError> {
    let mut slot = self.post_failure.lock().unwrap();
    let remaining = &mut slot.as_mut()?.0;
    if *remaining > 0 {
      *remaining -= 1;
      return None;
    }
    slot.take().map(|(_, e)| e)
  }
}

impl Transport for FakeTransport {
  async fn get(&self, action: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
    let params: Vec<(String, String)> = params
      .iter()
      .map(|(k, v)| (k.to_string(), v.clone()))
      .collect();
    self.calls.lock().unwrap().push(Call::Get {
      action: action.to_string(),
      params: params.clone(),
    });
    (self.responder)(action, &params)
  }

  async fn post(&self, action: &str, fields: Map<String, Value>) -> Result<Value, ApiError> {
    self.calls.lock().unwrap().push(Call::Post {
      action: action.to_string(),
      fields: Value::Object(fields),
    });
    if let Some(err) = self.take_post_failure() {
      return Err(err);
    }
    (self.responder)(action, &[])
  }
}
