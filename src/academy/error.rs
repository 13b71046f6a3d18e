use thiserror::Error;

/// Message used when a failed response carries no `error` field.
pub const GENERIC_FAILURE: &str = "Request failed";

#[derive(Error, Debug)]
pub enum ApiError {
  /// The backend reported a failure, either through an `error` field or a
  /// non-success status.
  #[error("{0}")]
  Backend(String),

  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Invalid response: {0}")]
  InvalidResponse(String),

  #[error("Invalid request payload: {0}")]
  InvalidPayload(String),

  #[error("{resource} does not support {operation}")]
  Unsupported {
    resource: &'static str,
    operation: &'static str,
  },

  /// A bulk mutation stopped partway. Earlier writes are kept.
  #[error("Stopped after {completed} of {total} updates: {source}")]
  PartialFailure {
    completed: usize,
    total: usize,
    #[source]
    source: Box<ApiError>,
  },
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

impl ApiError {
  /// Build the error for a response body that is not the expected JSON.
  pub fn unparsable(body: &str, err: serde_json::Error) -> Self {
    let quoted = if body.len() <= MAX_ERROR_BODY_LENGTH {
      body.to_string()
    } else {
      let mut end = MAX_ERROR_BODY_LENGTH;
      while !body.is_char_boundary(end) {
        end -= 1;
      }
      format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    };
    ApiError::InvalidResponse(format!("{} in body: {}", err, quoted))
  }

  /// Human readable message suitable for showing to the operator.
  pub fn user_message(&self) -> String {
    match self {
      ApiError::Backend(msg) => msg.clone(),
      ApiError::PartialFailure { source, .. } => source.user_message(),
      _ => GENERIC_FAILURE.to_string(),
    }
  }
}
