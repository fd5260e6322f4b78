//! Error type for `ferry-graph`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("graph server returned {status}: {body}")]
  Status { status: u16, body: String },

  /// The server accepted the request but the statement failed.
  #[error("query failed ({code}): {message}")]
  Query { code: String, message: String },

  #[error("response carried no statement result")]
  MissingResult,

  #[error("row has {found} values for {expected} columns")]
  RowShape { expected: usize, found: usize },

  #[error("graph unavailable: {0}")]
  Unavailable(String),
}
