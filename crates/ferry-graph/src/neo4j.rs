//! [`Neo4jHttpSource`]: Cypher over the Neo4j transactional HTTP endpoint.
//!
//! Each page is one auto-committed request to
//! `POST {uri}/db/{database}/tx/commit`:
//!
//! ```json
//! {"statements":[{"statement":"MATCH ...","parameters":{"domain":"ecd","skip":0,"limit":1000}}]}
//! ```
//!
//! The response carries `results[0].columns` and `results[0].data[].row`.

use std::time::Duration;

use ferry_core::{
  migration::SourceQuery,
  record::SourceRecord,
  source::{DomainFilter, GraphSource, PageRequest},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

use crate::GraphError;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jConfig {
  #[serde(default = "Neo4jConfig::default_uri")]
  pub uri:          String,
  #[serde(default = "Neo4jConfig::default_username")]
  pub username:     String,
  #[serde(default)]
  pub password:     String,
  #[serde(default = "Neo4jConfig::default_database")]
  pub database:     String,
  #[serde(default = "Neo4jConfig::default_timeout")]
  pub timeout_secs: u64,
}

impl Neo4jConfig {
  fn default_uri() -> String { "http://localhost:7474".to_owned() }

  fn default_username() -> String { "neo4j".to_owned() }

  fn default_database() -> String { "neo4j".to_owned() }

  fn default_timeout() -> u64 { 30 }
}

impl Default for Neo4jConfig {
  fn default() -> Self {
    Self {
      uri:          Self::default_uri(),
      username:     Self::default_username(),
      password:     String::new(),
      database:     Self::default_database(),
      timeout_secs: Self::default_timeout(),
    }
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CommitRequest<'a> {
  statements: [Statement<'a>; 1],
}

#[derive(Serialize)]
struct Statement<'a> {
  statement:  &'a str,
  parameters: Json,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
  #[serde(default)]
  results: Vec<StatementResult>,
  #[serde(default)]
  errors:  Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
  columns: Vec<String>,
  #[serde(default)]
  data:    Vec<DataRow>,
}

#[derive(Debug, Deserialize)]
struct DataRow {
  row: Vec<Json>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
  code:    String,
  message: String,
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// A read-only Neo4j source.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct Neo4jHttpSource {
  client: Client,
  config: Neo4jConfig,
}

impl Neo4jHttpSource {
  pub fn new(config: Neo4jConfig) -> Result<Self, GraphError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!(
      "{}/db/{}/tx/commit",
      self.config.uri.trim_end_matches('/'),
      self.config.database
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn run(
    &self,
    query: &SourceQuery,
    filter: &DomainFilter,
    page: PageRequest,
  ) -> Result<Vec<SourceRecord>, GraphError> {
    let body = CommitRequest {
      statements: [Statement {
        statement:  query.cypher,
        parameters: json!({
          "domain": filter.domain,
          "skip":   page.skip,
          "limit":  page.limit,
        }),
      }],
    };

    let resp = self
      .auth(self.client.post(self.url()))
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(GraphError::Status { status: status.as_u16(), body });
    }

    let parsed: CommitResponse = resp.json().await?;
    decode(parsed, query.columns)
  }
}

impl GraphSource for Neo4jHttpSource {
  type Error = GraphError;

  async fn fetch_page<'a>(
    &'a self,
    query: &'a SourceQuery,
    filter: &'a DomainFilter,
    page: PageRequest,
  ) -> Result<Vec<SourceRecord>, GraphError> {
    tracing::debug!(stage = %query.kind, skip = page.skip, limit = page.limit, "querying neo4j");
    self.run(query, filter, page).await
  }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

fn decode(resp: CommitResponse, columns: &[&str]) -> Result<Vec<SourceRecord>, GraphError> {
  if let Some(err) = resp.errors.into_iter().next() {
    return Err(GraphError::Query {
      code:    err.code,
      message: err.message,
    });
  }
  let result = resp
    .results
    .into_iter()
    .next()
    .ok_or(GraphError::MissingResult)?;

  result
    .data
    .into_iter()
    .map(|data| {
      if data.row.len() != result.columns.len() {
        return Err(GraphError::RowShape {
          expected: result.columns.len(),
          found:    data.row.len(),
        });
      }
      let pairs = result
        .columns
        .iter()
        .map(String::as_str)
        .zip(data.row.iter().map(to_text));
      Ok(SourceRecord::from_pairs(pairs).project(columns))
    })
    .collect()
}

/// Render one returned value as staged text. Lists are `;`-joined so link
/// stages can fan them out again; maps are kept as JSON.
fn to_text(value: &Json) -> Option<String> {
  match value {
    Json::Null => None,
    Json::String(s) => Some(s.clone()),
    Json::Bool(b) => Some(b.to_string()),
    Json::Number(n) => Some(n.to_string()),
    Json::Array(items) => {
      let parts: Vec<String> = items.iter().filter_map(to_text).collect();
      (!parts.is_empty()).then(|| parts.join(";"))
    }
    Json::Object(_) => Some(value.to_string()),
  }
}
