use crate::config::Config;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const SCHEMA_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

const ALREADY_EXISTS_ERROR: &str = "resource_already_exists_exception";
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl StoreError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StoreError::Transport(err) => err.status(),
            StoreError::Status { status, .. } => Some(*status),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexCreation {
    Created,
    AlreadyExists,
}

/// Document store reached by the initializer and the publisher.
pub trait DocumentStore {
    fn index(&self) -> &str;

    async fn create_index(&self, schema: &Value) -> Result<IndexCreation, StoreError>;

    async fn index_document<T>(&self, document: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync;
}

#[derive(Clone)]
pub struct ElasticStore {
    base_url: String,
    index: String,
    username: String,
    password: Option<String>,
    http: reqwest::Client,
}

impl ElasticStore {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            base_url: config.es_host.trim_end_matches('/').to_string(),
            index: config.index_name.clone(),
            username: config.es_username.clone(),
            password: config.es_password.clone(),
            http,
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    fn document_url(&self) -> String {
        format!("{}/{}/_doc", self.base_url, self.index)
    }
}

impl DocumentStore for ElasticStore {
    fn index(&self) -> &str {
        &self.index
    }

    async fn create_index(&self, schema: &Value) -> Result<IndexCreation, StoreError> {
        let resp = self
            .http
            .put(self.index_url())
            .basic_auth(&self.username, self.password.as_deref())
            .json(schema)
            .timeout(SCHEMA_REQUEST_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        if is_created(status) {
            return Ok(IndexCreation::Created);
        }
        let body = resp.text().await.unwrap_or_default();
        if is_already_exists(status, &body) {
            return Ok(IndexCreation::AlreadyExists);
        }
        Err(StoreError::Status {
            status,
            body: truncate_body(body),
        })
    }

    async fn index_document<T>(&self, document: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let resp = self
            .http
            .post(self.document_url())
            .basic_auth(&self.username, self.password.as_deref())
            .json(document)
            .timeout(PUBLISH_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        if is_created(status) {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status,
            body: truncate_body(body),
        })
    }
}

fn is_created(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

pub fn is_already_exists(status: StatusCode, body: &str) -> bool {
    status == StatusCode::BAD_REQUEST && body.contains(ALREADY_EXISTS_ERROR)
}

fn truncate_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
