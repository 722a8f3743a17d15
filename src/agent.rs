//! Remote worker agent: pulls tasks from an orchestrator over HTTP.

use std::time::Duration;

use reqwest::StatusCode;

use crate::config::Config;
use crate::core::task::{Task, TaskResult};
use crate::orchestration::TaskSource;
use crate::{alog_trace, Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const TASK_PATH: &str = "/internal/task";
pub const RESULT_PATH: &str = "/internal/task/result";

/// HTTP client for the orchestrator's internal task endpoints.
#[derive(Debug, Clone)]
pub struct HttpTaskClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.orchestrator_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /internal/task`. A 404 means the queue is empty.
    pub async fn fetch_task(&self) -> Result<Option<Task>> {
        let url = self.url(TASK_PATH);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let task: Task = response.json().await?;
                alog_trace!("Fetched task {} from {}", task.id.short(), self.base_url);
                Ok(Some(task))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url,
            }),
        }
    }

    /// `POST /internal/task/result`.
    ///
    /// A 404 means the orchestrator no longer wants this result and maps to
    /// [`Error::UnknownTask`].
    pub async fn submit_result(&self, result: &TaskResult) -> Result<()> {
        let url = self.url(RESULT_PATH);
        let response = self.client.post(&url).json(result).send().await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::UnknownTask(result.task_id)),
            status => Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url,
            }),
        }
    }
}

impl TaskSource for HttpTaskClient {
    async fn claim(&self) -> Result<Option<Task>> {
        self.fetch_task().await
    }

    async fn submit(&self, result: TaskResult) -> Result<()> {
        self.submit_result(&result).await
    }
}
