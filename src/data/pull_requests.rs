//! Pull-request status via the GitHub CLI
//!
//! Shells out to an authenticated `gh` for the current user's open PRs,
//! PRs awaiting their review, and PRs merged in the last 30 days. The
//! subprocess sits behind `CommandRunner` so it plugs into the same
//! `UpstreamClient` seam as the HTTP clients.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{Fetched, UpstreamClient};
use crate::error::FetchError;
use crate::store::Settings;

/// Fields requested from `gh search prs`
const PR_FIELDS: &str = "number,title,url,repository,createdAt,updatedAt,isDraft";

/// Maximum results per search
const SEARCH_LIMIT: &str = "30";

/// Window for the "recently merged" list
const MERGED_WINDOW_DAYS: i64 = 30;

/// Captured result of a finished subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs programs as real subprocesses with a timeout
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let child = Command::new(program).args(args).kill_on_drop(true).output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "command timed out"))??;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Repository reference as reported by `gh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    pub name_with_owner: String,
}

/// One pull request from a `gh search prs` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub repository: Repository,
    pub created_at: String,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
}

/// PR-status widget payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrStatus {
    pub username: String,
    /// Open PRs authored by the user
    pub authored: Vec<PullRequest>,
    /// Open PRs where the user's review is requested
    pub review_requested: Vec<PullRequest>,
    /// PRs authored by the user merged in the last 30 days
    pub recently_merged: Vec<PullRequest>,
}

/// Client for the pr-status widget
#[derive(Clone)]
pub struct PrStatusClient {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl PrStatusClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_program(runner, "gh")
    }

    pub fn with_program(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Runs `gh` and returns its stdout
    async fn gh(&self, args: Vec<String>) -> Result<String, FetchError> {
        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|e| unavailable(&e.to_string()))?;

        if !output.success {
            debug!(args = ?args, stderr = %output.stderr.trim(), "gh exited unsuccessfully");
            return Err(unavailable(output.stderr.trim()));
        }
        Ok(output.stdout)
    }

    async fn username(&self) -> Result<String, FetchError> {
        let stdout = self
            .gh(to_args(&["api", "user", "--jq", ".login"]))
            .await?;
        let login = stdout.trim();
        if login.is_empty() {
            return Err(unavailable("empty login"));
        }
        Ok(login.to_string())
    }

    async fn search(&self, filters: &[&str]) -> Result<Vec<PullRequest>, FetchError> {
        let mut args = to_args(&["search", "prs"]);
        args.extend(filters.iter().map(|f| f.to_string()));
        args.extend(to_args(&["--json", PR_FIELDS, "--limit", SEARCH_LIMIT]));

        let stdout = self.gh(args).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            FetchError::UpstreamError(format!("Unexpected GitHub CLI output: {}", e))
        })
    }

    /// Collects all four lists; any failing sub-command fails the whole fetch
    pub async fn fetch_status(&self) -> Result<PrStatus, FetchError> {
        let merged_since = (Utc::now() - ChronoDuration::days(MERGED_WINDOW_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let merged_filter = format!(">={}", merged_since);
        let authored_args = ["--author", "@me", "--state", "open"];
        let review_args = ["--review-requested", "@me", "--state", "open"];
        let merged_args = ["--author", "@me", "--merged", "--merged-at", merged_filter.as_str()];

        let (username, authored, review_requested, recently_merged) = futures::try_join!(
            self.username(),
            self.search(&authored_args),
            self.search(&review_args),
            self.search(&merged_args),
        )?;

        Ok(PrStatus {
            username,
            authored,
            review_requested,
            recently_merged,
        })
    }
}

#[async_trait]
impl UpstreamClient for PrStatusClient {
    async fn fetch(&self, _settings: &Settings) -> Result<Fetched, FetchError> {
        let status = self.fetch_status().await?;
        Fetched::from_serialize(&status)
    }

    fn fetch_keys(&self) -> &'static [&'static str] {
        &["refresh_period"]
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn unavailable(detail: &str) -> FetchError {
    FetchError::UpstreamUnavailable(format!(
        "GitHub CLI unavailable ({}). Make sure `gh` is installed and authenticated (gh auth login)",
        detail
    ))
}
