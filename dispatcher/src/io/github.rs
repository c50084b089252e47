//! Repository host access: fetch a pull request, comment on it, close it.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::core::request::RepoId;

const USER_AGENT: &str = concat!("feedstock-dispatcher/", env!("CARGO_PKG_VERSION"));

/// Where the pull request's changes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullHead {
    pub branch: String,
    pub repo: RepoId,
}

pub trait PullRequestHandle {
    fn number(&self) -> u64;
    fn is_closed(&self) -> bool;
    fn head(&self) -> &PullHead;
    fn labels(&self) -> &[String];
    fn post_comment(&self, body: &str) -> Result<()>;
    fn close(&self) -> Result<()>;
}

pub trait RepositoryHost {
    type Pull: PullRequestHandle;

    fn pull_request(&self, repo: &RepoId, number: u64) -> Result<Self::Pull>;
}

/// GitHub REST client.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| anyhow!("token contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build github client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response> {
        let response = request.send().with_context(|| format!("{what}: send"))?;
        let status = response.status();
        debug!(%status, what, "github response");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("{what}: {status}: {}", body.trim()));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    state: String,
    head: RawHead,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    #[serde(rename = "ref")]
    branch: String,
    repo: Option<RawRepo>,
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    name: String,
    owner: RawOwner,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

/// A pull request fetched from GitHub.
#[derive(Debug)]
pub struct GithubPull {
    client: GithubClient,
    base: RepoId,
    number: u64,
    closed: bool,
    head: PullHead,
    labels: Vec<String>,
}

impl RepositoryHost for GithubClient {
    type Pull = GithubPull;

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    fn pull_request(&self, repo: &RepoId, number: u64) -> Result<GithubPull> {
        let what = format!("get pull request {repo}#{number}");
        let request = self
            .client
            .get(self.url(&format!("/repos/{}/{}/pulls/{number}", repo.owner, repo.name)));
        let raw: RawPull = self
            .send(request, &what)?
            .json()
            .with_context(|| format!("{what}: decode"))?;
        let head_repo = raw
            .head
            .repo
            .ok_or_else(|| anyhow!("{what}: head repository no longer exists"))?;
        info!(state = %raw.state, head = %raw.head.branch, "fetched pull request");
        Ok(GithubPull {
            client: self.clone(),
            base: repo.clone(),
            number: raw.number,
            closed: raw.state == "closed",
            head: PullHead {
                branch: raw.head.branch,
                repo: RepoId::new(head_repo.owner.login, head_repo.name),
            },
            labels: raw.labels.into_iter().map(|label| label.name).collect(),
        })
    }
}

impl PullRequestHandle for GithubPull {
    fn number(&self) -> u64 {
        self.number
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn head(&self) -> &PullHead {
        &self.head
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    #[instrument(skip_all, fields(number = self.number))]
    fn post_comment(&self, body: &str) -> Result<()> {
        let path = format!(
            "/repos/{}/{}/issues/{}/comments",
            self.base.owner, self.base.name, self.number
        );
        let request = self.client.client.post(self.client.url(&path)).json(&json!({ "body": body }));
        self.client.send(request, "post comment")?;
        info!("posted comment");
        Ok(())
    }

    #[instrument(skip_all, fields(number = self.number))]
    fn close(&self) -> Result<()> {
        let path = format!(
            "/repos/{}/{}/pulls/{}",
            self.base.owner, self.base.name, self.number
        );
        let request = self
            .client
            .client
            .patch(self.client.url(&path))
            .json(&json!({ "state": "closed" }));
        self.client.send(request, "close pull request")?;
        info!("closed pull request");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pull_payload() {
        let raw: RawPull = serde_json::from_str(
            r#"{
                "number": 42,
                "state": "open",
                "head": {"ref": "bump", "repo": {"name": "pkg-feedstock", "owner": {"login": "someone"}}},
                "labels": [{"name": "automerge"}]
            }"#,
        )
        .expect("decode");
        assert_eq!(raw.number, 42);
        assert_eq!(raw.head.branch, "bump");
        assert_eq!(raw.labels[0].name, "automerge");
    }

    #[test]
    fn deleted_fork_decodes_without_repo() {
        let raw: RawPull = serde_json::from_str(
            r#"{"number": 1, "state": "open", "head": {"ref": "x", "repo": null}}"#,
        )
        .expect("decode");
        assert!(raw.head.repo.is_none());
        assert!(raw.labels.is_empty());
    }

    #[test]
    fn debug_hides_token() {
        let client =
            GithubClient::new("https://api.example/", "s3cret", Duration::from_secs(5))
                .expect("client");
        let shown = format!("{client:?}");
        assert!(!shown.contains("s3cret"));
        assert_eq!(client.url("/x"), "https://api.example/x");
    }
}
