//! GitHub REST access.
//!
//! `GitHubApi` is the seam the engine talks to; `GitHubClient` implements it
//! over the blocking reqwest client. Responses are decoded into private wire
//! structs and promoted to domain types here, so a payload missing a field
//! the engine relies on fails at ingestion.

use crate::error::{BotError, Result};
use crate::types::{Comment, Pages, PullRequest, PullState, RepoRef};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: &str = "100";

// ---------------------------------------------------------------------------
// GitHubApi
// ---------------------------------------------------------------------------

pub trait GitHubApi {
    /// Every open pull request in `repo`, page by page.
    fn list_open_pull_requests(&self, repo: &RepoRef) -> Result<Pages<PullRequest>>;

    /// The issue comment thread of pull request `number`, page by page.
    fn list_issue_comments(&self, number: u64, repo: &RepoRef) -> Result<Pages<Comment>>;

    /// Post one comment on pull request `number`.
    fn create_issue_comment(&self, number: u64, repo: &RepoRef, body: &str) -> Result<Comment>;
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    Token(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// `GITHUB_TOKEN` wins; otherwise `GITHUB_USERNAME` + `GITHUB_PASSWORD`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(token) = var("GITHUB_TOKEN") {
            return Credentials::Token(token.trim().to_string());
        }
        match (var("GITHUB_USERNAME"), var("GITHUB_PASSWORD")) {
            (Some(username), Some(password)) => Credentials::Basic { username, password },
            _ => Credentials::Anonymous,
        }
    }

    fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Anonymous => req,
            Credentials::Token(token) => req.bearer_auth(token),
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Token(_) => f.write_str("Token(..)"),
            Credentials::Basic { username, .. } => write!(f, "Basic({username})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireUser {
    login: String,
}

#[derive(Deserialize)]
struct WireBranch {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct WirePullRequest {
    id: u64,
    number: u64,
    title: String,
    user: WireUser,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    base: WireBranch,
    html_url: String,
}

impl From<WirePullRequest> for PullRequest {
    fn from(w: WirePullRequest) -> Self {
        let pr = PullRequest {
            id: w.id,
            number: w.number,
            title: w.title,
            author: w.user.login,
            state: PullState::from(w.state.as_str()),
            created_at: w.created_at,
            updated_at: w.updated_at,
            base_ref: w.base.name,
            html_url: w.html_url,
        };
        tracing::info!(number = pr.number, title = %pr.title, "built pull request");
        pr
    }
}

#[derive(Deserialize)]
struct WireComment {
    id: u64,
    /// Null when the author's account has been deleted.
    user: Option<WireUser>,
    body: Option<String>,
}

impl From<WireComment> for Comment {
    fn from(w: WireComment) -> Self {
        Comment {
            id: w.id,
            author: w.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
            body: w.body.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

pub struct GitHubClient {
    http: Client,
    api_base: String,
    credentials: Credentials,
}

impl GitHubClient {
    pub fn new(api_base: &str, credentials: Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("mergebot"));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn repo_url(&self, repo: &RepoRef, rest: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, repo.owner, repo.name, rest)
    }

    /// GET `url` and every page after it, following `Link: rel="next"`.
    fn get_pages<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Pages<T>> {
        let mut pages = Vec::new();
        let first = self.credentials.apply(self.http.get(&url).query(query));
        let mut resp = check(operation, first.send()?)?;
        loop {
            let next = next_link(resp.headers());
            let page: Vec<T> = resp.json()?;
            pages.push(page);
            match next {
                Some(next_url) => {
                    tracing::debug!(operation, url = %next_url, "following next page");
                    let req = self.credentials.apply(self.http.get(&next_url));
                    resp = check(operation, req.send()?)?;
                }
                None => break,
            }
        }
        Ok(pages)
    }
}

impl GitHubApi for GitHubClient {
    fn list_open_pull_requests(&self, repo: &RepoRef) -> Result<Pages<PullRequest>> {
        let pages: Pages<WirePullRequest> = self.get_pages(
            "list pull requests",
            self.repo_url(repo, "pulls"),
            &[("state", "open"), ("per_page", PER_PAGE)],
        )?;
        Ok(pages
            .into_iter()
            .map(|page| page.into_iter().map(PullRequest::from).collect())
            .collect())
    }

    fn list_issue_comments(&self, number: u64, repo: &RepoRef) -> Result<Pages<Comment>> {
        let pages: Pages<WireComment> = self.get_pages(
            "list issue comments",
            self.repo_url(repo, &format!("issues/{number}/comments")),
            &[("per_page", PER_PAGE)],
        )?;
        Ok(pages
            .into_iter()
            .map(|page| page.into_iter().map(Comment::from).collect())
            .collect())
    }

    fn create_issue_comment(&self, number: u64, repo: &RepoRef, body: &str) -> Result<Comment> {
        let req = self
            .http
            .post(self.repo_url(repo, &format!("issues/{number}/comments")))
            .json(&serde_json::json!({ "body": body }));
        let resp = check("create issue comment", self.credentials.apply(req).send()?)?;
        let created: WireComment = resp.json()?;
        Ok(created.into())
    }
}

fn check(operation: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(BotError::GitHub(format!(
        "{operation} failed with {status}: {}",
        body.trim()
    )))
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        params
            .split(';')
            .any(|p| p.trim() == r#"rel="next""#)
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn repo() -> RepoRef {
        RepoRef::new("galaxyproject", "galaxy")
    }

    fn pull_json(id: u64, number: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "number": number,
            "title": "[PROCEDURES] Testing",
            "user": { "login": "erasche" },
            "state": "open",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-02T11:30:00Z",
            "base": { "ref": "dev", "sha": "abc" },
            "html_url": format!("https://github.com/galaxyproject/galaxy/pull/{number}"),
            "body": "ignored"
        })
    }

    #[test]
    fn lists_open_pull_requests_with_promoted_fields() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/repos/galaxyproject/galaxy/pulls")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "open".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .match_header("authorization", "Bearer sekrit")
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!([pull_json(900, 12)]).to_string())
            .create();

        let client = GitHubClient::new(&server.url(), Credentials::Token("sekrit".into())).unwrap();
        let pages = client.list_open_pull_requests(&repo()).unwrap();
        m.assert();

        assert_eq!(pages.len(), 1);
        let pr = &pages[0][0];
        assert_eq!(pr.id, 900);
        assert_eq!(pr.number, 12);
        assert_eq!(pr.author, "erasche");
        assert_eq!(pr.state, PullState::Open);
        assert_eq!(pr.base_ref, "dev");
        assert_eq!(pr.updated_at.to_rfc3339(), "2024-03-02T11:30:00+00:00");
    }

    #[test]
    fn missing_field_fails_ingestion() {
        let mut server = mockito::Server::new();
        let mut broken = pull_json(1, 1);
        broken.as_object_mut().unwrap().remove("base");
        server
            .mock("GET", "/repos/galaxyproject/galaxy/pulls")
            .match_query(Matcher::Any)
            .with_body(serde_json::json!([broken]).to_string())
            .create();

        let client = GitHubClient::new(&server.url(), Credentials::Anonymous).unwrap();
        assert!(matches!(
            client.list_open_pull_requests(&repo()),
            Err(BotError::Http(_))
        ));
    }

    #[test]
    fn follows_link_header_across_comment_pages() {
        let mut server = mockito::Server::new();
        let next = format!(
            "<{}/repos/galaxyproject/galaxy/issues/12/comments?page=2>; rel=\"next\", <{}/repos/galaxyproject/galaxy/issues/12/comments?page=2>; rel=\"last\"",
            server.url(),
            server.url()
        );
        let first = server
            .mock("GET", "/repos/galaxyproject/galaxy/issues/12/comments")
            .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
            .with_header("link", &next)
            .with_body(r#"[{"id": 1, "user": {"login": "erasche"}, "body": "+1"}]"#)
            .create();
        let second = server
            .mock("GET", "/repos/galaxyproject/galaxy/issues/12/comments")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_body(r#"[{"id": 2, "user": null, "body": ":-1:"}]"#)
            .create();

        let client = GitHubClient::new(&server.url(), Credentials::Anonymous).unwrap();
        let pages = client.list_issue_comments(12, &repo()).unwrap();
        first.assert();
        second.assert();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0][0], Comment::new(1, "erasche", "+1"));
        assert_eq!(pages[1][0], Comment::new(2, "ghost", ":-1:"));
    }

    #[test]
    fn creates_comment() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/repos/galaxyproject/galaxy/issues/12/comments")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::Json(serde_json::json!({ "body": "@erasche ping" })))
            .with_status(201)
            .with_body(r#"{"id": 77, "user": {"login": "galaxybot"}, "body": "@erasche ping"}"#)
            .create();

        let creds = Credentials::Basic {
            username: "galaxybot".into(),
            password: "hunter2".into(),
        };
        let client = GitHubClient::new(&server.url(), creds).unwrap();
        let created = client
            .create_issue_comment(12, &repo(), "@erasche ping")
            .unwrap();
        m.assert();
        assert_eq!(created, Comment::new(77, "galaxybot", "@erasche ping"));
    }

    #[test]
    fn error_status_surfaces_operation_and_body() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/repos/galaxyproject/galaxy/issues/12/comments")
            .with_status(403)
            .with_body(r#"{"message": "Resource not accessible"}"#)
            .create();

        let client = GitHubClient::new(&server.url(), Credentials::Anonymous).unwrap();
        let err = client
            .create_issue_comment(12, &repo(), "hi")
            .unwrap_err()
            .to_string();
        assert!(err.contains("create issue comment"), "{err}");
        assert!(err.contains("403"), "{err}");
        assert!(err.contains("Resource not accessible"), "{err}");
    }

    #[test]
    fn next_link_ignores_other_relations() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(r#"<https://x/y?page=1>; rel="prev", <https://x/y?page=3>; rel="next""#),
        );
        assert_eq!(next_link(&headers).as_deref(), Some("https://x/y?page=3"));

        headers.insert(header::LINK, HeaderValue::from_static(r#"<https://x/y?page=1>; rel="first""#));
        assert_eq!(next_link(&headers), None);
    }
}
