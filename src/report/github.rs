//! GitHub REST client for the reporting step.
//!
//! Only four operations are consumed: list issue comments, create issue
//! comment, update issue comment, and create pull-request review. Reporting
//! failures never change the lint verdict.

use crate::core::error::{Error, Result};
use serde::Serialize;

/// GitHub API address.
pub const GITHUB_API: &str = "https://api.github.com";

/// Marker prefix identifying comments created by this tool.
pub const COMMENT_MARKER: &str = "<!-- diff-lint -->\n";

/// Review event submitted alongside inline comments.
const REVIEW_EVENT_COMMENT: &str = "COMMENT";

/// Body text of the review submission.
const REVIEW_BODY: &str = "diff-lint suggestion";

/// One inline comment anchored by a diff-relative position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewComment {
    /// Repository-relative path.
    pub path: String,
    /// 1-based offset through the file's diff body.
    pub position: u32,
    /// Comment text.
    pub body: String,
}

#[derive(Debug, Serialize)]
struct ReviewRequest<'a> {
    body: &'a str,
    event: &'a str,
    comments: &'a [ReviewComment],
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

/// True for the 1xx/2xx status families.
fn is_success(status: u16) -> bool {
    matches!(status / 100, 1 | 2)
}

/// Client bound to one repository and token.
#[derive(Debug)]
pub struct GithubClient {
    http: reqwest::Client,
    base: String,
    token: String,
    repo: String,
}

impl GithubClient {
    /// Creates a client for the `owner/name` repository.
    #[must_use]
    pub fn new(token: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_base(GITHUB_API, token, repo)
    }

    /// Creates a client against a custom API base (used by tests).
    #[must_use]
    pub fn with_base(
        base: impl Into<String>,
        token: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
            token: token.into(),
            repo: repo.into(),
        }
    }

    fn check_response(status: reqwest::StatusCode, path: &str) -> Result<()> {
        if is_success(status.as_u16()) {
            Ok(())
        } else {
            Err(Error::Http {
                status: status.as_u16(),
                path: path.to_string(),
            })
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<serde_json::Value> {
        let response = request
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "diff-lint")
            .send()
            .await
            .map_err(|e| Error::HttpBody {
                message: e.to_string(),
            })?;
        Self::check_response(response.status(), path)?;
        response.json().await.map_err(|e| Error::HttpBody {
            message: e.to_string(),
        })
    }

    /// Lists every comment on the pull request, oldest first.
    pub async fn list_issue_comments(&self, pr_number: u64) -> Result<Vec<serde_json::Value>> {
        let path = format!("/repos/{}/issues/{}/comments", self.repo, pr_number);
        tracing::debug!(path = %path, "Listing issue comments");
        let body = self
            .send(self.http.get(format!("{}{path}", self.base)), &path)
            .await?;
        match body {
            serde_json::Value::Array(comments) => Ok(comments),
            serde_json::Value::Null => Ok(Vec::new()),
            _ => Err(Error::HttpBody {
                message: "issue comments are not an array".to_string(),
            }),
        }
    }

    /// Creates a new marker-prefixed comment; returns its id.
    pub async fn create_issue_comment(&self, pr_number: u64, body: &str) -> Result<u64> {
        let path = format!("/repos/{}/issues/{}/comments", self.repo, pr_number);
        tracing::debug!(path = %path, "Creating issue comment");
        let marked = format!("{COMMENT_MARKER}{body}");
        let response = self
            .send(
                self.http
                    .post(format!("{}{path}", self.base))
                    .json(&CommentRequest { body: &marked }),
                &path,
            )
            .await?;
        comment_id(&response)
    }

    /// Rewrites an existing comment in place.
    pub async fn update_issue_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        let path = format!("/repos/{}/issues/comments/{comment_id}", self.repo);
        tracing::debug!(path = %path, "Updating issue comment");
        let marked = format!("{COMMENT_MARKER}{body}");
        self.send(
            self.http
                .patch(format!("{}{path}", self.base))
                .json(&CommentRequest { body: &marked }),
            &path,
        )
        .await?;
        Ok(())
    }

    /// Find-or-create: updates the earliest owned comment, else creates one.
    ///
    /// Repeated CI runs therefore keep exactly one comment per pull request.
    pub async fn upsert_issue_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        let comments = self.list_issue_comments(pr_number).await?;
        match find_our_comment(&comments) {
            Some(id) => self.update_issue_comment(id, body).await,
            None => {
                let id = self.create_issue_comment(pr_number, body).await?;
                tracing::info!(comment_id = id, pr = pr_number, "Created new comment");
                Ok(())
            }
        }
    }

    /// Submits one review bundling every inline comment.
    pub async fn create_pull_request_review(
        &self,
        pr_number: u64,
        comments: &[ReviewComment],
    ) -> Result<()> {
        let path = format!("/repos/{}/pulls/{}/reviews", self.repo, pr_number);
        tracing::debug!(path = %path, comments = comments.len(), "Posting review");
        self.send(
            self.http.post(format!("{}{path}", self.base)).json(&ReviewRequest {
                body: REVIEW_BODY,
                event: REVIEW_EVENT_COMMENT,
                comments,
            }),
            &path,
        )
        .await?;
        Ok(())
    }
}

/// Linear scan for the earliest comment carrying our marker prefix.
#[must_use]
pub fn find_our_comment(comments: &[serde_json::Value]) -> Option<u64> {
    comments
        .iter()
        .find(|comment| {
            comment["body"]
                .as_str()
                .is_some_and(|body| body.starts_with(COMMENT_MARKER))
        })
        .and_then(|comment| comment["id"].as_u64())
}

fn comment_id(comment: &serde_json::Value) -> Result<u64> {
    comment["id"].as_u64().ok_or_else(|| Error::HttpBody {
        message: "comment has no id".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_is_success_families() {
        assert!(is_success(100));
        assert!(is_success(200));
        assert!(is_success(201));
        assert!(!is_success(301));
        assert!(!is_success(404));
        assert!(!is_success(500));
    }

    #[test]
    fn test_find_our_comment_picks_earliest_match() {
        let comments = vec![
            json!({"id": 1, "body": "unrelated"}),
            json!({"id": 2, "body": format!("{COMMENT_MARKER}old report")}),
            json!({"id": 3, "body": format!("{COMMENT_MARKER}newer report")}),
        ];
        assert_eq!(find_our_comment(&comments), Some(2));
    }

    #[test]
    fn test_find_our_comment_requires_prefix() {
        let comments = vec![
            json!({"id": 1, "body": format!("quoted: {COMMENT_MARKER}")}),
            json!({"id": 2}),
            json!({"id": 3, "body": 7}),
        ];
        assert_eq!(find_our_comment(&comments), None);
    }

    #[test]
    fn test_find_our_comment_empty_list() {
        assert_eq!(find_our_comment(&[]), None);
    }

    #[test]
    fn test_review_request_shape() {
        let comments = vec![ReviewComment {
            path: "src/a.cpp".to_string(),
            position: 7,
            body: "use auto [modernize-use-auto]".to_string(),
        }];
        let request = ReviewRequest {
            body: REVIEW_BODY,
            event: REVIEW_EVENT_COMMENT,
            comments: &comments,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "body": "diff-lint suggestion",
                "event": "COMMENT",
                "comments": [
                    {"path": "src/a.cpp", "position": 7, "body": "use auto [modernize-use-auto]"}
                ]
            })
        );
    }

    #[test]
    fn test_comment_request_shape() {
        let value = serde_json::to_value(CommentRequest { body: "hi" }).expect("serialize");
        assert_eq!(value, json!({"body": "hi"}));
    }

    #[test]
    fn test_check_response_maps_failures() {
        let err = GithubClient::check_response(reqwest::StatusCode::FORBIDDEN, "/repos/x")
            .expect_err("403 fails");
        assert!(matches!(err, Error::Http { status: 403, .. }));
        assert!(GithubClient::check_response(reqwest::StatusCode::CREATED, "/repos/x").is_ok());
    }

    // =========================================================================
    // Upsert against a local stub server
    // =========================================================================

    /// Serves one canned JSON body per connection and records each request's
    /// method and path. `Connection: close` forces a fresh connection per
    /// request so the canned bodies are consumed in order.
    fn stub_server(
        responses: Vec<String>,
    ) -> (
        String,
        std::sync::Arc<std::sync::Mutex<Vec<(String, String)>>>,
        std::thread::JoinHandle<()>,
    ) {
        use std::io::{BufRead, BufReader, Read, Write};
        use std::sync::{Arc, Mutex};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        let handle = std::thread::spawn(move || {
            for body in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                reader.read_line(&mut request_line).expect("request line");
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();

                let mut content_length = 0usize;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).expect("header line");
                    if header.trim().is_empty() {
                        break;
                    }
                    if let Some(value) = header.to_ascii_lowercase().strip_prefix("content-length:")
                    {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
                let mut request_body = vec![0u8; content_length];
                if content_length > 0 {
                    reader.read_exact(&mut request_body).expect("request body");
                }
                log.lock().expect("log lock").push((method, path));

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len(),
                );
                stream.write_all(response.as_bytes()).expect("respond");
            }
        });

        (base, requests, handle)
    }

    #[tokio::test]
    async fn test_upsert_updates_instead_of_duplicating() {
        // First run: no owned comment yet, so the client creates one.
        // Second run: the listing now carries the marker, so it patches.
        let listing_with_ours =
            json!([{"id": 7, "body": format!("{COMMENT_MARKER}first report")}]).to_string();
        let (base, requests, handle) = stub_server(vec![
            "[]".to_string(),
            json!({"id": 7}).to_string(),
            listing_with_ours,
            json!({"id": 7}).to_string(),
        ]);

        let client = GithubClient::with_base(base, "token", "owner/repo");
        client
            .upsert_issue_comment(1, "first report")
            .await
            .expect("first upsert");
        client
            .upsert_issue_comment(1, "second report")
            .await
            .expect("second upsert");
        handle.join().expect("server finished");

        let requests = requests.lock().expect("log lock");
        let methods_and_paths: Vec<(&str, &str)> = requests
            .iter()
            .map(|(m, p)| (m.as_str(), p.as_str()))
            .collect();
        assert_eq!(
            methods_and_paths,
            vec![
                ("GET", "/repos/owner/repo/issues/1/comments"),
                ("POST", "/repos/owner/repo/issues/1/comments"),
                ("GET", "/repos/owner/repo/issues/1/comments"),
                ("PATCH", "/repos/owner/repo/issues/comments/7"),
            ]
        );
    }
}
