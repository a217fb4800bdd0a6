//! GitHub REST calls behind the labctl subcommands, building on top of the Octocrab library

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use http::{HeaderName, StatusCode};
use http_body_util::BodyExt;
use log::debug;
use octocrab::{Octocrab, OctocrabBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

/// The repository all network subcommands operate on. Fixed on purpose: these
/// tools automate a single homelab repository and nothing else.
pub const OWNER: &str = "bluefishforsale";
pub const REPO: &str = "homelab";

/// Build an Octocrab client authenticated with the given access token, with
/// the standard GitHub media type and API version headers.
pub fn client(access_token: &str) -> Result<Octocrab> {
    let octocrab = OctocrabBuilder::default()
        .personal_token(access_token.to_owned())
        .add_header(
            HeaderName::from_static("accept"),
            "application/vnd.github.v3+json".to_string(),
        )
        .add_header(
            HeaderName::from_static("x-github-api-version"),
            "2022-11-28".to_string(),
        )
        .build()?;
    Ok(octocrab)
}

/// The outcome of a single GitHub API call. Can either be:
///
/// * Success(T) - The 2xx response body, deserialized into the operation's payload type
/// * Failure { status, body } - The non-2xx status code and the raw response body, for reporting
///
/// Transport problems (connection refused, bad UTF-8, unparseable 2xx body)
/// are ordinary `Err`s instead.
#[derive(Debug)]
pub enum ApiOutcome<T> {
    Success(T),
    Failure { status: StatusCode, body: String },
}

/// A struct that can be used to partially deserialize the response from the
/// create-an-issue GitHub API call.
///
/// See: https://docs.github.com/en/rest/issues/issues?apiVersion=2022-11-28#create-an-issue
#[derive(Debug, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub html_url: Url,
}

/// A struct that can be used to partially deserialize a pull request, shared
/// by the create and list GitHub API calls.
///
/// See: https://docs.github.com/en/rest/pulls/pulls?apiVersion=2022-11-28
#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: Url,
    pub head: BranchRef,
    pub base: BranchRef,
    pub user: Account,
    pub created_at: DateTime<Utc>,
}

/// One end of a pull request (`head` or `base`).
#[derive(Debug, Serialize, Deserialize)]
pub struct BranchRef {
    pub r#ref: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

/// A struct that can be used to partially deserialize the response from the
/// create-an-issue-comment GitHub API call.
///
/// See: https://docs.github.com/en/rest/issues/comments?apiVersion=2022-11-28#create-an-issue-comment
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueComment {
    pub html_url: Url,
}

/// Create an issue with a title, body, and labels.
///
/// See: https://docs.github.com/en/rest/issues/issues?apiVersion=2022-11-28#create-an-issue
pub async fn create_issue(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    title: &str,
    body: &str,
    labels: &[String],
) -> Result<ApiOutcome<Issue>> {
    let route = format!("/repos/{owner}/{repo}/issues");
    let payload = serde_json::json!({ "title": title, "body": body, "labels": labels });

    debug!("POST {route}");
    let resp = octocrab._post(route, Some(&payload)).await?;
    read_response(resp).await
}

/// Open a pull request from `head` into `base`.
///
/// See: https://docs.github.com/en/rest/pulls/pulls?apiVersion=2022-11-28#create-a-pull-request
pub async fn create_pull_request(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    title: &str,
    body: &str,
    head: &str,
    base: &str,
) -> Result<ApiOutcome<PullRequest>> {
    let route = format!("/repos/{owner}/{repo}/pulls");
    let payload = serde_json::json!({ "title": title, "body": body, "head": head, "base": base });

    debug!("POST {route}");
    let resp = octocrab._post(route, Some(&payload)).await?;
    read_response(resp).await
}

/// List pull requests filtered by state (`open`, `closed`, or `all`).
///
/// See: https://docs.github.com/en/rest/pulls/pulls?apiVersion=2022-11-28#list-pull-requests
pub async fn list_pull_requests(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    state: &str,
) -> Result<ApiOutcome<Vec<PullRequest>>> {
    let route = format!("/repos/{owner}/{repo}/pulls?state={state}");

    debug!("GET {route}");
    let resp = octocrab._get(route).await?;
    read_response(resp).await
}

/// Add a comment to an existing issue.
///
/// See: https://docs.github.com/en/rest/issues/comments?apiVersion=2022-11-28#create-an-issue-comment
pub async fn comment_on_issue(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    issue_number: u64,
    body: &str,
) -> Result<ApiOutcome<IssueComment>> {
    let route = format!("/repos/{owner}/{repo}/issues/{issue_number}/comments");
    let payload = serde_json::json!({ "body": body });

    debug!("POST {route}");
    let resp = octocrab._post(route, Some(&payload)).await?;
    read_response(resp).await
}

/// Collect the response body, then either deserialize it (2xx) or hand back
/// the status code and raw body so the caller can report the failure.
async fn read_response<T, B>(resp: http::Response<B>) -> Result<ApiOutcome<T>>
where
    T: serde::de::DeserializeOwned,
    B: BodyExt,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let status = resp.status();
    let bytes = resp.into_body().collect().await?.to_bytes();
    let body = String::from_utf8(bytes.to_vec())?;

    if status.is_success() {
        let payload = serde_json::from_str(&body)
            .with_context(|| format!("unexpected response body: {body}"))?;
        Ok(ApiOutcome::Success(payload))
    } else {
        debug!("HTTP {status}: {body}");
        Ok(ApiOutcome::Failure { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn init() {
        env_logger::builder()
            .target(env_logger::Target::Stdout)
            .try_init()
            .unwrap_or_default();
    }

    fn stub_client(server: &ServerGuard) -> Octocrab {
        OctocrabBuilder::default()
            .personal_token("test-token".to_string())
            .base_uri(server.url())
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_issue_success() {
        init();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/bluefishforsale/homelab/issues")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "title": "Add VLAN for IoT devices",
                "labels": ["network", "todo"],
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"number": 112, "state": "open",
                    "html_url": "https://github.com/bluefishforsale/homelab/issues/112"}"#,
            )
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = create_issue(
            &octocrab,
            OWNER,
            REPO,
            "Add VLAN for IoT devices",
            "Segment the IoT devices onto their own VLAN.",
            &["network".to_string(), "todo".to_string()],
        )
        .await
        .unwrap();

        mock.assert_async().await;
        match outcome {
            ApiOutcome::Success(issue) => {
                assert_eq!(issue.number, 112);
                assert_eq!(
                    issue.html_url.as_str(),
                    "https://github.com/bluefishforsale/homelab/issues/112"
                );
            }
            ApiOutcome::Failure { status, body } => panic!("unexpected failure: {status} {body}"),
        }
    }

    #[tokio::test]
    async fn test_create_issue_surfaces_status_and_body_on_error() {
        init();

        let error_body =
            r#"{"message":"Validation Failed","errors":[{"field":"title","code":"missing_field"}]}"#;
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/bluefishforsale/homelab/issues")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(error_body)
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = create_issue(&octocrab, OWNER, REPO, "title", "body", &[])
            .await
            .unwrap();

        mock.assert_async().await;
        match outcome {
            ApiOutcome::Failure { status, body } => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(body, error_body);
            }
            ApiOutcome::Success(issue) => panic!("unexpected success: {issue:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_pull_request_success() {
        init();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/bluefishforsale/homelab/pulls")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "head": "k8s-bootstrap",
                "base": "master",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"number": 42, "title": "Bootstrap k8s control plane",
                    "html_url": "https://github.com/bluefishforsale/homelab/pull/42",
                    "head": {"ref": "k8s-bootstrap"}, "base": {"ref": "master"},
                    "user": {"login": "bluefishforsale"},
                    "created_at": "2024-06-12T03:15:42Z"}"#,
            )
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = create_pull_request(
            &octocrab,
            OWNER,
            REPO,
            "Bootstrap k8s control plane",
            "Adds kubeadm bootstrap playbooks.",
            "k8s-bootstrap",
            "master",
        )
        .await
        .unwrap();

        mock.assert_async().await;
        match outcome {
            ApiOutcome::Success(pr) => {
                assert_eq!(pr.number, 42);
                assert_eq!(pr.head.r#ref, "k8s-bootstrap");
                assert_eq!(pr.base.r#ref, "master");
                assert_eq!(pr.user.login, "bluefishforsale");
            }
            ApiOutcome::Failure { status, body } => panic!("unexpected failure: {status} {body}"),
        }
    }

    #[tokio::test]
    async fn test_create_pull_request_reports_validation_failure() {
        init();

        let error_body = r#"{"message":"Validation Failed","errors":[{"message":"No commits between master and master"}]}"#;
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/bluefishforsale/homelab/pulls")
            .with_status(422)
            .with_body(error_body)
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = create_pull_request(&octocrab, OWNER, REPO, "t", "b", "master", "master")
            .await
            .unwrap();

        match outcome {
            ApiOutcome::Failure { status, body } => {
                assert_eq!(status.as_u16(), 422);
                assert!(body.contains("No commits between"));
            }
            ApiOutcome::Success(pr) => panic!("unexpected success: {pr:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_pull_requests_parses_each_entry() {
        init();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/bluefishforsale/homelab/pulls")
            .match_query(Matcher::UrlEncoded("state".into(), "open".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"number": 7, "title": "Wire up PiKVM",
                     "html_url": "https://github.com/bluefishforsale/homelab/pull/7",
                     "head": {"ref": "pikvm"}, "base": {"ref": "master"},
                     "user": {"login": "bluefishforsale"},
                     "created_at": "2024-05-01T10:00:00Z"},
                    {"number": 9, "title": "Tune zfs arc size",
                     "html_url": "https://github.com/bluefishforsale/homelab/pull/9",
                     "head": {"ref": "zfs-arc"}, "base": {"ref": "master"},
                     "user": {"login": "bluefishforsale"},
                     "created_at": "2024-05-03T18:30:11Z"}]"#,
            )
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = list_pull_requests(&octocrab, OWNER, REPO, "open")
            .await
            .unwrap();

        mock.assert_async().await;
        match outcome {
            ApiOutcome::Success(prs) => {
                assert_eq!(prs.len(), 2);
                assert_eq!(prs[0].number, 7);
                assert_eq!(prs[0].head.r#ref, "pikvm");
                assert_eq!(prs[1].title, "Tune zfs arc size");
            }
            ApiOutcome::Failure { status, body } => panic!("unexpected failure: {status} {body}"),
        }
    }

    #[tokio::test]
    async fn test_list_pull_requests_passes_state_through() {
        init();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/bluefishforsale/homelab/pulls")
            .match_query(Matcher::UrlEncoded("state".into(), "closed".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = list_pull_requests(&octocrab, OWNER, REPO, "closed")
            .await
            .unwrap();

        mock.assert_async().await;
        match outcome {
            ApiOutcome::Success(prs) => assert!(prs.is_empty()),
            ApiOutcome::Failure { status, body } => panic!("unexpected failure: {status} {body}"),
        }
    }

    #[tokio::test]
    async fn test_comment_on_issue_success() {
        init();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/bluefishforsale/homelab/issues/112/comments")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "body": "Done, closing.",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"html_url": "https://github.com/bluefishforsale/homelab/issues/112#issuecomment-77"}"#,
            )
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = comment_on_issue(&octocrab, OWNER, REPO, 112, "Done, closing.")
            .await
            .unwrap();

        mock.assert_async().await;
        match outcome {
            ApiOutcome::Success(comment) => {
                assert_eq!(
                    comment.html_url.as_str(),
                    "https://github.com/bluefishforsale/homelab/issues/112#issuecomment-77"
                );
            }
            ApiOutcome::Failure { status, body } => panic!("unexpected failure: {status} {body}"),
        }
    }

    #[tokio::test]
    async fn test_comment_on_missing_issue_reports_not_found() {
        init();

        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/bluefishforsale/homelab/issues/9999/comments")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let octocrab = stub_client(&server);
        let outcome = comment_on_issue(&octocrab, OWNER, REPO, 9999, "hello?")
            .await
            .unwrap();

        match outcome {
            ApiOutcome::Failure { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
            ApiOutcome::Success(comment) => panic!("unexpected success: {comment:?}"),
        }
    }
}
