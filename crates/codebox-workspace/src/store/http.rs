//! Save service client.
//!
//! - `GET  /initialise?replId=..&language=..` -> `{files: [...]}`
//! - `POST /change` with `{replId, files: [{path, content}]}`
//!
//! The service has no listing route, so `list_top` is unsupported.

use std::time::Duration;

use async_trait::async_trait;
use codebox_common::{FileNode, SessionId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DurableStore, FileChange, StoreError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest error body kept in a [`StoreError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Vec<FileNode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRequest<'a> {
    repl_id: &'a str,
    files: &'a [FileChange],
}

pub struct HttpDurableStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDurableStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }
}

fn send_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Unreachable(e.to_string())
    }
}

/// Turn a non-success response into a [`StoreError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body = text.chars().take(ERROR_BODY_LIMIT).collect::<String>();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode_files(response: reqwest::Response) -> Result<Vec<FileNode>, StoreError> {
    let parsed: FilesResponse = response
        .json()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(parsed.files)
}

#[async_trait]
impl DurableStore for HttpDurableStore {
    async fn fetch_base(
        &self,
        session: &SessionId,
        language: &str,
    ) -> Result<Vec<FileNode>, StoreError> {
        debug!(session = %session, language, "store initialise request");

        let response = self
            .http
            .get(self.url("initialise"))
            .query(&[("replId", session.as_str()), ("language", language)])
            .send()
            .await
            .map_err(send_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::UnknownTemplate(language.to_string()));
        }
        let files = decode_files(check_status(response).await?).await?;
        if files.is_empty() {
            // An empty template prefix is indistinguishable from a missing one.
            return Err(StoreError::UnknownTemplate(language.to_string()));
        }
        Ok(files)
    }

    async fn persist(&self, session: &SessionId, files: &[FileChange]) -> Result<(), StoreError> {
        debug!(session = %session, count = files.len(), "store change request");

        let body = ChangeRequest {
            repl_id: session.as_str(),
            files,
        };
        let response = self
            .http
            .post(self.url("change"))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_top(&self, _session: &SessionId) -> Result<Vec<FileNode>, StoreError> {
        Err(StoreError::Unsupported("listing"))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    /// A request as seen by the mock save service.
    #[derive(Debug)]
    struct Seen {
        method: String,
        url: String,
        body: String,
    }

    /// Start a mock save service answering every request with `status` and
    /// `body`. Requests are reported on the returned receiver.
    fn mock_service(status: u16, body: &'static str) -> (String, mpsc::Receiver<Seen>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("Failed to start test server");
        let port = server.server_addr().to_ip().unwrap().port();
        let (seen_tx, seen_rx) = mpsc::channel();

        thread::spawn(move || {
            while let Ok(mut request) = server.recv() {
                let mut req_body = String::new();
                let _ = request.as_reader().read_to_string(&mut req_body);
                let _ = seen_tx.send(Seen {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body: req_body,
                });
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"application/json"[..],
                        )
                        .unwrap(),
                    );
                let _ = request.respond(response);
            }
        });

        (format!("http://127.0.0.1:{port}/"), seen_rx)
    }

    fn store(url: &str) -> HttpDurableStore {
        HttpDurableStore::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_base_sends_query_and_parses_files() {
        let (url, seen) = mock_service(
            200,
            r#"{"message":"ok","files":[
                {"name":"main.py","type":"file","content":"print('hi')\n"},
                {"name":"lib","type":"dir"}
            ]}"#,
        );
        let files = store(&url)
            .fetch_base(&SessionId::new("r1"), "python")
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "main.py");
        assert_eq!(files[0].effective_path(), "main.py");
        assert_eq!(files[0].content.as_deref(), Some("print('hi')\n"));
        assert!(files[1].is_dir());

        let req = seen.recv().unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "/initialise?replId=r1&language=python");
    }

    #[tokio::test]
    async fn fetch_base_empty_template_is_unknown() {
        let (url, _seen) = mock_service(200, r#"{"files":[]}"#);
        let err = store(&url)
            .fetch_base(&SessionId::new("r1"), "cobol")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownTemplate(ref l) if l == "cobol"));
    }

    #[tokio::test]
    async fn fetch_base_server_error_is_status() {
        let (url, _seen) = mock_service(500, r#"{"error":"Failed to initialise REPL"}"#);
        let err = store(&url)
            .fetch_base(&SessionId::new("r1"), "python")
            .await
            .unwrap_err();
        match err {
            StoreError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("Failed to initialise"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn persist_posts_change_body() {
        let (url, seen) = mock_service(200, r#"{"message":"Changes saved successfully"}"#);
        store(&url)
            .persist(
                &SessionId::new("r9"),
                &[FileChange::new("src/main.py", "print(1)")],
            )
            .await
            .unwrap();

        let req = seen.recv().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "/change");
        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "replId": "r9",
                "files": [{"path": "src/main.py", "content": "print(1)"}]
            })
        );
    }

    #[tokio::test]
    async fn list_top_is_unsupported_without_a_request() {
        let (url, seen) = mock_service(200, r#"{"files":[]}"#);
        let err = store(&url).list_top(&SessionId::new("r1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)), "got {err:?}");
        assert!(seen.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[tokio::test]
    async fn unreachable_store() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = store(&format!("http://127.0.0.1:{port}"))
            .fetch_base(&SessionId::new("r1"), "python")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)), "got {err:?}");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let s = store("http://store.local:4000/");
        assert_eq!(s.url("change"), "http://store.local:4000/change");
    }
}
