use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use tracing::{debug, info};
use yup_oauth2::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};

use super::{Blob, BlobStore, StoreError};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com/";

/// Returns `true` if `name` is a git branch name that can be sent in a
/// query string as is.
///
/// This is stricter than git: besides the characters git forbids, it
/// rejects `&`, `#`, `%` and `+`.
pub fn is_valid_branch(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(['/', '-', '.'])
        && !name.ends_with(['/', '.'])
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && !name.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(
                    c,
                    '~' | '^' | ':' | '?' | '*' | '[' | '\\' | '&' | '#' | '%' | '+'
                )
        })
}

/// Store backed by files in a GitHub repository, using the contents API.
///
/// Every save is a commit on `branch`. The blob SHA returned by GitHub is
/// used as the version, so GitHub itself rejects writes based on a stale
/// read.
pub struct GitHubStore {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    rt: tokio::runtime::Runtime,
    api_base_url: String,
    repo: String,
    branch: String,
    token: String,
}

impl GitHubStore {
    /// Create a store for `repo` (`owner/name`) talking to `api_base_url`,
    /// usually [`DEFAULT_API_BASE_URL`].
    pub fn with_api_base_url(
        repo: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let branch = branch.into();
        if !is_valid_branch(&branch) {
            return Err(StoreError::Malformed(format!("invalid branch name {branch:?}")));
        }
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| StoreError::Unavailable(format!("tokio runtime: {e}")))?;
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| StoreError::Unavailable(format!("native roots: {e}")))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);
        let mut api_base_url = api_base_url.into();
        if !api_base_url.ends_with('/') {
            api_base_url.push('/');
        }
        Ok(Self {
            client,
            rt,
            api_base_url,
            repo: repo.into(),
            branch,
            token: token.into(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}repos/{}/contents/{}", self.api_base_url, self.repo, path)
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
    ) -> Result<Request<Full<Bytes>>, StoreError> {
        Request::builder()
            .method(method)
            .uri(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, "fuel-ledger")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn send(
        &self,
        req: Request<Full<Bytes>>,
    ) -> Result<(StatusCode, serde_json::Value), StoreError> {
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes[..]).unwrap_or(serde_json::Value::Null)
        };
        Ok((status, body))
    }
}

fn decode_content(body: &serde_json::Value) -> Result<Blob, StoreError> {
    let encoded: String = body["content"]
        .as_str()
        .ok_or_else(|| StoreError::Malformed("response without content".into()))?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let version = body["sha"]
        .as_str()
        .ok_or_else(|| StoreError::Malformed("response without sha".into()))?
        .to_string();
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| StoreError::Malformed(e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|e| StoreError::Malformed(e.to_string()))?;
    Ok(Blob { content, version })
}

impl BlobStore for GitHubStore {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        self.rt.block_on(async {
            // the branch was checked by `is_valid_branch`, so it needs no escaping
            let url = format!("{}?ref={}", self.contents_url(path), self.branch);
            let req = self.request(Method::GET, &url, Bytes::new())?;
            let (status, body) = self.send(req).await?;
            match status {
                StatusCode::OK => decode_content(&body).map(Some),
                StatusCode::NOT_FOUND => {
                    debug!(path, "File not found in repository");
                    Ok(None)
                }
                other => Err(StoreError::Unavailable(format!("get {path}: {other}"))),
            }
        })
    }

    fn put(
        &mut self,
        path: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        self.rt.block_on(async {
            let mut body_json = json!({
                "message": format!("Update {path}"),
                "content": BASE64.encode(content.as_bytes()),
                "branch": self.branch,
            });
            if let Some(sha) = expected_version {
                body_json["sha"] = json!(sha);
            }
            debug!(path, sha = ?expected_version, "Put contents request");
            let url = self.contents_url(path);
            let req = self.request(Method::PUT, &url, Bytes::from(body_json.to_string()))?;
            let (status, body) = self.send(req).await?;
            match status {
                StatusCode::OK | StatusCode::CREATED => {
                    let sha = body["content"]["sha"]
                        .as_str()
                        .ok_or_else(|| StoreError::Malformed("response without sha".into()))?
                        .to_string();
                    info!(path, sha, "Committed file");
                    Ok(sha)
                }
                StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(StoreError::Conflict {
                        path: path.to_string(),
                    })
                }
                other => Err(StoreError::Unavailable(format!("put {path}: {other}"))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_base64() {
        let body = json!({"content": "RGF0ZSxE\ncml2ZXI=\n", "sha": "abc"});
        let blob = decode_content(&body).unwrap();
        assert_eq!(blob.content, "Date,Driver");
        assert_eq!(blob.version, "abc");
    }

    #[test]
    fn missing_sha_is_malformed() {
        let body = json!({"content": ""});
        assert!(matches!(
            decode_content(&body),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn branch_names_that_break_the_query_are_invalid() {
        for name in ["main", "feature/fuel-log", "v1.2", "release_2024"] {
            assert!(is_valid_branch(name), "{name}");
        }
        for name in ["", "a&b", "a#b", "50%", "a b", "a..b", "/main", "main/", "x.lock"] {
            assert!(!is_valid_branch(name), "{name}");
        }
    }

    #[test]
    fn store_rejects_invalid_branch() {
        let result =
            GitHubStore::with_api_base_url("owner/car", "main&x=1", "t", DEFAULT_API_BASE_URL);
        let Err(err) = result else {
            panic!("branch was accepted");
        };
        assert!(matches!(err, StoreError::Malformed(msg) if msg.contains("main&x=1")));
    }
}
