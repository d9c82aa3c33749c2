//! GitHub-backed content store.
//!
//! Notes live at `<content_dir>/<slug>.md` on one branch. The git blob SHA of
//! a file is its revision marker: the contents API only accepts an update
//! when the caller passes the SHA of the blob being replaced, which gives us
//! compare-and-swap for free.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::{stream, StreamExt, TryStreamExt};
use notepress_core::config::GitHubConfig;
use notepress_notes::{Note, Slug};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::store::ContentStore;
use crate::types::{NoteSummary, RevisionMarker, StoredNote};

const USER_AGENT: &str = concat!("notepress/", env!("CARGO_PKG_VERSION"));
/// Parallel blob fetches while listing.
const LIST_FETCH_CONCURRENCY: usize = 8;

pub struct GitHubStore {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    branch: String,
    token: String,
    content_dir: String,
}

impl GitHubStore {
    pub fn new(cfg: &GitHubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            owner: cfg.owner.clone(),
            repo: cfg.repo.clone(),
            branch: cfg.branch.clone(),
            token: cfg.token.clone(),
            content_dir: cfg.content_dir.trim_matches('/').to_string(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, tail
        )
    }

    fn path_for(&self, slug: &Slug) -> String {
        if self.content_dir.is_empty() {
            format!("{slug}.md")
        } else {
            format!("{}/{slug}.md", self.content_dir)
        }
    }

    /// Inverse of [`path_for`](Self::path_for); `None` for files outside the
    /// content directory or whose name is not a valid slug.
    fn slug_for(&self, path: &str) -> Option<Slug> {
        let rel = if self.content_dir.is_empty() {
            path
        } else {
            path.strip_prefix(&self.content_dir)?.strip_prefix('/')?
        };
        let stem = rel.strip_suffix(".md")?;
        match Slug::new(stem) {
            Ok(slug) => Some(slug),
            Err(e) => {
                debug!(%path, error = %e, "ignoring file with non-slug name");
                None
            }
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
    }

    async fn fetch_blob(&self, sha: &str) -> Result<String> {
        let url = self.repo_url(&format!("git/blobs/{sha}"));
        let resp = self.get(&url).send().await.map_err(transport)?;
        let resp = check(resp).await?;
        let blob: ApiBlob = resp.json().await.map_err(transport)?;
        decode_content(&blob.content, &blob.encoding)
    }

    /// Fetch and parse one listed file. Fetch errors fail the listing;
    /// a file that does not parse as a note is skipped.
    async fn summarize(&self, slug: Slug, sha: String) -> Result<Option<NoteSummary>> {
        let content = self.fetch_blob(&sha).await?;
        match Note::parse(slug.clone(), &content) {
            Ok(note) => Ok(Some(NoteSummary {
                slug,
                frontmatter: note.frontmatter,
                revision: RevisionMarker::new(sha),
            })),
            Err(e) => {
                warn!(%slug, error = %e, "skipping unparseable note");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ContentStore for GitHubStore {
    fn name(&self) -> &str {
        "github"
    }

    async fn list_all(&self) -> Result<Vec<NoteSummary>> {
        let url = self.repo_url(&format!("git/trees/{}?recursive=1", self.branch));
        let resp = self.get(&url).send().await.map_err(transport)?;
        let tree: ApiTree = check(resp).await?.json().await.map_err(transport)?;
        if tree.truncated {
            return Err(StoreError::Api {
                status: 200,
                message: format!("git tree listing for {} is truncated", self.repo),
            });
        }

        let files: Vec<(Slug, String)> = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .filter_map(|entry| self.slug_for(&entry.path).map(|slug| (slug, entry.sha)))
            .collect();
        debug!(count = files.len(), "note files in tree");

        let summaries: Vec<Option<NoteSummary>> = stream::iter(files)
            .map(|(slug, sha)| self.summarize(slug, sha))
            .buffer_unordered(LIST_FETCH_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(summaries.into_iter().flatten().collect())
    }

    async fn read(&self, slug: &Slug) -> Result<StoredNote> {
        let path = self.path_for(slug);
        let url = self.repo_url(&format!("contents/{path}"));
        let resp = self
            .get(&url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                slug: slug.to_string(),
            });
        }
        let file: ApiFile = check(resp).await?.json().await.map_err(transport)?;

        // Files over 1 MB come back without inline content.
        let content = if file.encoding == "none" || file.content.is_empty() {
            self.fetch_blob(&file.sha).await?
        } else {
            decode_content(&file.content, &file.encoding)?
        };

        let note = Note::parse(slug.clone(), &content).map_err(|e| StoreError::Malformed {
            slug: slug.to_string(),
            reason: e.to_string(),
        })?;
        Ok(StoredNote {
            note,
            revision: RevisionMarker::new(file.sha),
        })
    }

    async fn commit(
        &self,
        slug: &Slug,
        note: &Note,
        expected: &RevisionMarker,
        message: &str,
    ) -> Result<RevisionMarker> {
        let rendered = note.render().map_err(|e| StoreError::Malformed {
            slug: slug.to_string(),
            reason: e.to_string(),
        })?;
        let path = self.path_for(slug);
        let url = self.repo_url(&format!("contents/{path}"));
        let body = PutFile {
            message,
            content: STANDARD.encode(rendered.as_bytes()),
            sha: expected.as_str(),
            branch: &self.branch,
        };

        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(conflict(slug, expected));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                slug: slug.to_string(),
            });
        }
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let text = resp.text().await.unwrap_or_default();
            if text.contains("sha") {
                return Err(conflict(slug, expected));
            }
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let written: PutFileResponse = check(resp).await?.json().await.map_err(transport)?;
        info!(%slug, revision = %written.content.sha, commit = %written.commit.sha, "note committed");
        Ok(RevisionMarker::new(written.content.sha))
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiTree {
    tree: Vec<ApiTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct ApiTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Deserialize)]
struct ApiBlob {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct ApiFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Serialize)]
struct PutFile<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct PutFileResponse {
    content: ShaOnly,
    commit: ShaOnly,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

// ── Error mapping ─────────────────────────────────────────────────────────────

fn transport(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::Api {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: format!("unexpected response body: {e}"),
        }
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

fn conflict(slug: &Slug, expected: &RevisionMarker) -> StoreError {
    StoreError::VersionConflict {
        slug: slug.to_string(),
        expected: expected.to_string(),
    }
}

/// Pass successful responses through; classify everything else.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(classify(status.as_u16(), text))
}

fn classify(status: u16, message: String) -> StoreError {
    match status {
        429 | 500..=599 => StoreError::Unavailable(format!("GitHub returned {status}: {message}")),
        _ => StoreError::Api { status, message },
    }
}

fn decode_content(content: &str, encoding: &str) -> Result<String> {
    match encoding {
        "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD.decode(compact).map_err(|e| StoreError::Api {
                status: 200,
                message: format!("invalid base64 content: {e}"),
            })?;
            String::from_utf8(bytes).map_err(|e| StoreError::Api {
                status: 200,
                message: format!("note is not UTF-8: {e}"),
            })
        }
        "utf-8" | "" => Ok(content.to_string()),
        other => Err(StoreError::Api {
            status: 200,
            message: format!("unsupported content encoding {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(content_dir: &str) -> GitHubStore {
        GitHubStore::new(&GitHubConfig {
            owner: "acme".to_string(),
            repo: "site".to_string(),
            branch: "main".to_string(),
            token: "t".to_string(),
            content_dir: content_dir.to_string(),
            api_base: "https://api.github.com/".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn paths_and_slugs_are_inverse() {
        let s = store("/content/notes/");
        let slug = Slug::new("2024/03/hello").unwrap();
        let path = s.path_for(&slug);
        assert_eq!(path, "content/notes/2024/03/hello.md");
        assert_eq!(s.slug_for(&path), Some(slug));
    }

    #[test]
    fn slug_for_ignores_foreign_files() {
        let s = store("content/notes");
        assert_eq!(s.slug_for("README.md"), None);
        assert_eq!(s.slug_for("content/notes/2024/03/hello.txt"), None);
        assert_eq!(s.slug_for("content/notesx/hello.md"), None);
        assert_eq!(s.slug_for("content/notes/Bad Name.md"), None);
    }

    #[test]
    fn empty_content_dir_uses_repo_root() {
        let s = store("");
        let slug = Slug::new("hello").unwrap();
        assert_eq!(s.path_for(&slug), "hello.md");
        assert_eq!(s.slug_for("hello.md"), Some(slug));
    }

    #[test]
    fn repo_url_trims_trailing_slash() {
        let s = store("notes");
        assert_eq!(
            s.repo_url("git/trees/main"),
            "https://api.github.com/repos/acme/site/git/trees/main"
        );
    }

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = "LS0tCnRp\ndGxlOiB4\nCi0tLQo=";
        assert_eq!(decode_content(encoded, "base64").unwrap(), "---\ntitle: x\n---\n");
    }

    #[test]
    fn classifies_status_codes() {
        assert!(classify(503, String::new()).is_transient());
        assert!(classify(429, String::new()).is_transient());
        assert!(matches!(
            classify(401, "Bad credentials".to_string()),
            StoreError::Api { status: 401, .. }
        ));
    }

    // ── Against a local stand-in for the GitHub API ─────────────────────────

    use axum::{
        http::StatusCode,
        routing::{get, put},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    const HELLO: &str = "---\ntitle: Hello\ndate: 2024-03-01T00:00:00Z\nstatus: scheduled\nscheduledFor: 2024-03-01T00:00:00Z\n---\n\nhi\n";
    const TREE: &str = "/repos/acme/site/git/trees/{branch}";
    const BLOB: &str = "/repos/acme/site/git/blobs/{sha}";
    const CONTENTS: &str = "/repos/acme/site/contents/{*path}";

    async fn serve(router: Router) -> GitHubStore {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        GitHubStore::new(&GitHubConfig {
            owner: "acme".to_string(),
            repo: "site".to_string(),
            branch: "main".to_string(),
            token: "t".to_string(),
            content_dir: "content/notes".to_string(),
            api_base: format!("http://{addr}"),
        })
        .unwrap()
    }

    fn tree(entries: &[(&str, &str)], truncated: bool) -> Value {
        let entries: Vec<Value> = entries
            .iter()
            .map(|(path, sha)| json!({"path": path, "type": "blob", "sha": sha}))
            .collect();
        json!({"tree": entries, "truncated": truncated})
    }

    fn blob(content: &str) -> Value {
        json!({"content": STANDARD.encode(content), "encoding": "base64"})
    }

    fn hello_slug() -> Slug {
        Slug::new("hello").unwrap()
    }

    fn hello_note() -> Note {
        Note::parse(hello_slug(), HELLO).unwrap()
    }

    #[tokio::test]
    async fn list_all_parses_notes_and_skips_unparseable_files() {
        let listing = tree(
            &[
                ("content/notes/hello.md", "abc"),
                ("content/notes/broken.md", "bad"),
                ("README.md", "readme"),
            ],
            false,
        );
        let router = Router::new()
            .route(TREE, get(move || async move { Json(listing) }))
            .route(
                BLOB,
                get(|axum::extract::Path(sha): axum::extract::Path<String>| async move {
                    match sha.as_str() {
                        "abc" => Json(blob(HELLO)),
                        _ => Json(blob("no frontmatter here")),
                    }
                }),
            );
        let store = serve(router).await;

        let notes = store.list_all().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].slug, hello_slug());
        assert_eq!(notes[0].revision.as_str(), "abc");
        assert_eq!(notes[0].frontmatter.title, "Hello");
    }

    #[tokio::test]
    async fn list_all_fails_when_a_blob_is_unavailable() {
        let listing = tree(&[("content/notes/hello.md", "abc")], false);
        let router = Router::new()
            .route(TREE, get(move || async move { Json(listing) }))
            .route(
                BLOB,
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try again later") }),
            );
        let store = serve(router).await;

        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_all_fails_when_rate_limited() {
        let router = Router::new().route(
            TREE,
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded") }),
        );
        let store = serve(router).await;

        let err = store.list_all().await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn list_all_rejects_truncated_tree() {
        let listing = tree(&[("content/notes/hello.md", "abc")], true);
        let router = Router::new()
            .route(TREE, get(move || async move { Json(listing) }))
            .route(BLOB, get(|| async { Json(blob(HELLO)) }));
        let store = serve(router).await;

        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Api { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn read_decodes_contents_with_revision() {
        let router = Router::new().route(
            CONTENTS,
            get(|axum::extract::Path(path): axum::extract::Path<String>| async move {
                if path.ends_with("content/notes/hello.md") {
                    let mut file = blob(HELLO);
                    file["sha"] = json!("abc");
                    (StatusCode::OK, Json(file))
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})))
                }
            }),
        );
        let store = serve(router).await;

        let stored = store.read(&hello_slug()).await.unwrap();
        assert_eq!(stored.revision.as_str(), "abc");
        assert_eq!(stored.note, hello_note());
    }

    #[tokio::test]
    async fn read_maps_missing_file_and_outage() {
        let router = Router::new().route(
            CONTENTS,
            get(|axum::extract::Path(path): axum::extract::Path<String>| async move {
                if path.ends_with("gone.md") {
                    (StatusCode::NOT_FOUND, "Not Found")
                } else {
                    (StatusCode::BAD_GATEWAY, "upstream down")
                }
            }),
        );
        let store = serve(router).await;

        let err = store.read(&Slug::new("gone").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }), "got {err:?}");
        let err = store.read(&hello_slug()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
    }

    async fn commit_answered_with(status: StatusCode, body: &'static str) -> Result<RevisionMarker> {
        let router = Router::new().route(CONTENTS, put(move || async move { (status, body) }));
        let store = serve(router).await;
        store
            .commit(&hello_slug(), &hello_note(), &RevisionMarker::new("old"), "Publish: Hello")
            .await
    }

    #[tokio::test]
    async fn commit_sends_expected_revision_and_returns_new_one() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            CONTENTS,
            put(move |Json(body): Json<Value>| async move {
                *captured.lock().unwrap() = Some(body);
                Json(json!({"content": {"sha": "new"}, "commit": {"sha": "c1"}}))
            }),
        );
        let store = serve(router).await;

        let revision = store
            .commit(&hello_slug(), &hello_note(), &RevisionMarker::new("old"), "Publish: Hello")
            .await
            .unwrap();
        assert_eq!(revision.as_str(), "new");

        let body = seen.lock().unwrap().take().unwrap();
        assert_eq!(body["sha"], "old");
        assert_eq!(body["branch"], "main");
        assert_eq!(body["message"], "Publish: Hello");
        let sent = decode_content(body["content"].as_str().unwrap(), "base64").unwrap();
        assert_eq!(Note::parse(hello_slug(), &sent).unwrap(), hello_note());
    }

    #[tokio::test]
    async fn commit_maps_stale_revision_to_conflict() {
        let err = commit_answered_with(StatusCode::CONFLICT, "{\"message\":\"conflict\"}")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }), "got {err:?}");

        let err = commit_answered_with(
            StatusCode::UNPROCESSABLE_ENTITY,
            "{\"message\":\"Invalid request. \\\"sha\\\" wasn't supplied.\"}",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn commit_maps_other_failures() {
        let err = commit_answered_with(StatusCode::NOT_FOUND, "Not Found")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }), "got {err:?}");

        let err = commit_answered_with(StatusCode::SERVICE_UNAVAILABLE, "down")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");

        let err = commit_answered_with(StatusCode::UNPROCESSABLE_ENTITY, "path is invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 422, .. }), "got {err:?}");
    }
}
