//! In-process stand-in for the image server.
//!
//! Serves the four endpoints the load test exercises with canned
//! responses and counts the requests it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Multipart, State};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Canned responses for each endpoint.
#[derive(Debug, Clone)]
pub struct StubBehavior {
    pub upload_status: u16,
    pub page_status: u16,
    pub page_body: String,
    pub search_status: u16,
    pub search_body: String,
    pub download_status: u16,
    pub download_body: Vec<u8>,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            upload_status: 200,
            page_status: 200,
            page_body: "<html><title>UiFrontend</title></html>".to_string(),
            search_status: 200,
            search_body: r#"["/download/thumbnail_a.jpg","/download/thumbnail_b.png"]"#
                .to_string(),
            download_status: 200,
            download_body: b"image-bytes".to_vec(),
        }
    }
}

/// What the stub has seen so far.
#[derive(Debug, Default)]
pub struct StubHits {
    pub upload: AtomicUsize,
    pub page: AtomicUsize,
    pub search: AtomicUsize,
    pub download: AtomicUsize,
    pub upload_fields: Mutex<Vec<String>>,
    pub keywords: Mutex<Vec<String>>,
    pub download_paths: Mutex<Vec<String>>,
}

impl StubHits {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        Self::count(&self.upload)
            + Self::count(&self.page)
            + Self::count(&self.search)
            + Self::count(&self.download)
    }
}

struct Shared {
    behavior: StubBehavior,
    hits: Arc<StubHits>,
}

/// A running stub server bound to an ephemeral localhost port.
pub struct StubTarget {
    addr: SocketAddr,
    hits: Arc<StubHits>,
    handle: JoinHandle<()>,
}

impl StubTarget {
    /// Start a stub with the given behavior.
    pub async fn spawn(behavior: StubBehavior) -> Self {
        let hits = Arc::new(StubHits::default());
        let shared = Arc::new(Shared {
            behavior,
            hits: hits.clone(),
        });

        let app = Router::new()
            .route("/", get(page))
            .route("/upload", post(upload))
            .route("/search", post(search))
            .route("/download/*path", get(download))
            .with_state(shared);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub listener");
        let addr = listener.local_addr().expect("Stub listener has no address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, hits, handle }
    }

    /// `host:port`, as passed to `target_host`.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> &StubHits {
        &self.hits
    }
}

impl Drop for StubTarget {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn page(State(shared): State<Arc<Shared>>) -> impl IntoResponse {
    shared.hits.page.fetch_add(1, Ordering::SeqCst);
    (
        status(shared.behavior.page_status),
        shared.behavior.page_body.clone(),
    )
}

async fn upload(State(shared): State<Arc<Shared>>, mut multipart: Multipart) -> impl IntoResponse {
    shared.hits.upload.fetch_add(1, Ordering::SeqCst);
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let value = if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            format!("{} ({} bytes)", file_name, len)
        } else {
            field.text().await.unwrap_or_default()
        };
        fields.push(format!("{}={}", name, value));
    }
    if let Ok(mut seen) = shared.hits.upload_fields.lock() {
        seen.extend(fields);
    }
    status(shared.behavior.upload_status)
}

async fn search(
    State(shared): State<Arc<Shared>>,
    Form(params): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    shared.hits.search.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut keywords) = shared.hits.keywords.lock() {
        keywords.push(params.get("keyword").cloned().unwrap_or_default());
    }
    (
        status(shared.behavior.search_status),
        shared.behavior.search_body.clone(),
    )
}

async fn download(State(shared): State<Arc<Shared>>, uri: Uri) -> impl IntoResponse {
    shared.hits.download.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut paths) = shared.hits.download_paths.lock() {
        paths.push(uri.path().to_string());
    }
    (
        status(shared.behavior.download_status),
        shared.behavior.download_body.clone(),
    )
}
