//! Submission integration tests.
//!
//! The orchestrator runs against a scripted [`Uploader`]; the reqwest
//! uploader runs against a one-shot HTTP listener on localhost so the wire
//! format (multipart field `files`, filenames, content types) is checked
//! without a real conversion server.
//!
//! Run with:
//!   cargo test --test submit

use async_trait::async_trait;
use edgequake_deckdrop::{
    AllowList, CandidateFile, ClientConfig, DeckDropError, HttpUploader, NoopObserver,
    Orchestrator, Selection, SessionObserver, Status, SubmitState, UploadResponse, Uploader,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replays one canned result and records what it was asked to send.
struct Scripted {
    result: Mutex<Option<Result<UploadResponse, DeckDropError>>>,
    sent: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(result: Result<UploadResponse, DeckDropError>) -> Self {
        Self {
            result: Mutex::new(Some(result)),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn ok(status: u16, disposition: Option<&str>, body: &[u8]) -> Self {
        Self::new(Ok(UploadResponse {
            status,
            status_text: if status < 300 { "OK" } else { "Bad Request" }.into(),
            content_disposition: disposition.map(str::to_string),
            body: body.to_vec(),
        }))
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for Scripted {
    async fn upload(&self, files: &[CandidateFile]) -> Result<UploadResponse, DeckDropError> {
        self.sent
            .lock()
            .unwrap()
            .extend(files.iter().map(|f| f.name().to_string()));
        self.result
            .lock()
            .unwrap()
            .take()
            .expect("uploader called more than once")
    }
}

#[derive(Default)]
struct Statuses(Mutex<Vec<Status>>);

impl SessionObserver for Statuses {
    fn on_status(&self, status: &Status) {
        self.0.lock().unwrap().push(status.clone());
    }
}

impl Statuses {
    fn last(&self) -> Status {
        self.0.lock().unwrap().last().cloned().expect("no status")
    }
}

fn selection(files: &[(&str, &str, &str)]) -> Selection {
    let mut sel = Selection::new();
    sel.add_batch(
        files
            .iter()
            .map(|(name, ty, bytes)| CandidateFile::from_bytes(*name, *ty, bytes.as_bytes().to_vec()))
            .collect(),
        &AllowList::default(),
    );
    sel
}

fn config(out: &TempDir) -> ClientConfig {
    ClientConfig::builder()
        .output_dir(out.path())
        .build()
        .unwrap()
}

// ── Orchestrator properties ──────────────────────────────────────────────────

#[tokio::test]
async fn test_success_saves_suggested_name_and_clears() {
    let out = TempDir::new().unwrap();
    let config = config(&out);
    let mut sel = selection(&[("a.png", "image/png", "aa"), ("b.pdf", "", "bb")]);
    let uploader = Scripted::ok(200, Some(r#"attachment; filename="deck.pptx""#), b"PPTX");
    let statuses = Statuses::default();

    let state = Orchestrator::new()
        .submit(&uploader, &mut sel, &config, &statuses)
        .await;

    assert_eq!(state, SubmitState::Succeeded);
    assert!(sel.is_empty());
    assert_eq!(uploader.sent(), vec!["a.png", "b.pdf"]);
    assert_eq!(std::fs::read(out.path().join("deck.pptx")).unwrap(), b"PPTX");

    let all = statuses.0.lock().unwrap().clone();
    assert_eq!(all[0].message, "Sending 2 file(s) for processing…");
    assert!(all[1].message.starts_with("Presentation created and saved to"));
    assert!(all[1].message.contains("deck.pptx"));
}

#[tokio::test]
async fn test_missing_disposition_falls_back_to_default_name() {
    let out = TempDir::new().unwrap();
    let config = config(&out);
    let mut sel = selection(&[("a.png", "image/png", "aa")]);

    let state = Orchestrator::new()
        .submit(&Scripted::ok(200, None, b"PPTX"), &mut sel, &config, &NoopObserver)
        .await;

    assert_eq!(state, SubmitState::Succeeded);
    assert!(out.path().join("presentation.pptx").exists());
}

#[tokio::test]
async fn test_hostile_filename_stays_in_output_dir() {
    let out = TempDir::new().unwrap();
    let config = config(&out);
    let mut sel = selection(&[("a.png", "image/png", "aa")]);
    let uploader = Scripted::ok(200, Some(r#"attachment; filename="../../evil.pptx""#), b"X");

    Orchestrator::new()
        .submit(&uploader, &mut sel, &config, &NoopObserver)
        .await;

    assert!(out.path().join("evil.pptx").exists());
}

#[tokio::test]
async fn test_server_error_keeps_selection() {
    let out = TempDir::new().unwrap();
    let config = config(&out);
    let mut sel = selection(&[("a.png", "image/png", "aa"), ("c.jpg", "image/jpeg", "c")]);
    let statuses = Statuses::default();

    let state = Orchestrator::new()
        .submit(
            &Scripted::ok(400, None, br#"{"error":"bad file"}"#),
            &mut sel,
            &config,
            &statuses,
        )
        .await;

    assert_eq!(state, SubmitState::Failed);
    assert_eq!(sel.len(), 2);
    let last = statuses.last();
    assert!(last.is_error());
    assert!(last.message.contains("bad file"));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_network_error_is_generic_and_keeps_selection() {
    let out = TempDir::new().unwrap();
    let config = config(&out);
    let mut sel = selection(&[("a.png", "image/png", "aa")]);
    let statuses = Statuses::default();
    let uploader = Scripted::new(Err(DeckDropError::NetworkFailure {
        endpoint: config.endpoint.clone(),
        reason: "connection refused".into(),
    }));

    let state = Orchestrator::new()
        .submit(&uploader, &mut sel, &config, &statuses)
        .await;

    assert_eq!(state, SubmitState::Failed);
    assert_eq!(sel.len(), 1);
    let last = statuses.last();
    assert!(last.message.starts_with("A network or client error occurred."));
    assert!(!last.message.contains("connection refused"));
}

#[tokio::test]
async fn test_unwritable_output_is_a_failure() {
    let out = TempDir::new().unwrap();
    let blocker = out.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let config = ClientConfig::builder().output_dir(&blocker).build().unwrap();
    let mut sel = selection(&[("a.png", "image/png", "aa")]);
    let statuses = Statuses::default();

    let state = Orchestrator::new()
        .submit(&Scripted::ok(200, None, b"PPTX"), &mut sel, &config, &statuses)
        .await;

    assert_eq!(state, SubmitState::Failed);
    assert_eq!(sel.len(), 1, "selection kept so the user can retry");
    assert!(statuses.last().message.starts_with("Could not save the result"));
}

#[tokio::test]
async fn test_empty_selection_never_calls_uploader() {
    let out = TempDir::new().unwrap();
    let mut sel = Selection::new();
    let uploader = Scripted::ok(200, None, b"");
    let statuses = Statuses::default();

    let state = Orchestrator::new()
        .submit(&uploader, &mut sel, &config(&out), &statuses)
        .await;

    assert_eq!(state, SubmitState::Idle);
    assert!(uploader.sent().is_empty());
    assert_eq!(statuses.last().message, "Please select files first.");
}

// ── HTTP uploader ────────────────────────────────────────────────────────────

/// Accept one connection, capture the raw request, answer with `response`.
async fn one_shot_server(response: Vec<u8>) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/upload", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }
        socket.write_all(&response).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (url, handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let headers = text[..header_end].to_ascii_lowercase();
    let body_len = request.len() - (header_end + 4);
    match headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        Some(len) => body_len >= len,
        None => text.ends_with("0\r\n\r\n"),
    }
}

fn http_response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n", body.len());
    for (k, v) in headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

#[tokio::test]
async fn test_http_uploader_sends_files_field() {
    let (url, server) = one_shot_server(http_response(
        "200 OK",
        &[
            ("Content-Type", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
            ("Content-Disposition", r#"attachment; filename="result.pptx""#),
        ],
        b"PPTX-BYTES",
    ))
    .await;

    let config = ClientConfig::builder().endpoint(url).build().unwrap();
    let uploader = HttpUploader::new(&config).unwrap();
    let files = vec![
        CandidateFile::from_bytes("one.png", "image/png", b"PNGDATA".to_vec()),
        CandidateFile::from_bytes("two.pdf", "", b"%PDF".to_vec()),
    ];

    let response = uploader.upload(&files).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"PPTX-BYTES");
    assert_eq!(
        response.content_disposition.as_deref(),
        Some(r#"attachment; filename="result.pptx""#)
    );

    let request = String::from_utf8_lossy(&server.await.unwrap()).into_owned();
    assert!(request.starts_with("POST /upload "));
    assert!(request.to_ascii_lowercase().contains("content-type: multipart/form-data; boundary="));
    assert_eq!(request.matches(r#"name="files""#).count(), 2);
    assert!(request.contains(r#"filename="one.png""#));
    assert!(request.contains(r#"filename="two.pdf""#));
    assert!(request.contains("Content-Type: image/png"));
    assert!(request.contains("Content-Type: application/octet-stream"));
    assert!(request.contains("PNGDATA"));
}

#[tokio::test]
async fn test_http_uploader_streams_files_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scan.jpg");
    std::fs::write(&path, b"JPEG-ON-DISK").unwrap();
    let picked = edgequake_deckdrop::pick_paths(&[&path]).await;
    assert_eq!(picked.len(), 1);

    let (url, server) = one_shot_server(http_response("200 OK", &[], b"PPTX")).await;
    let config = ClientConfig::builder().endpoint(url).build().unwrap();
    let response = HttpUploader::new(&config).unwrap().upload(&picked).await.unwrap();
    assert!(response.is_success());

    let request = String::from_utf8_lossy(&server.await.unwrap()).into_owned();
    assert!(request.to_ascii_lowercase().contains("content-length:"));
    assert!(request.contains(r#"filename="scan.jpg""#));
    assert!(request.contains("Content-Type: image/jpeg"));
    assert!(request.contains("JPEG-ON-DISK"));
}

#[tokio::test]
async fn test_http_uploader_returns_error_status_as_response() {
    let (url, _server) = one_shot_server(http_response(
        "400 Bad Request",
        &[("Content-Type", "application/json")],
        br#"{"error":"No files uploaded"}"#,
    ))
    .await;

    let config = ClientConfig::builder().endpoint(url).build().unwrap();
    let response = HttpUploader::new(&config)
        .unwrap()
        .upload(&[CandidateFile::from_bytes("a.png", "image/png", vec![1])])
        .await
        .unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(response.status_text, "Bad Request");
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_http_uploader_unreachable_endpoint_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::builder()
        .endpoint(format!("http://{addr}/upload"))
        .build()
        .unwrap();
    let err = HttpUploader::new(&config)
        .unwrap()
        .upload(&[CandidateFile::from_bytes("a.png", "image/png", vec![1])])
        .await
        .unwrap_err();
    assert!(err.is_network(), "got {err:?}");
}

#[tokio::test]
async fn test_http_uploader_missing_file_is_content_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.png");
    let files = vec![CandidateFile::new(
        "gone.png",
        10,
        "image/png",
        edgequake_deckdrop::FileContent::OnDisk(path),
    )];

    let config = ClientConfig::default();
    let err = HttpUploader::new(&config).unwrap().upload(&files).await.unwrap_err();
    assert!(matches!(err, DeckDropError::ContentUnavailable { ref name, .. } if name == "gone.png"));
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let out = TempDir::new().unwrap();
    let (url, _server) = one_shot_server(http_response(
        "200 OK",
        &[("Content-Disposition", "attachment; filename*=UTF-8''Q3%20review.pptx")],
        b"DECK",
    ))
    .await;

    let config = ClientConfig::builder()
        .endpoint(url)
        .output_dir(out.path())
        .build()
        .unwrap();
    let uploader: Arc<dyn Uploader> = Arc::new(HttpUploader::new(&config).unwrap());
    let mut sel = selection(&[("chart.png", "image/png", "c")]);

    let state = Orchestrator::new()
        .submit(uploader.as_ref(), &mut sel, &config, &NoopObserver)
        .await;

    assert_eq!(state, SubmitState::Succeeded);
    assert_eq!(std::fs::read(out.path().join("Q3 review.pptx")).unwrap(), b"DECK");
}
