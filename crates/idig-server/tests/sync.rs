//! End-to-end sync scenarios through the HTTP router.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use idig_server::{IdigServer, ServerConfig};

const WRITER: (&str, &str) = ("bruce", "password1");
const VIEWER: (&str, &str) = ("viewer", "viewpass");

struct TestServer {
    server: IdigServer,
    _root: tempfile::TempDir,
}

fn setup() -> TestServer {
    let root = tempfile::tempdir().unwrap();
    let project = root.path().join("Agora");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::write(
        project.join("users.txt"),
        "# test users\nbruce:password1:*\nviewer:viewpass:\n",
    )
    .unwrap();

    let server = IdigServer::new(ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        root_dir: root.path().to_path_buf(),
    });
    TestServer {
        server,
        _root: root,
    }
}

fn basic_auth(user: (&str, &str)) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user.0, user.1)))
}

async fn send(
    ts: &TestServer,
    method: &str,
    uri: &str,
    user: (&str, &str),
    body: Body,
) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic_auth(user))
        .body(body)
        .unwrap();
    let response = ts.server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(
    ts: &TestServer,
    method: &str,
    uri: &str,
    user: (&str, &str),
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let (status, bytes) = send(ts, method, uri, user, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON response body")
    };
    (status, value)
}

fn surveys(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "IdentifierUUID": format!("ID{i:03}"),
                "Title": format!("Context {i}"),
                "Type": "Context",
            })
        })
        .collect()
}

fn sync_body(head: &str, preferences: &str, surveys: Vec<Value>) -> Value {
    json!({
        "device": "test-device",
        "message": "test sync",
        "head": head,
        "preferences": STANDARD.encode(preferences),
        "surveys": surveys,
    })
}

async fn push(ts: &TestServer, head: &str, preferences: &str, s: Vec<Value>) -> Value {
    let (status, body) = send_json(
        ts,
        "POST",
        "/idig/Agora/T1",
        WRITER,
        Some(sync_body(head, preferences, s)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "sync failed: {body}");
    body
}

// ---------------------------------------------------------------------------
// S1 — fresh bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s1_fresh_bootstrap() {
    let ts = setup();

    let body = push(&ts, "", "P1", surveys(10)).await;
    assert_eq!(body["status"], "pushed");
    let version = body["version"].as_str().unwrap();
    assert!(!version.is_empty());

    let (status, snapshot) =
        send_json(&ts, "GET", "/idig/Agora/T1/surveys", WRITER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["version"], version);
    assert_eq!(snapshot["surveys"].as_array().unwrap().len(), 10);
}

// ---------------------------------------------------------------------------
// S2 — idempotent re-push
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s2_idempotent_repush() {
    let ts = setup();

    let first = push(&ts, "", "P1", surveys(10)).await;
    let v1 = first["version"].as_str().unwrap().to_string();

    let second = push(&ts, &v1, "P1", surveys(10)).await;
    assert_eq!(second["status"], "ok");
    assert_eq!(second["version"], v1.as_str());

    let (status, versions) =
        send_json(&ts, "GET", "/idig/Agora/T1/versions", WRITER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(versions.as_array().unwrap().len(), 1);
    assert_eq!(versions[0]["version"], v1.as_str());
}

// ---------------------------------------------------------------------------
// S3 — pull branch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s3_stale_client_pulls() {
    let ts = setup();

    let first = push(&ts, "", "P1", surveys(10)).await;
    let v1 = first["version"].as_str().unwrap();

    // A second device that never synced posts its own local surveys.
    let (status, body) = send_json(
        &ts,
        "POST",
        "/idig/Agora/T1",
        WRITER,
        Some(sync_body("", "", surveys(3))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pull");
    assert_eq!(body["version"], v1);
    // Updates are diff([], surveys@V1): everything is new to this client.
    assert_eq!(body["updates"].as_array().unwrap().len(), 10);
    let preferences = STANDARD
        .decode(body["preferences"].as_str().unwrap())
        .unwrap();
    assert_eq!(preferences, b"P1");
}

// ---------------------------------------------------------------------------
// S4 — missing attachment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s4_missing_attachment_then_pushed() {
    let ts = setup();

    let mut with_photo = surveys(1);
    with_photo[0]["RelationAttachments"] = json!("n=photo.jpg\nd=sha-abc");

    let (status, body) = send_json(
        &ts,
        "POST",
        "/idig/Agora/T1",
        WRITER,
        Some(sync_body("", "", with_photo.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "missing");
    assert_eq!(body["missing"], json!(["photo.jpg"]));

    // Upload, then re-send the identical sync request.
    let (status, _) = send(
        &ts,
        "PUT",
        "/idig/Agora/T1/attachments/photo.jpg?checksum=sha-abc",
        WRITER,
        Body::from("jpeg-bytes"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &ts,
        "POST",
        "/idig/Agora/T1",
        WRITER,
        Some(sync_body("", "", with_photo)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pushed");

    // And the attachment downloads back with its content type.
    let request = Request::builder()
        .method("GET")
        .uri("/idig/Agora/T1/attachments/photo.jpg?checksum=sha-abc")
        .header(header::AUTHORIZATION, basic_auth(WRITER))
        .body(Body::empty())
        .unwrap();
    let response = ts.server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/jpeg"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"jpeg-bytes");
}

#[tokio::test]
async fn attachment_upload_requires_checksum() {
    let ts = setup();
    let (status, body) = send_json(
        &ts,
        "PUT",
        "/idig/Agora/T1/attachments/photo.jpg",
        WRITER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("checksum"));
}

// ---------------------------------------------------------------------------
// S5 — read-only principal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s5_read_only_with_local_edits() {
    let ts = setup();

    let first = push(&ts, "", "P1", surveys(3)).await;
    let v1 = first["version"].as_str().unwrap().to_string();

    let mut edited = surveys(3);
    edited[1]["Title"] = json!("local edit");

    let (status, body) = send_json(
        &ts,
        "POST",
        "/idig/Agora/T1",
        VIEWER,
        Some(sync_body(&v1, "P1", edited)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "forbidden");
    assert_eq!(body["version"], v1.as_str());
    let updates = body["updates"].as_array().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["old"]["Title"], "local edit");
    assert_eq!(updates[0]["new"]["Title"], "Context 1");

    // No observable mutation: still exactly one version.
    let (_, versions) = send_json(&ts, "GET", "/idig/Agora/T1/versions", WRITER, None).await;
    assert_eq!(versions.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn read_only_in_sync_client_gets_ok() {
    let ts = setup();
    let first = push(&ts, "", "P1", surveys(3)).await;
    let v1 = first["version"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &ts,
        "POST",
        "/idig/Agora/T1",
        VIEWER,
        Some(sync_body(&v1, "P1", surveys(3))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn read_only_attachment_upload_fails() {
    let ts = setup();
    let (status, body) = send_json(
        &ts,
        "PUT",
        "/idig/Agora/T1/attachments/photo.jpg?checksum=sha-abc",
        VIEWER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "forbidden");
}

// ---------------------------------------------------------------------------
// S6 — historical reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s6_survey_history() {
    let ts = setup();

    let first = push(&ts, "", "P1", surveys(10)).await;
    let v1 = first["version"].as_str().unwrap().to_string();

    let mut changed = surveys(10);
    changed[3]["Title"] = json!("revised description");
    let second = push(&ts, &v1, "P1", changed).await;
    assert_eq!(second["status"], "pushed");
    let v2 = second["version"].as_str().unwrap().to_string();

    let (status, history) = send_json(
        &ts,
        "GET",
        "/idig/Agora/T1/surveys/ID003/versions",
        WRITER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["version"], v2.as_str());
    assert_eq!(history[0]["survey"]["Title"], "revised description");
    assert_eq!(history[1]["version"], v1.as_str());
    assert_eq!(history[1]["survey"]["Title"], "Context 3");

    // Snapshot at the old version still reads the original state.
    let (status, old_snapshot) = send_json(
        &ts,
        "GET",
        &format!("/idig/Agora/T1/surveys?version={v1}"),
        WRITER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let old_surveys = old_snapshot["surveys"].as_array().unwrap();
    let id003 = old_surveys
        .iter()
        .find(|s| s["IdentifierUUID"] == "ID003")
        .unwrap();
    assert_eq!(id003["Title"], "Context 3");
}

#[tokio::test]
async fn snapshot_accepts_short_version() {
    let ts = setup();
    let first = push(&ts, "", "P1", surveys(2)).await;
    let v1 = first["version"].as_str().unwrap().to_string();

    let (status, snapshot) = send_json(
        &ts,
        "GET",
        &format!("/idig/Agora/T1/surveys?version={}", &v1[..7]),
        WRITER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The canonical full version is echoed back.
    assert_eq!(snapshot["version"], v1.as_str());
}

#[tokio::test]
async fn snapshot_rejects_unknown_version() {
    let ts = setup();
    push(&ts, "", "P1", surveys(1)).await;

    let (status, body) = send_json(
        &ts,
        "GET",
        "/idig/Agora/T1/surveys?version=ffffffff",
        WRITER,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid version"));
}

#[tokio::test]
async fn empty_trench_snapshot_is_empty() {
    let ts = setup();
    let (status, snapshot) =
        send_json(&ts, "GET", "/idig/Agora/Fresh/surveys", WRITER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["version"], "");
    assert_eq!(snapshot["surveys"], json!([]));
}

// ---------------------------------------------------------------------------
// Trench listing and auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trench_listing_with_read_only_flags() {
    let ts = setup();
    push(&ts, "", "P1", surveys(2)).await;

    let (status, body) = send_json(&ts, "GET", "/idig", WRITER, None).await;
    assert_eq!(status, StatusCode::OK);
    let trenches = body["trenches"].as_array().unwrap();
    assert_eq!(trenches.len(), 1);
    assert_eq!(trenches[0]["project"], "Agora");
    assert_eq!(trenches[0]["name"], "T1");
    assert_eq!(trenches[0]["read_only"], false);

    let (status, body) = send_json(&ts, "GET", "/idig", VIEWER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trenches"][0]["read_only"], true);
}

#[tokio::test]
async fn wrong_password_is_401() {
    let ts = setup();
    let (status, body) = send_json(
        &ts,
        "POST",
        "/idig/Agora/T1",
        ("bruce", "wrong"),
        Some(sync_body("", "", surveys(1))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn unknown_project_is_401() {
    let ts = setup();
    let (status, _) = send_json(
        &ts,
        "POST",
        "/idig/Nowhere/T1",
        WRITER,
        Some(sync_body("", "", surveys(1))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_sync_body_is_400() {
    let ts = setup();
    let (status, body) = send(
        &ts,
        "POST",
        "/idig/Agora/T1",
        WRITER,
        Body::from("this is not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid sync request"));
}
