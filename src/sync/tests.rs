//! Reconciler scenario tests
//!
//! End-to-end validate and push runs against a scripted transport and
//! real files in a temporary directory.

use super::*;
use crate::api::{Body, CloudClient};
use crate::auth::AccessCredential;
use crate::document::{fingerprint, BackendRewriter, HclParser};
use crate::error::{DocumentIssue, Error};
use crate::fs::{FileSystem, OsFs};
use crate::testing::{FlakyFs, MockTransport};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const UNDECLARED: &str = "threatmodel \"Payments API\" {\n  description = \"Card processing\"\n}\n\nbackend \"tmcloud\" {\n    organization = \"acme\"\n}\n";

const DECLARED: &str = "threatmodel \"Payments API\" {\n}\n\nbackend \"tmcloud\" {\n  organization = \"acme\"\n  document     = \"payments-api\"\n}\n";

fn credential() -> AccessCredential {
    AccessCredential {
        access_token: "tok".to_string(),
        token_type: "Bearer".to_string(),
        org_name: "Acme".to_string(),
        org_slug: "acme".to_string(),
        expires_at: None,
    }
}

fn whoami() -> serde_json::Value {
    json!({
        "user": {"id": "u1", "email": "dev@acme.test"},
        "organizations": [
            {"organization": {"id": "o1", "name": "Acme", "slug": "acme"}, "role": "admin"}
        ]
    })
}

fn model(slug: &str) -> serde_json::Value {
    json!({"id": format!("m-{slug}"), "name": "Payments API", "slug": slug})
}

fn version(version: &str, hash: &str, current: bool) -> serde_json::Value {
    json!({"id": format!("v{version}"), "version": version, "content_hash": hash, "is_current": current})
}

fn write_document(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("payments.hcl");
    std::fs::write(&path, contents).unwrap();
    path
}

fn reconciler(transport: &Arc<MockTransport>, fs: Arc<dyn FileSystem>) -> Reconciler {
    Reconciler::new(
        CloudClient::new(transport.clone()),
        fs,
        Arc::new(HclParser),
    )
}

fn uploaded_bytes(transport: &MockTransport, path: &str) -> Vec<u8> {
    transport
        .requests()
        .into_iter()
        .find(|r| r.path == path)
        .and_then(|r| match r.body {
            Body::File { bytes, .. } => Some(bytes),
            _ => None,
        })
        .expect("no upload recorded")
}

fn assert_no_backup(path: &Path) {
    assert!(!BackendRewriter::backup_path(path).exists(), "backup left behind");
}

#[tokio::test]
async fn test_zero_backend_blocks_makes_no_calls() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, "threatmodel \"x\" {\n}\n");
    let transport = Arc::new(MockTransport::new());

    let err = reconciler(&transport, Arc::new(OsFs))
        .validate_document(&credential(), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(DocumentIssue::NoBackendBlock)));
    assert!(err.to_string().contains("no backend block"));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_two_backend_blocks_makes_no_calls() {
    let dir = TempDir::new().unwrap();
    let path = write_document(
        &dir,
        "backend \"tmcloud\" {\n  organization = \"a\"\n}\nbackend \"tmcloud\" {\n  organization = \"b\"\n}\n",
    );
    let transport = Arc::new(MockTransport::new());

    let err = reconciler(&transport, Arc::new(OsFs))
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("multiple backend blocks"));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_membership_failure() {
    let dir = TempDir::new().unwrap();
    let path = write_document(
        &dir,
        "backend \"tmcloud\" {\n  organization = \"initech\"\n}\n",
    );
    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());

    let err = reconciler(&transport, Arc::new(OsFs))
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Membership(ref org) if org == "initech"));
    assert_eq!(transport.calls(), vec!["GET /users/me"]);
}

#[tokio::test]
async fn test_without_short_name_only_resolves_org() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, UNDECLARED);
    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());

    let outcome = reconciler(&transport, Arc::new(OsFs))
        .validate_document(&credential(), &path)
        .await
        .unwrap();

    assert_eq!(outcome.organization_id, "o1");
    assert_eq!(outcome.document, None);
    assert_eq!(outcome.version, None);
}

#[tokio::test]
async fn test_current_version_match() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, DECLARED);
    let hash = fingerprint(DECLARED.as_bytes());

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("GET /org/o1/models/payments-api", 200, model("payments-api"));
    transport.respond(
        "GET /org/o1/models/payments-api/versions",
        200,
        json!([version("1", "0000", false), version("2", &hash.to_uppercase(), true)]),
    );

    let outcome = reconciler(&transport, Arc::new(OsFs))
        .validate_document(&credential(), &path)
        .await
        .unwrap();

    assert_eq!(outcome.document.as_deref(), Some("payments-api"));
    assert_eq!(outcome.version.as_deref(), Some("2"));
    assert_eq!(outcome.stale_version, None);
    assert_eq!(
        transport.calls(),
        vec![
            "GET /users/me",
            "GET /org/o1/models/payments-api",
            "GET /org/o1/models/payments-api/versions"
        ]
    );
}

#[tokio::test]
async fn test_stale_version_match_is_reuploaded() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, DECLARED);
    let hash = fingerprint(DECLARED.as_bytes());

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("GET /org/o1/models/payments-api", 200, model("payments-api"));
    transport.respond(
        "GET /org/o1/models/payments-api/versions",
        200,
        json!([version("1", &hash, false), version("2", "ffff", true)]),
    );
    transport.respond(
        "POST /org/o1/models/payments-api/upload",
        200,
        version("3", &hash, true),
    );

    let reconciler = reconciler(&transport, Arc::new(OsFs));
    let outcome = reconciler.validate_document(&credential(), &path).await.unwrap();
    assert_eq!(outcome.version, None);
    assert_eq!(outcome.stale_version.as_deref(), Some("1"));

    let report = reconciler
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap();

    assert_eq!(report.action, PushAction::Uploaded);
    assert_eq!(report.version.as_deref(), Some("3"));
    assert_eq!(report.stale_version.as_deref(), Some("1"));
    assert!(!report.rewrote_local);
    assert_eq!(
        uploaded_bytes(&transport, "/org/o1/models/payments-api/upload"),
        DECLARED.as_bytes()
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), DECLARED);
}

#[tokio::test]
async fn test_up_to_date_push_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, DECLARED);
    let hash = fingerprint(DECLARED.as_bytes());

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("GET /org/o1/models/payments-api", 200, model("payments-api"));
    transport.respond(
        "GET /org/o1/models/payments-api/versions",
        200,
        json!([version("4", &hash, true)]),
    );

    let report = reconciler(&transport, Arc::new(OsFs))
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap();

    assert_eq!(report.action, PushAction::UpToDate);
    assert_eq!(report.version.as_deref(), Some("4"));
    assert_eq!(transport.call_count("POST /org/o1/models/payments-api/upload"), 0);
}

#[tokio::test]
async fn test_push_creates_rewrites_then_uploads() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, UNDECLARED);

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("POST /org/o1/models", 201, model("payments-api"));
    transport.respond(
        "POST /org/o1/models/payments-api/upload",
        201,
        version("1", "abcd", true),
    );

    let report = reconciler(&transport, Arc::new(OsFs))
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap();

    assert_eq!(report.action, PushAction::Created);
    assert_eq!(report.slug, "payments-api");
    assert!(report.rewrote_local);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("    organization = \"acme\"\n    document = \"payments-api\"\n}"));
    assert_eq!(uploaded_bytes(&transport, "/org/o1/models/payments-api/upload"), written.as_bytes());
    assert_no_backup(&path);

    let create = transport
        .requests()
        .into_iter()
        .find(|r| r.path == "/org/o1/models")
        .unwrap();
    assert_eq!(
        create.body,
        Body::Json(json!({"name": "Payments API", "description": "Card processing"}))
    );
    assert_eq!(
        transport.calls(),
        vec!["GET /users/me", "POST /org/o1/models", "POST /org/o1/models/payments-api/upload"]
    );
}

#[tokio::test]
async fn test_unknown_short_name_is_created_under_returned_slug() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, DECLARED);

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond(
        "GET /org/o1/models/payments-api",
        404,
        json!({"error": {"code": "not_found", "message": "no such model", "status": 404}}),
    );
    transport.respond("POST /org/o1/models", 201, model("payments-api-2"));
    transport.respond(
        "POST /org/o1/models/payments-api-2/upload",
        201,
        version("1", "abcd", true),
    );

    let reconciler = reconciler(&transport, Arc::new(OsFs));

    let err = reconciler.validate_document(&credential(), &path).await.unwrap_err();
    assert!(matches!(err, Error::DocumentNotFound { ref name, .. } if name == "payments-api"));

    let report = reconciler
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap();

    assert_eq!(report.action, PushAction::Created);
    assert_eq!(report.slug, "payments-api-2");
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("  document     = \"payments-api-2\"\n"));
    assert!(!written.contains("\"payments-api\""));
    assert_no_backup(&path);
}

#[tokio::test]
async fn test_push_without_local_update_uploads_original() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, UNDECLARED);

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("POST /org/o1/models", 201, model("payments-api"));
    transport.respond(
        "POST /org/o1/models/payments-api/upload",
        201,
        version("1", "abcd", true),
    );

    let report = reconciler(&transport, Arc::new(OsFs))
        .push(&credential(), &path, PushOptions { update_local: false })
        .await
        .unwrap();

    assert!(!report.rewrote_local);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), UNDECLARED);
    assert_eq!(
        uploaded_bytes(&transport, "/org/o1/models/payments-api/upload"),
        UNDECLARED.as_bytes()
    );
}

#[tokio::test]
async fn test_empty_short_name_is_filled_and_not_created_twice() {
    let dir = TempDir::new().unwrap();
    let source = "threatmodel \"Payments API\" {\n}\n\nbackend \"tmcloud\" {\n  organization = \"acme\"\n  document = \"\"\n}\n";
    let path = write_document(&dir, source);

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("POST /org/o1/models", 201, model("payments-api"));
    transport.respond(
        "POST /org/o1/models/payments-api/upload",
        201,
        version("1", "abcd", true),
    );

    let reconciler = reconciler(&transport, Arc::new(OsFs));
    let report = reconciler
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap();

    assert_eq!(report.action, PushAction::Created);
    assert!(report.rewrote_local);
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, source.replace("document = \"\"", "document = \"payments-api\""));
    assert_no_backup(&path);

    transport.respond("GET /org/o1/models/payments-api", 200, model("payments-api"));
    transport.respond(
        "GET /org/o1/models/payments-api/versions",
        200,
        json!([version("1", &fingerprint(written.as_bytes()), true)]),
    );

    let report = reconciler
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap();

    assert_eq!(report.action, PushAction::UpToDate);
    assert_eq!(transport.call_count("POST /org/o1/models"), 1);
}

#[tokio::test]
async fn test_uneditable_short_name_fails_before_create() {
    let dir = TempDir::new().unwrap();
    let source = "backend \"tmcloud\" {\n  organization = \"acme\"\n  document = var.name\n}\n";
    let path = write_document(&dir, source);

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("POST /org/o1/models", 201, model("payments-api"));

    let err = reconciler(&transport, Arc::new(OsFs))
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AlreadySet(ref s) if s == "var.name"));
    assert_eq!(transport.call_count("POST /org/o1/models"), 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), source);
}

#[tokio::test]
async fn test_failed_rewrite_restores_file_and_skips_upload() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, UNDECLARED);

    let transport = Arc::new(MockTransport::new());
    transport.respond("GET /users/me", 200, whoami());
    transport.respond("POST /org/o1/models", 201, model("payments-api"));

    let fs = Arc::new(FlakyFs::new());
    fs.fail_writes_to(&path);

    let err = reconciler(&transport, fs)
        .push(&credential(), &path, PushOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), UNDECLARED.as_bytes());
    assert_no_backup(&path);
    assert_eq!(transport.call_count("POST /org/o1/models/payments-api/upload"), 0);
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir, DECLARED);

    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "GET /users/me",
        401,
        json!({"error": {"code": "unauthorized", "message": "token revoked", "status": 401}}),
    );

    let err = reconciler(&transport, Arc::new(OsFs))
        .validate_document(&credential(), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(_)));
}
