//! Whole pipeline: documents on disk through to the rendered report

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::Path as UrlPath, http::StatusCode, routing::get};
use serde_json::{Map, Value, json};

use apisuite::action::{ActionRegistry, load_custom_actions};
use apisuite::combine::combine;
use apisuite::filter::filter_by_tags;
use apisuite::loader::load_documents;
use apisuite::report::{ReportFormat, render_report};
use apisuite::runner::TestRunner;
use apisuite::transport::ReqwestTransport;
use apisuite::Error;

async fn user(UrlPath(id): UrlPath<u32>) -> (StatusCode, Json<Value>) {
    if id == 1 {
        (StatusCode::OK, Json(json!({"id": 1, "name": "Ada"})))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
    }
}

async fn serve() -> SocketAddr {
    let app = Router::new().route("/users/{id}", get(user));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    addr
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("write fixture");
}

#[tokio::test]
async fn documents_run_and_report() {
    let addr = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "users.json",
        &json!({
            "variables": {"base": format!("http://{addr}")},
            "tests": [
                {
                    "id": "get-user",
                    "tags": ["smoke"],
                    "steps": [{
                        "request": {"url": "{{base}}/users/1"},
                        "validations": [
                            {"target": "status", "expected": 200},
                            {"target": "body.name", "expected": "Ada"}
                        ]
                    }]
                },
                {
                    "id": "missing-user",
                    "tags": ["smoke"],
                    "steps": [{
                        "request": {"url": "{{base}}/users/2"},
                        "validations": [{"target": "status", "expected": 200}]
                    }]
                }
            ]
        })
        .to_string(),
    );
    write(
        dir.path(),
        "extra.yaml",
        "tests:\n  - id: slow-suite\n    tags: [nightly]\n    steps: []\n",
    );

    let documents =
        load_documents(&[format!("{}/*.json", dir.path().display()), format!("{}/extra.yaml", dir.path().display())])
            .expect("documents load");
    let suite = combine(&documents).expect("suite combines");
    assert_eq!(suite.tests.len(), 3);

    let tests = filter_by_tags(suite.tests, &["smoke".to_string()]).expect("tags match");
    assert_eq!(tests.len(), 2);

    let transport = ReqwestTransport::new(Duration::from_secs(5), "apisuite-test", false)
        .expect("client");
    let runner = TestRunner::new(
        Arc::new(transport),
        Arc::new(ActionRegistry::with_builtins()),
        Arc::new(suite.variables),
    );
    let outcome = runner.run(&tests).await;
    assert_eq!(outcome.exit_code(), 1);

    let report: Value =
        serde_json::from_str(&render_report(&outcome, ReportFormat::Json).expect("renders"))
            .expect("json report");
    assert_eq!(report["testsExecuted"], 2);
    assert_eq!(report["testsFailed"], 1);
    assert_eq!(report["testResults"][0]["id"], "get-user");
    assert_eq!(report["testResults"][0]["passed"], true);
    assert_eq!(report["testResults"][1]["passed"], false);

    let console = render_report(&outcome, ReportFormat::Console).expect("renders");
    assert!(console.contains("missing-user"));
}

#[test]
fn unmatched_tags_abort_before_running() {
    let suite = combine(&[json!({"tests": [{"id": "a", "steps": []}]})]).expect("combines");
    let err = filter_by_tags(suite.tests, &["nope".to_string()]).unwrap_err();
    assert!(matches!(err, Error::NoMatch(_)));
    assert!(err.is_fatal());
}

#[cfg(unix)]
#[tokio::test]
async fn custom_command_action_feeds_a_request() {
    let addr = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "pick-user.action.yaml",
        "command: sh -c \"cat > /dev/null; echo 1\"\ntimeoutMs: 5000\n",
    );

    let mut registry = ActionRegistry::with_builtins();
    let loaded =
        load_custom_actions(&mut registry, &[dir.path().to_path_buf()]).expect("actions load");
    assert_eq!(loaded, 1);
    assert!(registry.contains("pick_user"));

    let suite = combine(&[json!({"tests": [{
        "id": "custom",
        "steps": [{
            "actions": [{"action": "pick_user", "output": "uid"}],
            "request": {"url": format!("http://{addr}/users/{{{{uid}}}}")},
            "validations": [{"target": "body.name", "expected": "Ada"}]
        }]
    }]})])
    .expect("combines");

    let transport = ReqwestTransport::new(Duration::from_secs(5), "apisuite-test", false)
        .expect("client");
    let runner = TestRunner::new(Arc::new(transport), Arc::new(registry), Arc::new(Map::new()));
    let outcome = runner.run(&suite.tests).await;
    assert!(outcome.test_results[0].passed(), "{:?}", outcome.test_results[0]);
}
