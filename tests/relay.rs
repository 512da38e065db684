//! End-to-end propagation across a process hop.

use request_context::config::ServiceConfig;
use request_context::context;
use request_context::http::server::{ContextReport, RelayReport};
use request_context::PropagateContext;

mod common;

#[tokio::test]
async fn test_context_endpoint_reports_handler_and_child() {
    let addr = common::start_server(ServiceConfig::default()).await;

    let response = common::client()
        .get(format!("http://{}/context", addr))
        .header("x-request-id", "abc")
        .header("x-request-hop", "3")
        .header("x-request-session-id", "s-1")
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "abc");
    assert_eq!(response.headers()["x-request-hop"], "3");
    assert_eq!(response.headers()["x-request-session-id"], "s-1");

    let report: ContextReport = response.json().await.unwrap();
    assert_eq!(report.handler.request_id.as_deref(), Some("abc"));
    assert_eq!(report.handler, report.child);
    assert_eq!(report.child.session.as_deref(), Some("s-1"));
    assert_eq!(report.child.data.get("handled"), Some(&serde_json::json!(true)));
}

#[tokio::test]
async fn test_relay_forwards_id_with_incremented_hop() {
    let downstream = common::start_server(ServiceConfig::default()).await;

    let mut config = ServiceConfig::default();
    config.context.prefix = Some("edge".into());
    config.downstream.url = Some(format!("http://{}", downstream));
    let upstream = common::start_server(config).await;

    let response = common::client()
        .get(format!("http://{}/relay", upstream))
        .header("x-request-hop", "7")
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(response.status(), 200);
    // no inbound id, so the inbound hop is ignored and a fresh id is minted
    assert_eq!(response.headers()["x-request-hop"], "0");
    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(id.starts_with("edge-"));

    let report: RelayReport = response.json().await.unwrap();
    assert_eq!(report.local.request_id.as_deref(), Some(id.as_str()));
    assert_eq!(report.local.hop, Some(0));
    assert_eq!(report.downstream.handler.request_id.as_deref(), Some(id.as_str()));
    assert_eq!(report.downstream.handler.hop, Some(1));
    assert_eq!(report.downstream.child.hop, Some(1));
}

#[tokio::test]
async fn test_relay_without_downstream_is_not_found() {
    let addr = common::start_server(ServiceConfig::default()).await;

    let response = common::client()
        .get(format!("http://{}/relay", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_reqwest_builder_propagates_current_context() {
    let (backend, mut heads) = common::start_capture_backend().await;
    let client = common::client();

    context::root(async {
        context::get_or_create(Some("job"));
        context::current_record().unwrap().set_hop(2);

        client
            .get(format!("http://{}/", backend))
            .propagate_context()
            .send()
            .await
            .unwrap();
    })
    .await;

    let head = heads.recv().await.unwrap();
    assert!(common::header_value(&head, "x-request-id").unwrap().starts_with("job-"));
    assert_eq!(common::header_value(&head, "x-request-hop"), Some("3"));
    assert!(common::header_value(&head, "x-request-session-id").is_none());
}
