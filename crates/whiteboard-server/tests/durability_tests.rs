//! Restart properties: the store is the source of truth, subscribers and
//! cursors are not part of it.
//!
//! A "restart" here is dropping every handle to the first store and opening a
//! second one over the same data directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use whiteboard_server::registry::SessionRegistry;
use whiteboard_server::server::http::create_router;
use whiteboard_server::session::Origin;
use whiteboard_server::store::ElementStore;

fn build_router(store: Arc<ElementStore>) -> Router {
    create_router(Arc::new(SessionRegistry::new(store)))
}

/// LMDB permits one open environment per path per process; session actors
/// from the previous incarnation hold the store until their queues close, so
/// reopening may need a few scheduler turns.
async fn reopen_store(path: &Path) -> Arc<ElementStore> {
    for _ in 0..500 {
        if let Ok(store) = ElementStore::open(path) {
            return Arc::new(store);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("previous store did not close in time");
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value =
        if bytes.is_empty() { None } else { Some(serde_json::from_slice(&bytes).unwrap()) };
    (status, value)
}

fn rectangle(x: f64) -> Value {
    json!({"type": "rectangle", "x": x, "y": 0.0, "width": 5.0, "height": 5.0})
}

#[tokio::test]
async fn test_restart_preserves_elements_in_order_and_drops_subscribers() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(ElementStore::open(dir.path()).unwrap());
        let router = build_router(store);
        for x in [1.0, 2.0, 3.0] {
            let (status, _) =
                send(&router, "POST", "/api/sessions/gamma01/elements", Some(rectangle(x))).await;
            assert_eq!(status, StatusCode::CREATED);
        }
    }

    let router = build_router(reopen_store(dir.path()).await);

    let (status, body) = send(&router, "GET", "/api/sessions/gamma01/elements", None).await;
    assert_eq!(status, StatusCode::OK);
    let elements = body.unwrap();
    let elements = elements.as_array().unwrap().clone();
    assert_eq!(elements.len(), 3);
    let xs: Vec<f64> = elements.iter().map(|el| el["x"].as_f64().unwrap()).collect();
    assert_eq!(xs, vec![1.0, 2.0, 3.0]);

    let (_, body) = send(&router, "GET", "/api/sessions/gamma01", None).await;
    assert_eq!(body.unwrap()["userCount"], json!(0));
}

#[tokio::test]
async fn test_restart_excludes_deleted_elements() {
    let dir = tempfile::tempdir().unwrap();

    let victim_id;
    {
        let store = Arc::new(ElementStore::open(dir.path()).unwrap());
        let router = build_router(store);
        let mut ids = Vec::new();
        for x in [1.0, 2.0, 3.0] {
            let (_, body) =
                send(&router, "POST", "/api/sessions/delta01/elements", Some(rectangle(x))).await;
            ids.push(body.unwrap()["id"].as_str().unwrap().to_string());
        }
        victim_id = ids[1].clone();
        let (status, _) = send(
            &router,
            "DELETE",
            &format!("/api/sessions/delta01/elements/{victim_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let router = build_router(reopen_store(dir.path()).await);

    let (_, body) = send(&router, "GET", "/api/sessions/delta01/elements", None).await;
    let elements = body.unwrap();
    let elements = elements.as_array().unwrap().clone();
    assert_eq!(elements.len(), 2);
    assert!(elements.iter().all(|el| el["id"] != json!(victim_id.clone())));
    let xs: Vec<f64> = elements.iter().map(|el| el["x"].as_f64().unwrap()).collect();
    assert_eq!(xs, vec![1.0, 3.0]);
}

#[tokio::test]
async fn test_clear_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(ElementStore::open(dir.path()).unwrap());
        let router = build_router(store);
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            send(&router, "POST", "/api/sessions/eps0001/elements", Some(rectangle(x))).await;
        }
        let (status, _) = send(&router, "DELETE", "/api/sessions/eps0001/elements", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let router = build_router(reopen_store(dir.path()).await);

    let (status, body) = send(&router, "GET", "/api/sessions/eps0001/elements", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!([]));
}

#[tokio::test]
async fn test_cursor_relays_never_touch_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ElementStore::open(dir.path()).unwrap());
    let registry = Arc::new(SessionRegistry::new(Arc::clone(&store)));

    let handle = registry.get_or_create("curs001").await.unwrap();
    let element =
        whiteboard_server::validate::element(json!({"type": "pen", "points": [{"x": 0.0, "y": 0.0}]}))
            .unwrap();
    handle.create(element, Origin::Api).await.unwrap();

    let before = serde_json::to_value(store.get("curs001").unwrap().unwrap()).unwrap();

    for i in 0..20 {
        handle.cursor("ua".to_string(), f64::from(i), f64::from(i)).await;
    }
    // Force the command queue to drain past the cursors.
    handle.snapshot().await.unwrap();

    let after = serde_json::to_value(store.get("curs001").unwrap().unwrap()).unwrap();
    assert_eq!(before, after, "cursor frames must not cause durable writes");
}

#[tokio::test]
async fn test_session_skeleton_is_durable_before_first_element() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(ElementStore::open(dir.path()).unwrap());
        let registry = Arc::new(SessionRegistry::new(store));
        registry.get_or_create("skel001").await.unwrap();
    }

    let store = reopen_store(dir.path()).await;
    let record = store.get("skel001").unwrap().unwrap();
    assert_eq!(record.id, "skel001");
    assert!(record.elements.is_empty());
}
