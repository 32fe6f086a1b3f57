use pointnote_api::{router, AppState};
use pointnote_client::{
    AnnotationApi, AnnotationClient, AnnotationController, ClientConfig, FormState,
    RequestErrorKind, ViewerAdapter,
};
use pointnote_core::{AnnotationDraft, AnnotationId, Point3};
use std::collections::HashSet;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn spawn_server() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let app = router(AppState::new(dir.path().join("e2e.sqlite3")));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (dir, format!("http://{addr}"))
}

fn client(base_url: &str) -> AnnotationClient {
    AnnotationClient::new(ClientConfig::new(base_url)).unwrap()
}

#[tokio::test]
async fn client_round_trips_through_the_service() {
    let (_dir, base_url) = spawn_server().await;
    let client = client(&base_url);

    assert!(client.list().await.unwrap().is_empty());

    let draft = AnnotationDraft::new(Point3::new(0.0, -1.5, 2.25), "beam joint");
    let created = client.create(&draft).await.unwrap();
    assert_eq!(created.text, "beam joint");
    assert_eq!(created.position(), Point3::new(0.0, -1.5, 2.25));

    let listed = client.list().await.unwrap();
    assert_eq!(listed, vec![created.clone()]);

    client
        .delete(&created.annotation_id.to_string())
        .await
        .unwrap();
    assert!(client.list().await.unwrap().is_empty());

    // Unknown ids delete cleanly.
    client.delete("nonexistent-id").await.unwrap();
}

#[tokio::test]
async fn non_success_status_surfaces_as_status_error() {
    let (_dir, base_url) = spawn_server().await;
    let client = client(&format!("{base_url}/no-such-prefix"));

    let err = client.list().await.unwrap_err();

    assert_eq!(err.kind, RequestErrorKind::Status);
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn unreachable_service_surfaces_as_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}")).list().await.unwrap_err();

    assert_eq!(err.kind, RequestErrorKind::Transport);
    assert_eq!(err.status, None);
}

#[derive(Default)]
struct PointViewer {
    next: u64,
    live: HashSet<u64>,
}

impl ViewerAdapter for PointViewer {
    type Marker = u64;

    fn translate_click_to_3d(&self, screen_x: f64, screen_y: f64) -> Option<Point3> {
        Some(Point3::new(screen_x / 100.0, screen_y / 100.0, 0.0))
    }

    fn place_marker(&mut self, _id: AnnotationId, _position: Point3, _label: &str) -> u64 {
        self.next += 1;
        self.live.insert(self.next);
        self.next
    }

    fn remove_marker(&mut self, marker: u64) {
        self.live.remove(&marker);
    }

    fn remove_all_markers(&mut self) {
        self.live.clear();
    }
}

#[tokio::test]
async fn controller_drives_the_live_service() {
    let (_dir, base_url) = spawn_server().await;
    let mut controller = AnnotationController::new(client(&base_url), PointViewer::default());
    controller.load().await;
    assert!(controller.annotations().is_empty());

    for (x, text) in [(100.0, "left support"), (250.0, "right support")] {
        assert!(controller.handle_click(x, 50.0));
        controller.set_draft_text(text);
        controller.save().await;
        assert_eq!(controller.form(), &FormState::Idle);
    }
    assert_eq!(controller.viewer().live.len(), 2);

    let mut fresh = AnnotationController::new(client(&base_url), PointViewer::default());
    fresh.load().await;
    assert_eq!(fresh.annotations().len(), 2);

    assert!(controller.request_clear_all());
    controller.confirm().await;
    assert!(controller.annotations().is_empty());
    assert!(controller.viewer().live.is_empty());

    fresh.load().await;
    assert!(fresh.annotations().is_empty());
    assert!(fresh.viewer().live.is_empty());
}
