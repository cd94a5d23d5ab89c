//! Session lifecycle integration tests.
//!
//! These run a real server and watcher against temporary directories.

use std::fs;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use live_serve::reload::RELOAD_CHANNEL_PATH;
use live_serve::session::PORT_FALLBACK_ATTEMPTS;
use live_serve::{
    ClientChannel, LiveOptions, LiveServeError, ReloadSignal, SessionController, SessionState,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("index.html"), "<body>v1</body>").unwrap();
    fs::write(dir.path().join("style.css"), "body {}").unwrap();
    fs::write(dir.path().join("app.js"), "let a = 1;").unwrap();
    dir
}

fn options() -> LiveOptions {
    LiveOptions::default()
        .with_port(0)
        .with_debounce(Duration::from_millis(50))
}

/// Register a client on the running session's reload channel.
fn connect(controller: &SessionController) -> UnboundedReceiver<ReloadSignal> {
    let (channel, rx) = ClientChannel::open();
    controller
        .reload_channel()
        .unwrap()
        .register(channel)
        .unwrap();
    rx
}

/// Next data or close frame, skipping heartbeats.
async fn next_frame(socket: &mut Socket) -> Message {
    loop {
        let msg = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

async fn next_signal(rx: &mut UnboundedReceiver<ReloadSignal>) -> ReloadSignal {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_go_live_then_offline() {
    let dir = site();
    let controller = SessionController::new(dir.path());

    let info = controller.go_live(options()).await.unwrap();
    assert_eq!(controller.state(), SessionState::Online);
    assert_ne!(info.port(), 0);
    assert_eq!(controller.session_info(), Some(info.clone()));
    assert!(controller.reload_channel().is_some());

    controller.go_offline().await.unwrap();
    assert_eq!(controller.state(), SessionState::Offline);
    assert!(controller.session_info().is_none());
    assert!(controller.reload_channel().is_none());

    // Second call is a no-op.
    controller.go_offline().await.unwrap();
    assert_eq!(controller.state(), SessionState::Offline);
}

#[tokio::test]
async fn test_port_in_use_leaves_controller_offline() {
    let dir = site();
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let controller = SessionController::new(dir.path());
    let result = controller.go_live(options().with_port(port)).await;

    assert!(matches!(result, Err(LiveServeError::PortInUse(p)) if p == port));
    assert_eq!(controller.state(), SessionState::Offline);
    assert!(controller.session_info().is_none());
}

#[tokio::test]
async fn test_port_fallback_picks_next_port() {
    let dir = site();
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let controller = SessionController::new(dir.path());
    let info = controller
        .go_live(options().with_port(port).with_port_fallback())
        .await
        .unwrap();

    assert!(info.port() > port);
    assert!(info.port() < port + PORT_FALLBACK_ATTEMPTS);
    assert_eq!(controller.state(), SessionState::Online);

    controller.go_offline().await.unwrap();
}

#[tokio::test]
async fn test_port_reusable_after_offline() {
    let dir = site();
    let controller = SessionController::new(dir.path());

    let first = controller.go_live(options()).await.unwrap();
    controller.go_offline().await.unwrap();

    let second = controller
        .go_live(options().with_port(first.port()))
        .await
        .unwrap();
    assert_eq!(second.port(), first.port());
    controller.go_offline().await.unwrap();
}

#[tokio::test]
async fn test_missing_root_is_path_unavailable() {
    let dir = site();
    let controller = SessionController::new(dir.path());

    let result = controller
        .go_live(options().with_root(dir.path().join("missing")))
        .await;

    assert!(matches!(result, Err(LiveServeError::PathUnavailable { .. })));
    assert_eq!(controller.state(), SessionState::Offline);
}

#[tokio::test]
async fn test_file_root_is_path_unavailable() {
    let dir = site();
    let controller = SessionController::new(dir.path());

    let result = controller.go_live(options().with_root("index.html")).await;
    assert!(matches!(result, Err(LiveServeError::PathUnavailable { .. })));
}

#[tokio::test]
async fn test_offline_closes_clients() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();

    let mut rx = connect(&controller);
    controller.go_offline().await.unwrap();

    assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
}

// ============================================================================
// Change → signal
// ============================================================================

#[tokio::test]
async fn test_stylesheet_edit_injects_once() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();
    let mut rx = connect(&controller);

    // Let the backend install its watches.
    sleep(Duration::from_millis(200)).await;

    fs::write(dir.path().join("style.css"), "body { color: blue; }").unwrap();
    fs::write(dir.path().join("style.css"), "body { color: green; }").unwrap();

    assert_eq!(
        next_signal(&mut rx).await,
        ReloadSignal::inject_style("style.css")
    );

    sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err());

    controller.go_offline().await.unwrap();
}

#[tokio::test]
async fn test_script_edit_reloads() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();
    let mut rx = connect(&controller);

    sleep(Duration::from_millis(200)).await;
    fs::write(dir.path().join("app.js"), "let a = 2;").unwrap();

    assert_eq!(next_signal(&mut rx).await, ReloadSignal::FullReload);
    controller.go_offline().await.unwrap();
}

#[tokio::test]
async fn test_ignored_change_sends_nothing() {
    let dir = site();
    fs::create_dir(dir.path().join(".git")).unwrap();

    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();
    let mut rx = connect(&controller);

    sleep(Duration::from_millis(200)).await;
    fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
    fs::write(dir.path().join("theme.scss"), "$a: 1;").unwrap();

    sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());

    controller.go_offline().await.unwrap();
}

#[tokio::test]
async fn test_every_client_receives_signal() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();

    let mut first = connect(&controller);
    let mut second = connect(&controller);

    assert!(controller.notify_saved(dir.path().join("index.html")));

    assert_eq!(next_signal(&mut first).await, ReloadSignal::FullReload);
    assert_eq!(next_signal(&mut second).await, ReloadSignal::FullReload);

    controller.go_offline().await.unwrap();
}

#[tokio::test]
async fn test_no_signals_after_offline() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();
    controller.go_offline().await.unwrap();

    assert!(!controller.notify_saved("index.html"));
}

#[tokio::test]
async fn test_single_save_seen_twice_sends_one_signal() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    controller.go_live(options()).await.unwrap();
    let mut rx = connect(&controller);

    sleep(Duration::from_millis(200)).await;

    // The editor writes the file and reports the save itself.
    fs::write(dir.path().join("style.css"), "body { color: teal; }").unwrap();
    assert!(controller.notify_saved("style.css"));

    assert_eq!(
        next_signal(&mut rx).await,
        ReloadSignal::inject_style("style.css")
    );

    sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err());

    controller.go_offline().await.unwrap();
}

// ============================================================================
// WebSocket endpoint
// ============================================================================

#[tokio::test]
async fn test_websocket_forwards_signals_and_closes_on_offline() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    let info = controller.go_live(options()).await.unwrap();

    let url = format!("ws://{}{}", info.addr, RELOAD_CHANNEL_PATH);
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let reload = controller.reload_channel().unwrap();
    timeout(WAIT, async {
        while reload.is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    sleep(Duration::from_millis(200)).await;
    fs::write(dir.path().join("style.css"), "body { color: navy; }").unwrap();

    let frame = next_frame(&mut socket).await;
    let payload: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(payload, json!({ "type": "inject-css", "path": "style.css" }));

    controller.go_offline().await.unwrap();

    assert!(matches!(next_frame(&mut socket).await, Message::Close(_)));
}

#[tokio::test]
async fn test_websocket_html_edit_is_full_reload() {
    let dir = site();
    let controller = SessionController::new(dir.path());
    let info = controller.go_live(options()).await.unwrap();

    let url = format!("ws://{}{}", info.addr, RELOAD_CHANNEL_PATH);
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let reload = controller.reload_channel().unwrap();
    timeout(WAIT, async {
        while reload.is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert!(controller.notify_saved("index.html"));

    let frame = next_frame(&mut socket).await;
    let payload: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(payload, json!({ "type": "reload" }));

    controller.go_offline().await.unwrap();
}
