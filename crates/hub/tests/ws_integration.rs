//! End-to-end tests driving a bound hub over real WebSockets and HTTP.
//!
//! Clients speak the raw wire format on purpose: JSON text frames built by
//! hand and binary frames with the 36-byte id prefix, exactly what a
//! browser client would send.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hub::config::Config;
use hub::net::Server;
use hub::Hub;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(300);

async fn start_hub() -> (SocketAddr, Arc<Hub>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.server.bind = "127.0.0.1".to_string();
    config.server.port = 0;
    config.hub.data_dir = dir.path().to_path_buf();

    let hub = Hub::new(config);
    let server = Server::bind(Arc::clone(&hub)).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.serve());

    (addr, hub, dir)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    ws
}

async fn send_text(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.to_string()))
        .await
        .expect("send text frame");
}

async fn recv_json(ws: &mut Ws) -> Value {
    loop {
        let msg = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid JSON frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

async fn recv_binary(ws: &mut Ws) -> Vec<u8> {
    loop {
        let msg = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("websocket error");
        match msg {
            Message::Binary(data) => return data,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected binary frame, got {other:?}"),
        }
    }
}

async fn expect_silence(ws: &mut Ws) {
    if let Ok(frame) = timeout(SILENCE_WINDOW, ws.next()).await {
        panic!("expected no frame, got {frame:?}");
    }
}

/// Build a data frame by hand: 36-byte id prefix plus payload.
fn data_frame(file_id: &str, payload: &[u8]) -> Vec<u8> {
    let mut frame = format!("{file_id:<36}").into_bytes();
    frame.extend_from_slice(payload);
    frame
}

/// A session with device A (creator, "Mac") and device B ("iPhone").
/// Returns both sockets, the session code, and the two device ids.
async fn create_pair(addr: SocketAddr) -> (Ws, Ws, String, String, String) {
    let mut a = connect(addr).await;
    send_text(
        &mut a,
        r#"{"type":"create_session","deviceName":"Mac","deviceType":"mac"}"#,
    )
    .await;
    let created = recv_json(&mut a).await;
    assert_eq!(created["type"], "session_created");
    let code = created["sessionCode"].as_str().unwrap().to_string();
    let a_id = created["deviceId"].as_str().unwrap().to_string();

    let mut b = connect(addr).await;
    send_text(
        &mut b,
        &format!(
            r#"{{"type":"join_session","sessionCode":"{}","deviceName":"iPhone","deviceType":"iphone"}}"#,
            code
        ),
    )
    .await;
    let joined = recv_json(&mut b).await;
    assert_eq!(joined["type"], "session_joined");
    let b_id = joined["deviceId"].as_str().unwrap().to_string();

    // Drain A's device_joined notification.
    let notified = recv_json(&mut a).await;
    assert_eq!(notified["type"], "device_joined");

    (a, b, code, a_id, b_id)
}

/// Upload `contents` from A and wait for completion; returns the file id.
async fn upload(a: &mut Ws, name: &str, mime: &str, contents: &[u8]) -> String {
    send_text(
        a,
        &format!(
            r#"{{"type":"file_start","fileName":"{}","fileSize":{},"mimeType":"{}"}}"#,
            name,
            contents.len(),
            mime
        ),
    )
    .await;
    let ack = recv_json(a).await;
    assert_eq!(ack["type"], "file_start_ack");
    let file_id = ack["fileId"].as_str().unwrap().to_string();
    assert_eq!(file_id.len(), 36);

    if !contents.is_empty() {
        a.send(Message::Binary(data_frame(&file_id, contents)))
            .await
            .expect("send chunk");
        let progress = recv_json(a).await;
        assert_eq!(progress["type"], "upload_progress");
        assert_eq!(progress["progress"], 100);
    }

    send_text(a, &format!(r#"{{"type":"file_complete","fileId":"{file_id}"}}"#)).await;
    let done = recv_json(a).await;
    assert_eq!(done["type"], "file_complete_ack");
    assert_eq!(done["fileId"], file_id.as_str());

    file_id
}

#[tokio::test]
async fn s1_create_and_join() {
    let (addr, hub, _dir) = start_hub().await;

    let mut a = connect(addr).await;
    send_text(
        &mut a,
        r#"{"type":"create_session","deviceName":"Mac","deviceType":"mac"}"#,
    )
    .await;

    let created = recv_json(&mut a).await;
    assert_eq!(created["type"], "session_created");
    assert_eq!(created["connectedDevices"], 1);
    let code = created["sessionCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);
    assert_eq!(code, code.to_ascii_uppercase());
    assert_eq!(created["deviceId"].as_str().unwrap().len(), 36);

    // B joins with the code lowercased; lookup is case-insensitive.
    let mut b = connect(addr).await;
    send_text(
        &mut b,
        &format!(
            r#"{{"type":"join_session","sessionCode":"{}","deviceName":"iPhone","deviceType":"iphone"}}"#,
            code.to_ascii_lowercase()
        ),
    )
    .await;

    let joined = recv_json(&mut b).await;
    assert_eq!(joined["type"], "session_joined");
    assert_eq!(joined["sessionCode"], code.as_str());
    assert_eq!(joined["connectedDevices"], 2);

    let notified = recv_json(&mut a).await;
    assert_eq!(notified["type"], "device_joined");
    assert_eq!(notified["totalDevices"], 2);
    assert_eq!(notified["deviceName"], "iPhone");
    assert_eq!(notified["deviceType"], "iphone");

    // No files yet, so B gets no existing_files frame.
    expect_silence(&mut b).await;

    assert_eq!(hub.registry.session_count(), 1);
    assert_eq!(hub.registry.device_count(), 2);
}

#[tokio::test]
async fn s2_upload_fanout_download() {
    let (addr, _hub, _dir) = start_hub().await;
    let (mut a, mut b, _code, _a_id, _b_id) = create_pair(addr).await;

    // A uploads "hello" as hi.txt.
    send_text(
        &mut a,
        r#"{"type":"file_start","fileName":"hi.txt","fileSize":5,"mimeType":"text/plain"}"#,
    )
    .await;
    let ack = recv_json(&mut a).await;
    assert_eq!(ack["type"], "file_start_ack");
    assert_eq!(ack["fileName"], "hi.txt");
    let file_id = ack["fileId"].as_str().unwrap().to_string();

    a.send(Message::Binary(data_frame(&file_id, b"hello")))
        .await
        .unwrap();
    let progress = recv_json(&mut a).await;
    assert_eq!(progress["type"], "upload_progress");
    assert_eq!(progress["fileId"], file_id.as_str());
    assert_eq!(progress["progress"], 100);
    assert_eq!(progress["received"], 5);
    assert_eq!(progress["total"], 5);

    send_text(&mut a, &format!(r#"{{"type":"file_complete","fileId":"{file_id}"}}"#)).await;

    // B observes exactly one new_file with the right metadata; A gets the
    // ack and no new_file.
    let announced = recv_json(&mut b).await;
    assert_eq!(announced["type"], "new_file");
    assert_eq!(announced["file"]["id"], file_id.as_str());
    assert_eq!(announced["file"]["originalName"], "hi.txt");
    assert_eq!(announced["file"]["size"], 5);
    assert_eq!(announced["file"]["mimetype"], "text/plain");
    assert!(announced["file"]["uploadedAt"].as_u64().unwrap() > 0);

    let done = recv_json(&mut a).await;
    assert_eq!(done["type"], "file_complete_ack");
    expect_silence(&mut a).await;

    // B downloads the file back.
    send_text(&mut b, &format!(r#"{{"type":"request_file","fileId":"{file_id}"}}"#)).await;

    let start = recv_json(&mut b).await;
    assert_eq!(start["type"], "file_download_start");
    assert_eq!(start["fileId"], file_id.as_str());
    assert_eq!(start["fileName"], "hi.txt");
    assert_eq!(start["fileSize"], 5);
    assert_eq!(start["mimeType"], "text/plain");

    let chunk = recv_binary(&mut b).await;
    assert_eq!(&chunk[..36], file_id.as_bytes());
    assert_eq!(&chunk[36..], b"hello");

    let complete = recv_json(&mut b).await;
    assert_eq!(complete["type"], "file_download_complete");
    assert_eq!(complete["fileId"], file_id.as_str());
}

#[tokio::test]
async fn s3_unknown_session() {
    let (addr, hub, _dir) = start_hub().await;

    let mut c = connect(addr).await;
    send_text(
        &mut c,
        r#"{"type":"join_session","sessionCode":"ZZZZZZ","deviceName":"Tablet","deviceType":"android"}"#,
    )
    .await;

    let error = recv_json(&mut c).await;
    assert_eq!(error["type"], "session_error");
    assert!(error["error"].as_str().unwrap().contains("Session not found"));

    // C stays connected and unregistered; ping still works.
    send_text(&mut c, r#"{"type":"ping"}"#).await;
    assert_eq!(recv_json(&mut c).await["type"], "pong");
    assert_eq!(hub.registry.device_count(), 0);
}

#[tokio::test]
async fn s4_leave_fanout() {
    let (addr, hub, _dir) = start_hub().await;
    let (mut a, mut b, _code, _a_id, b_id) = create_pair(addr).await;

    b.close(None).await.expect("close");

    let left = recv_json(&mut a).await;
    assert_eq!(left["type"], "device_left");
    assert_eq!(left["deviceId"], b_id.as_str());
    assert_eq!(left["totalDevices"], 1);

    assert_eq!(hub.registry.device_count(), 1);
}

#[tokio::test]
async fn s5_delete() {
    let (addr, _hub, _dir) = start_hub().await;
    let (mut a, mut b, _code, _a_id, _b_id) = create_pair(addr).await;

    let file_id = upload(&mut a, "bye.txt", "text/plain", b"goodbye").await;
    let announced = recv_json(&mut b).await;
    assert_eq!(announced["type"], "new_file");

    send_text(&mut a, &format!(r#"{{"type":"delete_file","fileId":"{file_id}"}}"#)).await;

    // Both the deleter and the peer observe the removal.
    let removed_a = recv_json(&mut a).await;
    assert_eq!(removed_a["type"], "file_removed");
    assert_eq!(removed_a["fileId"], file_id.as_str());

    let removed_b = recv_json(&mut b).await;
    assert_eq!(removed_b["type"], "file_removed");
    assert_eq!(removed_b["fileId"], file_id.as_str());

    // A request for the deleted file produces no frames at all.
    send_text(&mut a, &format!(r#"{{"type":"request_file","fileId":"{file_id}"}}"#)).await;
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn late_joiner_sees_existing_files_and_downloads_identical_bytes() {
    let (addr, _hub, _dir) = start_hub().await;
    let (mut a, mut b, code, _a_id, _b_id) = create_pair(addr).await;

    // A large enough payload to force several 64 KiB download chunks.
    let contents: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
    let file_id = upload(&mut a, "blob.bin", "application/octet-stream", &contents).await;
    let announced = recv_json(&mut b).await;
    assert_eq!(announced["type"], "new_file");

    // C joins after the fact and is told about the file.
    let mut c = connect(addr).await;
    send_text(
        &mut c,
        &format!(
            r#"{{"type":"join_session","sessionCode":"{code}","deviceName":"Laptop","deviceType":"windows"}}"#
        ),
    )
    .await;
    assert_eq!(recv_json(&mut c).await["type"], "session_joined");

    let existing = recv_json(&mut c).await;
    assert_eq!(existing["type"], "existing_files");
    let files = existing["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], file_id.as_str());
    assert_eq!(files[0]["size"], 150_000);

    // C downloads: start, contiguous 64 KiB chunks, complete; the
    // reassembled bytes equal what A uploaded.
    send_text(&mut c, &format!(r#"{{"type":"request_file","fileId":"{file_id}"}}"#)).await;
    let start = recv_json(&mut c).await;
    assert_eq!(start["type"], "file_download_start");

    let mut reassembled = Vec::new();
    let mut chunks = 0;
    while reassembled.len() < contents.len() {
        let frame = recv_binary(&mut c).await;
        assert_eq!(&frame[..36], file_id.as_bytes());
        assert!(frame.len() - 36 <= 64 * 1024);
        reassembled.extend_from_slice(&frame[36..]);
        chunks += 1;
    }
    assert_eq!(chunks, 3);
    assert_eq!(reassembled, contents);

    assert_eq!(recv_json(&mut c).await["type"], "file_download_complete");
}

#[tokio::test]
async fn second_create_session_is_ignored() {
    let (addr, hub, _dir) = start_hub().await;

    let mut a = connect(addr).await;
    send_text(
        &mut a,
        r#"{"type":"create_session","deviceName":"Mac","deviceType":"mac"}"#,
    )
    .await;
    assert_eq!(recv_json(&mut a).await["type"], "session_created");

    // A second create while in a session is a protocol violation: ignored,
    // no reply, the device stays where it was.
    send_text(
        &mut a,
        r#"{"type":"create_session","deviceName":"Mac again","deviceType":"mac"}"#,
    )
    .await;
    expect_silence(&mut a).await;

    assert_eq!(hub.registry.session_count(), 1);
    assert_eq!(hub.registry.device_count(), 1);
}

#[tokio::test]
async fn malformed_and_misdirected_frames_are_ignored() {
    let (addr, _hub, _dir) = start_hub().await;

    let mut a = connect(addr).await;

    // Garbage JSON, unknown type, and a transfer frame in the
    // unregistered state: all dropped without closing the connection.
    send_text(&mut a, "{never closed").await;
    send_text(&mut a, r#"{"type":"self_destruct"}"#).await;
    send_text(
        &mut a,
        r#"{"type":"file_start","fileName":"x","fileSize":1,"mimeType":"text/plain"}"#,
    )
    .await;
    a.send(Message::Binary(data_frame(
        "00000000-0000-0000-0000-000000000000",
        b"stray",
    )))
    .await
    .unwrap();

    send_text(&mut a, r#"{"type":"ping"}"#).await;
    assert_eq!(recv_json(&mut a).await["type"], "pong");
}

#[tokio::test]
async fn short_upload_gets_no_completion_ack() {
    let (addr, _hub, _dir) = start_hub().await;
    let (mut a, mut b, _code, _a_id, _b_id) = create_pair(addr).await;

    send_text(
        &mut a,
        r#"{"type":"file_start","fileName":"half.bin","fileSize":10,"mimeType":"application/octet-stream"}"#,
    )
    .await;
    let ack = recv_json(&mut a).await;
    let file_id = ack["fileId"].as_str().unwrap().to_string();

    a.send(Message::Binary(data_frame(&file_id, b"only5")))
        .await
        .unwrap();
    assert_eq!(recv_json(&mut a).await["type"], "upload_progress");

    // Declared 10 bytes, delivered 5: completion is refused silently and
    // nothing is announced to peers.
    send_text(&mut a, &format!(r#"{{"type":"file_complete","fileId":"{file_id}"}}"#)).await;
    expect_silence(&mut a).await;
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn http_api_surface() {
    let (addr, hub, _dir) = start_hub().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    // /api/info reflects the bound port and live device count.
    let info: Value = client
        .get(format!("{base}/api/info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["port"], addr.port());
    assert_eq!(info["connectedDevices"], 0);
    assert!(info["url"].as_str().unwrap().starts_with("http://"));
    assert!(!info["ip"].as_str().unwrap().is_empty());

    // /api/qrcode returns an inline PNG and echoes the join URL.
    let qr: Value = client
        .get(format!("{base}/api/qrcode?session=ab2c3d"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(qr["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert!(qr["url"].as_str().unwrap().ends_with("?session=AB2C3D"));

    // /api/stats counts session creation.
    let stats: Value = client
        .get(format!("{base}/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalSessions"], 0);
    assert_eq!(stats["totalUsers"], 0);

    let mut a = connect(addr).await;
    send_text(
        &mut a,
        r#"{"type":"create_session","deviceName":"Mac","deviceType":"mac"}"#,
    )
    .await;
    assert_eq!(recv_json(&mut a).await["type"], "session_created");

    let stats: Value = client
        .get(format!("{base}/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalSessions"], 1);
    assert_eq!(stats["totalUsers"], 1);

    // /api/feedback validates the rating range.
    let bad = client
        .post(format!("{base}/api/feedback"))
        .json(&serde_json::json!({ "rating": 6, "feedback": "too enthusiastic" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

    let ok = client
        .post(format!("{base}/api/feedback"))
        .json(&serde_json::json!({ "rating": 5, "feedback": "flawless transfer" }))
        .send()
        .await
        .unwrap();
    assert!(ok.status().is_success());

    let entries = hub.feedback.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].rating, 5);
    assert_eq!(entries[0].feedback, "flawless transfer");
}
