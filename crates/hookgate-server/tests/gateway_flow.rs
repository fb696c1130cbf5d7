//! End-to-end tests: a real gateway, a mock webhook backend and a
//! WebSocket client, all on loopback ports.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use hookgate_config::{Config, RouteConfig, RouteName};
use hookgate_server::{build_router, AppState};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
struct Event {
    path: String,
    connection_id: Option<String>,
    body: String,
}

#[derive(Clone, Default)]
struct Webhook {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Webhook {
    fn events_for(&self, path: &str) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.path == path)
            .cloned()
            .collect()
    }

    async fn wait_for(&self, path: &str, count: usize) -> Vec<Event> {
        for _ in 0..250 {
            let events = self.events_for(path);
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {} call(s) to {}", count, path);
    }
}

async fn webhook_handler(
    State(hook): State<Webhook>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    hook.events.lock().unwrap().push(Event {
        path: path.clone(),
        connection_id: headers
            .get("connectionid")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    match path.as_str() {
        "/connect" => Json(json!({"body": "welcome"})).into_response(),
        "/default" => Json(json!({"body": {"echo": body}})).into_response(),
        "/fail" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"body": "too late"})).into_response()
        }
        _ => StatusCode::OK.into_response(),
    }
}

async fn spawn_webhook() -> (String, Webhook) {
    let hook = Webhook::default();
    let app = Router::new()
        .fallback(webhook_handler)
        .with_state(hook.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hook)
}

async fn spawn_gateway(routes: RouteConfig) -> SocketAddr {
    let mut config = Config::default();
    config.routes = routes;
    config.server.webhook_timeout = Duration::from_millis(300);

    let state = Arc::new(AppState::new(&config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return text;
        }
    }
}

async fn push_to(addr: SocketAddr, id: &str, body: &Value) -> (StatusCode, String) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/connections/{}", addr, id))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_full_connection_lifecycle() {
    let (base, hook) = spawn_webhook().await;
    let routes = RouteConfig::builder()
        .route(RouteName::Connect, format!("{}/connect", base))
        .route(RouteName::Default, format!("{}/default", base))
        .route(RouteName::Disconnect, format!("{}/disconnect", base))
        .build()
        .unwrap();
    let addr = spawn_gateway(routes).await;

    let mut ws = connect(addr).await;
    assert_eq!(next_text(&mut ws).await, r#""welcome""#);

    let connect_event = hook.wait_for("/connect", 1).await.remove(0);
    let id = connect_event.connection_id.expect("connectionId header");
    assert!(connect_event.body.is_empty());

    ws.send(Message::Text("hello".into())).await.unwrap();
    let echoed: Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(echoed, json!({"echo": "hello"}));
    let default_event = hook.wait_for("/default", 1).await.remove(0);
    assert_eq!(default_event.connection_id.as_deref(), Some(id.as_str()));
    assert_eq!(default_event.body, "hello");

    let (status, text) = push_to(addr, &id, &json!({"connectionId": id, "data": {"k": "v"}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Message sent");
    let pushed: Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(pushed, json!({"k": "v"}));

    let info: Value = reqwest::get(format!("http://{}/connections/{}", addr, id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["connectionId"], json!(id));
    assert_eq!(info["sourceIp"], json!("127.0.0.1"));

    ws.close(None).await.unwrap();
    let disconnects = hook.wait_for("/disconnect", 1).await;
    assert_eq!(disconnects[0].connection_id.as_deref(), Some(id.as_str()));

    let (status, _) = push_to(addr, &id, &json!({"connectionId": id, "data": "late"})).await;
    assert_eq!(status, StatusCode::GONE);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hook.events_for("/disconnect").len(), 1);
}

#[tokio::test]
async fn test_webhook_failures_keep_connection_open() {
    let (base, hook) = spawn_webhook().await;
    let routes = RouteConfig::builder()
        .route(RouteName::Connect, format!("{}/slow", base))
        .route(RouteName::Default, format!("{}/fail", base))
        .build()
        .unwrap();
    let addr = spawn_gateway(routes).await;

    let mut ws = connect(addr).await;
    let id = hook.wait_for("/slow", 1).await[0]
        .connection_id
        .clone()
        .expect("connectionId header");

    ws.send(Message::Text("one".into())).await.unwrap();
    hook.wait_for("/fail", 1).await;

    let (status, _) = push_to(addr, &id, &json!({"connectionId": id, "data": "still here"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next_text(&mut ws).await, r#""still here""#);
}

#[tokio::test]
async fn test_push_validation() {
    let addr = spawn_gateway(RouteConfig::default()).await;
    let mut ws = connect(addr).await;
    let client = reqwest::Client::new();

    let (status, _) = push_to(addr, "x", &json!({"connectionId": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = push_to(addr, "x", &json!({"data": "hi"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("http://{}/connections/x", addr))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let (status, text) = push_to(addr, "missing", &json!({"connectionId": "missing", "data": 1})).await;
    assert_eq!(status, StatusCode::GONE);
    assert!(text.contains("missing"));

    let response = client
        .get(format!("http://{}/connections/missing", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 410);

    // Unrouted text frames are dropped without closing the socket
    ws.send(Message::Text("ignored".into())).await.unwrap();
    let mut health = Value::Null;
    for _ in 0..50 {
        health = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if health["connections"] == json!(1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(health["status"], json!("healthy"));
    assert_eq!(health["connections"], json!(1));
}

#[tokio::test]
async fn test_legacy_push_path() {
    let (base, hook) = spawn_webhook().await;
    let routes = RouteConfig::builder()
        .route(RouteName::Disconnect, format!("{}/disconnect", base))
        .route(RouteName::Default, format!("{}/echo-less", base))
        .build()
        .unwrap();
    let addr = spawn_gateway(routes).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("who am i".into())).await.unwrap();
    let id = hook.wait_for("/echo-less", 1).await[0]
        .connection_id
        .clone()
        .expect("connectionId header");

    let response = reqwest::Client::new()
        .post(format!("http://{}/@connections/{}", addr, id))
        .json(&json!({"connectionId": id, "data": [1, 2, 3]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(next_text(&mut ws).await, "[1,2,3]");

    drop(ws);
    hook.wait_for("/disconnect", 1).await;
}

async fn assert_silent(ws: &mut WsClient) {
    let next = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(next.is_err(), "unexpected frame: {:?}", next);
}

#[tokio::test]
async fn test_replies_and_pushes_stay_on_their_connection() {
    let (base, hook) = spawn_webhook().await;
    let routes = RouteConfig::builder()
        .route(RouteName::Connect, format!("{}/opened", base))
        .route(RouteName::Default, format!("{}/default", base))
        .route(RouteName::Disconnect, format!("{}/disconnect", base))
        .build()
        .unwrap();
    let addr = spawn_gateway(routes).await;

    let mut a = connect(addr).await;
    let id_a = hook.wait_for("/opened", 1).await[0].connection_id.clone().unwrap();
    let mut b = connect(addr).await;
    let id_b = hook.wait_for("/opened", 2).await[1].connection_id.clone().unwrap();
    assert_ne!(id_a, id_b);

    // A's reply reaches only A
    a.send(Message::Text("from-a".into())).await.unwrap();
    let echoed: Value = serde_json::from_str(&next_text(&mut a).await).unwrap();
    assert_eq!(echoed, json!({"echo": "from-a"}));
    assert_silent(&mut b).await;

    // A push to B reaches only B
    let (status, _) = push_to(addr, &id_b, &json!({"connectionId": id_b, "data": "for-b"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next_text(&mut b).await, r#""for-b""#);
    assert_silent(&mut a).await;

    // Interleaved traffic keeps per-connection order and never crosses over
    for i in 0..5 {
        a.send(Message::Text(format!("a{}", i))).await.unwrap();
        b.send(Message::Text(format!("b{}", i))).await.unwrap();
    }
    for i in 0..5 {
        let from_a: Value = serde_json::from_str(&next_text(&mut a).await).unwrap();
        assert_eq!(from_a, json!({"echo": format!("a{}", i)}));
        let from_b: Value = serde_json::from_str(&next_text(&mut b).await).unwrap();
        assert_eq!(from_b, json!({"echo": format!("b{}", i)}));
    }
    for event in hook.events_for("/default") {
        let id = event.connection_id.unwrap();
        let expected = if event.body.starts_with('b') { &id_b } else { &id_a };
        assert_eq!(&id, expected);
    }

    // Closing A leaves B registered and reachable
    a.close(None).await.unwrap();
    let disconnects = hook.wait_for("/disconnect", 1).await;
    assert_eq!(disconnects[0].connection_id.as_deref(), Some(id_a.as_str()));

    let response = reqwest::get(format!("http://{}/connections/{}", addr, id_b))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let (status, _) = push_to(addr, &id_a, &json!({"connectionId": id_a, "data": 1})).await;
    assert_eq!(status, StatusCode::GONE);
    let (status, _) = push_to(addr, &id_b, &json!({"connectionId": id_b, "data": "still"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next_text(&mut b).await, r#""still""#);
}
