// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over the protocol handler, hub, router, engine, and
//! REST handlers, with a mock transport in place of real sockets.
//!
//! Each test builds an isolated harness with a temp SQLite store; tests are
//! independent and order-insensitive.

use axum::extract::{Json, Path, State};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use pluvio_config::model::EngineConfig;
use pluvio_core::{iso_millis, DayOfWeek, DeviceStatus, PumpStatus};
use pluvio_engine::AlarmEngine;
use pluvio_gateway::{handlers, protocol::PeerConnection, AppState, GatewayConfig};
use pluvio_store::NewAlarm;
use pluvio_test_utils::{MockLink, TestHarness, TEST_SERVER_TAG};

fn app_state(harness: &TestHarness) -> AppState {
    AppState::new(
        harness.store.clone(),
        harness.hub.clone(),
        harness.router.clone(),
        GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            service_tag: TEST_SERVER_TAG.to_string(),
            env: "test".to_string(),
            public_url: None,
            keepalive_interval_secs: 25,
        },
    )
}

async fn body_json(response: Response) -> Value {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let mut value: Value = serde_json::from_slice(&bytes).expect("JSON body");
    value["_status"] = json!(status.as_u16());
    value
}

// ---- Scenario 1: happy join ----

#[tokio::test]
async fn happy_join_flows_to_dashboards_and_health() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let dashboard = MockLink::new();
    let mut dashboard_conn = PeerConnection::open(state.clone(), dashboard.clone(), None).await;
    dashboard_conn.handle_text(r#"{"type":"frontend_join"}"#).await;
    assert_eq!(dashboard.frames_of_type("device_list").len(), 1);

    let device = MockLink::new();
    let mut device_conn =
        PeerConnection::open(state.clone(), device.clone(), Some("10.0.0.7".into())).await;
    device_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;

    // Device saw the hello and the join confirmation.
    assert_eq!(device.frames_of_type("connected").len(), 1);
    let joined = device.frames_of_type("device_joined");
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0]["data"]["status"], "success");
    assert_eq!(joined[0]["data"]["deviceId"], "STRWSMK1");
    assert_eq!(joined[0]["data"]["reconnectCount"], 0);

    // Every dashboard learned about the device.
    let connected = dashboard.frames_of_type("device_connected");
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0]["data"]["deviceId"], "STRWSMK1");
    assert_eq!(connected[0]["data"]["status"], "online");

    // Health reports the online device.
    let health = body_json(handlers::health(State(state)).await).await;
    assert_eq!(health["_status"], 200);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "connected");
    assert!(health["devices"]["online"].as_i64().unwrap() >= 1);
}

// ---- Scenario 2: supersede ----

#[tokio::test]
async fn second_join_supersedes_first_session() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let first = MockLink::new();
    let mut first_conn = PeerConnection::open(state.clone(), first.clone(), None).await;
    first_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;

    let second = MockLink::new();
    let mut second_conn = PeerConnection::open(state.clone(), second.clone(), None).await;
    second_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;

    // The first channel was closed with the superseded code.
    assert_eq!(first.close_info(), Some((4001, "superseded".into())));

    // The new session carries reconnectCount 1.
    let joined = second.frames_of_type("device_joined");
    assert_eq!(joined[0]["data"]["reconnectCount"], 1);

    // The displaced socket's teardown must not unbind the new session.
    first_conn.on_close("closed").await;
    assert!(harness.hub.lookup("STRWSMK1").is_some());

    // The store's connection counter kept climbing.
    let row = harness.store.find_device("STRWSMK1").await.unwrap().unwrap();
    assert_eq!(row.ws_connections, 2);
    assert_eq!(row.status, DeviceStatus::Online);
}

// ---- Scenario 3: manual command preconditions ----

#[tokio::test]
async fn water_unknown_device_is_404() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let response = handlers::water_device(
        State(state),
        Path("UNKNOWN".to_string()),
        Json(serde_json::from_value(json!({"action": "water", "duration": 5000})).unwrap()),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 404);
    assert_eq!(body["error"], "device not found");
}

#[tokio::test]
async fn water_online_device_without_session_is_409() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);
    harness.store.record_connection("STRWSMK1", None).await.unwrap();

    let response = handlers::water_device(
        State(state),
        Path("STRWSMK1".to_string()),
        Json(serde_json::from_value(json!({"action": "water"})).unwrap()),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 409);
    assert_eq!(body["error"], "not connected");
}

#[tokio::test]
async fn water_live_device_dispatches_command() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut device_conn = PeerConnection::open(state.clone(), device.clone(), None).await;
    device_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;

    let response = handlers::water_device(
        State(state),
        Path("strwsmk1".to_string()),
        Json(serde_json::from_value(json!({"action": "water", "duration": 7000})).unwrap()),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["command"]["duration"], 7000);

    let commands = device.frames_of_type("water_command");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["data"]["action"], "water");
    assert_eq!(
        commands[0]["data"]["commandId"],
        body["command"]["commandId"]
    );
}

// ---- Scenario 4: alarm firing ----

#[tokio::test]
async fn due_alarm_fires_through_live_session() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut device_conn = PeerConnection::open(state.clone(), device.clone(), None).await;
    device_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;
    let dashboard = MockLink::new();
    let mut dashboard_conn = PeerConnection::open(state.clone(), dashboard.clone(), None).await;
    dashboard_conn.handle_text(r#"{"type":"frontend_join"}"#).await;

    let now = Utc::now();
    let alarm = harness
        .store
        .create_alarm(NewAlarm {
            device_id: "STRWSMK1".into(),
            name: "morning".into(),
            time: "07:00".into(),
            days: vec![
                DayOfWeek::Mon,
                DayOfWeek::Tue,
                DayOfWeek::Wed,
                DayOfWeek::Thu,
                DayOfWeek::Fri,
                DayOfWeek::Sat,
                DayOfWeek::Sun,
            ],
            duration_ms: 5000,
            next_execution: iso_millis(now - Duration::seconds(10)),
        })
        .await
        .unwrap();

    let engine = AlarmEngine::new(
        harness.store.clone(),
        harness.router.clone(),
        &EngineConfig::default(),
    );
    let outcome = engine.tick(now).await;
    assert_eq!(outcome.alarms_executed, 1);

    let commands = device.frames_of_type("water_command");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["data"]["alarmId"], alarm.id);
    assert_eq!(commands[0]["data"]["duration"], 5000);

    assert_eq!(dashboard.frames_of_type("alarm_executed").len(), 1);

    let row = harness.store.find_alarm(alarm.id).await.unwrap().unwrap();
    assert_eq!(row.execution_count, 1);
    let next: DateTime<Utc> =
        DateTime::parse_from_rfc3339(row.next_execution.as_deref().unwrap())
            .unwrap()
            .with_timezone(&Utc);
    assert!(next > now);
    assert!(next - now < Duration::days(8));
}

// ---- Round-trip property: pump status normalization ----

#[tokio::test]
async fn pump_status_stopped_normalizes_to_idle_everywhere() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut device_conn = PeerConnection::open(state.clone(), device.clone(), None).await;
    device_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;
    let dashboard = MockLink::new();
    let mut dashboard_conn = PeerConnection::open(state.clone(), dashboard.clone(), None).await;
    dashboard_conn.handle_text(r#"{"type":"frontend_join"}"#).await;

    for (sent, expected) in [("running", "running"), ("stopped", "idle"), ("idle", "idle")] {
        dashboard.clear();
        device.clear();
        device_conn
            .handle_text(&format!(
                r#"{{"type":"pump_status","deviceId":"STRWSMK1","status":"{sent}"}}"#
            ))
            .await;

        let update = dashboard.frames_of_type("pump_status_update");
        assert_eq!(update.len(), 1, "broadcast for {sent}");
        assert_eq!(update[0]["data"]["status"], expected);

        let ack = device.frames_of_type("status_received");
        assert_eq!(ack.len(), 1);
        assert_eq!(ack[0]["data"]["status"], expected);
    }

    let row = harness.store.find_device("STRWSMK1").await.unwrap().unwrap();
    assert_eq!(row.pump_status, PumpStatus::Idle);
}

// ---- Protocol robustness ----

#[tokio::test]
async fn unknown_frame_type_keeps_session_open() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut conn = PeerConnection::open(state, device.clone(), None).await;

    conn.handle_text(r#"{"type":"selfdestruct"}"#).await;
    let errors = device.frames_of_type("error");
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["data"]["error"]
        .as_str()
        .unwrap()
        .contains("device_join"));

    // Session still usable.
    conn.handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#).await;
    assert_eq!(device.frames_of_type("device_joined").len(), 1);
}

#[tokio::test]
async fn malformed_body_gets_error_frame_not_close() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut conn = PeerConnection::open(state, device.clone(), None).await;

    conn.handle_text("ping").await;
    conn.handle_text(r#"{"deviceId":"NOTYPE"}"#).await;
    conn.handle_text(r#"{"type":"pump_status","deviceId":"P1","status":"exploded"}"#)
        .await;

    assert_eq!(device.frames_of_type("error").len(), 3);
    assert!(!device.is_closed());
}

#[tokio::test]
async fn heartbeat_acks_with_echoes_before_join_rejected() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut conn = PeerConnection::open(state, device.clone(), None).await;

    // heartbeat before device_join is a protocol error.
    conn.handle_text(r#"{"type":"heartbeat","deviceId":"STRWSMK1"}"#).await;
    assert_eq!(device.frames_of_type("error").len(), 1);

    conn.handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#).await;
    conn.handle_text(
        r#"{"type":"heartbeat","deviceId":"STRWSMK1","uptime":77,"freeHeap":42000,"rssi":-55}"#,
    )
    .await;

    let acks = device.frames_of_type("heartbeat_ack");
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["data"]["uptime"], 77);
    assert_eq!(acks[0]["data"]["freeHeap"], 42000);
    assert_eq!(acks[0]["data"]["rssi"], -55);
    assert!(acks[0]["data"]["serverTime"].is_string());

    let row = harness.store.find_device("STRWSMK1").await.unwrap().unwrap();
    assert!(row.last_heartbeat.is_some());
}

// ---- Snapshot consistency ----

#[tokio::test]
async fn dashboard_snapshot_matches_store() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);
    harness.store.register_or_touch_device("A1", None).await.unwrap();
    harness.store.record_connection("B2", None).await.unwrap();

    let dashboard = MockLink::new();
    let mut conn = PeerConnection::open(state, dashboard.clone(), None).await;
    conn.handle_text(r#"{"type":"frontend_join"}"#).await;

    let snapshots = dashboard.frames_of_type("device_list");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["data"]["count"], 2);
    let ids: Vec<&str> = snapshots[0]["data"]["devices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["deviceId"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"A1"));
    assert!(ids.contains(&"B2"));
}

// ---- Disconnect mirroring ----

#[tokio::test]
async fn device_close_marks_offline_and_notifies() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let dashboard = MockLink::new();
    let mut dashboard_conn = PeerConnection::open(state.clone(), dashboard.clone(), None).await;
    dashboard_conn.handle_text(r#"{"type":"frontend_join"}"#).await;

    let device = MockLink::new();
    let mut device_conn = PeerConnection::open(state.clone(), device.clone(), None).await;
    device_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;

    device_conn.on_close("closed").await;

    assert!(harness.hub.lookup("STRWSMK1").is_none());
    let row = harness.store.find_device("STRWSMK1").await.unwrap().unwrap();
    assert_eq!(row.status, DeviceStatus::Offline);
    assert_eq!(row.pump_status, PumpStatus::Idle);

    let gone = dashboard.frames_of_type("device_disconnected");
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0]["data"]["reason"], "closed");
}

// ---- Manual command from dashboard over the socket ----

#[tokio::test]
async fn dashboard_manual_command_reaches_device() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let device = MockLink::new();
    let mut device_conn = PeerConnection::open(state.clone(), device.clone(), None).await;
    device_conn
        .handle_text(r#"{"type":"device_join","deviceId":"STRWSMK1"}"#)
        .await;

    let dashboard = MockLink::new();
    let mut dashboard_conn = PeerConnection::open(state.clone(), dashboard.clone(), None).await;
    dashboard_conn.handle_text(r#"{"type":"frontend_join"}"#).await;
    dashboard_conn
        .handle_text(r#"{"type":"manual_command","deviceId":"strwsmk1","action":"water","duration":9000}"#)
        .await;

    let sent = dashboard.frames_of_type("command_sent");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["data"]["deviceId"], "STRWSMK1");

    let commands = device.frames_of_type("water_command");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["data"]["duration"], 9000);

    // A device may not issue manual commands.
    device_conn
        .handle_text(r#"{"type":"manual_command","deviceId":"STRWSMK1","action":"water"}"#)
        .await;
    assert_eq!(device.frames_of_type("error").len(), 1);
}

// ---- REST registration ----

#[tokio::test]
async fn register_requires_device_id() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);

    let response = handlers::register_device(
        State(state.clone()),
        Json(serde_json::from_value(json!({"ip": "10.0.0.9"})).unwrap()),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 400);

    let response = handlers::register_device(
        State(state),
        Json(serde_json::from_value(json!({"deviceId": "strwsmk1", "ip": "10.0.0.9"})).unwrap()),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["device"]["deviceId"], "STRWSMK1");
    assert!(body["serverInfo"]["wsUrl"].as_str().unwrap().ends_with("/ws"));
}

// ---- Alarm CRUD over REST ----

#[tokio::test]
async fn alarm_crud_via_rest() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);
    harness.store.register_or_touch_device("STRWSMK1", None).await.unwrap();

    // Validation failures.
    for bad in [
        json!({"name": "x", "time": "07:00", "days": ["mon"], "duration": 5000}),
        json!({"deviceId": "STRWSMK1", "time": "07:00", "days": ["mon"], "duration": 5000}),
        json!({"deviceId": "STRWSMK1", "name": "x", "time": "7 am", "days": ["mon"], "duration": 5000}),
        json!({"deviceId": "STRWSMK1", "name": "x", "time": "07:00", "days": [], "duration": 5000}),
        json!({"deviceId": "STRWSMK1", "name": "x", "time": "07:00", "days": ["funday"], "duration": 5000}),
        json!({"deviceId": "STRWSMK1", "name": "x", "time": "07:00", "days": ["mon"], "duration": 500}),
        json!({"deviceId": "STRWSMK1", "name": "x", "time": "07:00", "days": ["mon"], "duration": 400000}),
    ] {
        let response = handlers::create_alarm(
            State(state.clone()),
            Json(serde_json::from_value(bad).unwrap()),
        )
        .await;
        assert_eq!(body_json(response).await["_status"], 400);
    }

    // Unknown device.
    let response = handlers::create_alarm(
        State(state.clone()),
        Json(
            serde_json::from_value(
                json!({"deviceId": "GHOST", "name": "x", "time": "07:00", "days": ["mon"], "duration": 5000}),
            )
            .unwrap(),
        ),
    )
    .await;
    assert_eq!(body_json(response).await["_status"], 404);

    // Create.
    let response = handlers::create_alarm(
        State(state.clone()),
        Json(
            serde_json::from_value(
                json!({"deviceId": "strwsmk1", "name": "morning", "time": "07:00", "days": ["mon", "monday", "thu"], "duration": 5000}),
            )
            .unwrap(),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 200);
    let alarm_id = body["alarm"]["id"].as_i64().unwrap();
    assert_eq!(body["alarm"]["isActive"], true);
    // Duplicate day spellings collapse.
    assert_eq!(body["alarm"]["days"], json!(["mon", "thu"]));
    let next: DateTime<Utc> =
        DateTime::parse_from_rfc3339(body["alarm"]["nextExecution"].as_str().unwrap())
            .unwrap()
            .with_timezone(&Utc);
    assert!(next > Utc::now());

    // Toggle off and back on.
    let body = body_json(
        handlers::toggle_alarm(State(state.clone()), Path(alarm_id)).await,
    )
    .await;
    assert_eq!(body["alarm"]["isActive"], false);
    let body = body_json(
        handlers::toggle_alarm(State(state.clone()), Path(alarm_id)).await,
    )
    .await;
    assert_eq!(body["alarm"]["isActive"], true);
    assert!(body["alarm"]["nextExecution"].is_string());

    // Toggle of unknown id is 404.
    let body = body_json(handlers::toggle_alarm(State(state.clone()), Path(99999)).await).await;
    assert_eq!(body["_status"], 404);

    // List.
    let body = body_json(
        handlers::list_device_alarms(State(state.clone()), Path("STRWSMK1".into())).await,
    )
    .await;
    assert_eq!(body["alarms"].as_array().unwrap().len(), 1);

    // Delete.
    let body = body_json(
        handlers::delete_alarm(State(state.clone()), Path(alarm_id)).await,
    )
    .await;
    assert_eq!(body["success"], true);
    let body = body_json(handlers::delete_alarm(State(state), Path(alarm_id)).await).await;
    assert_eq!(body["_status"], 404);
}

// ---- One-shot schedules over REST ----

#[tokio::test]
async fn schedule_creation_via_rest() {
    let harness = TestHarness::new().await.unwrap();
    let state = app_state(&harness);
    harness.store.register_or_touch_device("STRWSMK1", None).await.unwrap();

    // Past timestamp is rejected.
    let past = iso_millis(Utc::now() - Duration::minutes(5));
    let response = handlers::create_schedule(
        State(state.clone()),
        Json(
            serde_json::from_value(json!({"deviceId": "STRWSMK1", "time": past, "duration": 5000}))
                .unwrap(),
        ),
    )
    .await;
    assert_eq!(body_json(response).await["_status"], 400);

    // Future timestamp creates a pending schedule.
    let future = iso_millis(Utc::now() + Duration::minutes(30));
    let response = handlers::create_schedule(
        State(state.clone()),
        Json(
            serde_json::from_value(
                json!({"deviceId": "STRWSMK1", "time": future, "duration": 5000}),
            )
            .unwrap(),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["_status"], 200);
    assert_eq!(body["schedule"]["status"], "pending");

    let body = body_json(
        handlers::list_device_schedules(State(state), Path("STRWSMK1".into())).await,
    )
    .await;
    assert_eq!(body["schedules"].as_array().unwrap().len(), 1);
    assert_eq!(body["deviceId"], "STRWSMK1");
}
