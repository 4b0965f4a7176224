use super::*;
use crate::protocol::QuerySettings;
use std::time::Instant;
use tokio_tungstenite::accept_async;

fn spawn_flaky_server() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    listener.set_nonblocking(true).expect("nonblocking");
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
            // First connection is closed straight away to force a reconnect.
            if let Ok((stream, _)) = listener.accept().await
                && let Ok(mut ws) = accept_async(stream).await
            {
                let _ = ws.close(None).await;
            }
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut sink, mut source) = ws.split();
            while let Some(Ok(frame)) = source.next().await {
                if let Message::Text(text) = frame {
                    let reply = serde_json::json!({ "type": "thinking", "content": text }).to_string();
                    if sink.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
        });
    });
    port
}

fn wait_for<F>(manager: &ConnectionManager, timeout: Duration, mut done: F) -> Vec<ConnectionEvent>
where
    F: FnMut(&[ConnectionEvent]) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline && !done(&seen) {
        if let Some(event) = manager.recv_timeout(Duration::from_millis(50)) {
            seen.push(event);
        }
    }
    seen
}

fn statuses(events: &[ConnectionEvent]) -> Vec<ConnectionStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            ConnectionEvent::Status(status) => Some(*status),
            _ => None,
        })
        .collect()
}

#[test]
fn endpoint_follows_origin_scheme() {
    assert_eq!(
        endpoint_url("https://research.example.com", "/ws").expect("https"),
        "wss://research.example.com/ws"
    );
    assert_eq!(
        endpoint_url("http://localhost:8000/", "/ws").expect("http"),
        "ws://localhost:8000/ws"
    );
    assert_eq!(
        endpoint_url("localhost:8000", "ws").expect("bare"),
        "ws://localhost:8000/ws"
    );
    assert_eq!(
        endpoint_url("https://host.example/app/index.html", "/ws").expect("path dropped"),
        "wss://host.example/ws"
    );
    assert!(matches!(
        endpoint_url("ftp://host", "/ws"),
        Err(ClientError::InvalidOrigin { .. })
    ));
    assert!(matches!(
        endpoint_url("https://", "/ws"),
        Err(ClientError::InvalidOrigin { .. })
    ));
}

#[test]
fn reconnect_delay_is_fixed_per_variant() {
    assert_eq!(
        ReconnectPolicy::for_variant(ClientVariant::Report).delay(),
        Duration::from_secs(1)
    );
    assert_eq!(
        ReconnectPolicy::for_variant(ClientVariant::Transcript).delay(),
        Duration::from_secs(3)
    );
}

#[test]
fn send_without_open_channel_is_rejected() {
    let manager = ConnectionManager::new("ws://127.0.0.1:9/ws", ReconnectPolicy::fixed(Duration::from_secs(1)));
    assert!(!manager.is_open());
    let err = manager
        .send(&OutboundMessage::Query {
            content: "hello".to_string(),
            settings: QuerySettings::default(),
        })
        .expect_err("closed channel");
    assert!(matches!(err, ClientError::NotConnected));
}

#[test]
fn failed_connect_reports_disconnect_and_retries() {
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        probe.local_addr().expect("addr").port()
    };
    let mut manager = ConnectionManager::new(
        format!("ws://127.0.0.1:{port}/ws"),
        ReconnectPolicy::fixed(Duration::from_millis(20)),
    );
    manager.connect();
    let events = wait_for(&manager, Duration::from_secs(5), |seen| {
        statuses(seen)
            .iter()
            .filter(|s| **s == ConnectionStatus::Connecting)
            .count()
            >= 2
    });
    let seen = statuses(&events);
    assert_eq!(
        &seen[..3],
        &[
            ConnectionStatus::Connecting,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting
        ]
    );
    assert!(events
        .iter()
        .any(|event| matches!(event, ConnectionEvent::TransportError(_))));
    assert!(!manager.is_open());
}

#[test]
fn reconnects_after_close_and_round_trips_messages() {
    let port = spawn_flaky_server();
    let mut manager = ConnectionManager::new(
        format!("ws://127.0.0.1:{port}/ws"),
        ReconnectPolicy::fixed(Duration::from_millis(50)),
    );
    manager.connect();

    let events = wait_for(&manager, Duration::from_secs(10), |seen| {
        statuses(seen)
            .iter()
            .filter(|s| **s == ConnectionStatus::Connected)
            .count()
            >= 2
    });
    assert_eq!(
        statuses(&events),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
        ]
    );
    assert!(manager.is_open());

    manager
        .send(&OutboundMessage::Query {
            content: "ping".to_string(),
            settings: QuerySettings::default(),
        })
        .expect("send on open channel");
    let events = wait_for(&manager, Duration::from_secs(5), |seen| {
        seen.iter()
            .any(|event| matches!(event, ConnectionEvent::Inbound(_)))
    });
    let echoed = events.iter().find_map(|event| match event {
        ConnectionEvent::Inbound(InboundEvent::Thinking(text)) => Some(text.clone()),
        _ => None,
    });
    let echoed = echoed.expect("echoed frame");
    assert!(echoed.contains("\"type\":\"query\""));
    assert!(echoed.contains("ping"));
}
