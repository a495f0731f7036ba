use camlink_lib::{RelayChannel, RelayError, SdpType, SignalingMessage, WsRelay};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

/// Accepts one WebSocket client, sends `greeting`, hands the first frame it
/// receives back through the returned channel and closes.
async fn camera_relay(greeting: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (got_tx, got_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(greeting.to_string())).await.unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Text(text) = frame {
                let _ = got_tx.send(text);
                break;
            }
        }
        let _ = ws.close(None).await;
    });

    (format!("ws://{}", addr), got_rx)
}

#[tokio::test]
async fn test_relay_round_trip() {
    let (url, got) = camera_relay(r#"{"sdp":{"type":"offer","sdp":"v=0\r\n"}}"#).await;
    let (relay, mut inbound) = WsRelay::connect(&url).await.unwrap();

    match inbound.recv().await {
        Some(SignalingMessage::Description(desc)) => assert_eq!(desc.sdp_type, SdpType::Offer),
        other => panic!("expected offer, got {:?}", other),
    }

    let cand = camlink_lib::IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 5000 typ host");
    relay
        .send(&SignalingMessage::Candidate(cand))
        .await
        .unwrap();

    let wire = tokio::time::timeout(Duration::from_secs(5), got)
        .await
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(
        json["ice"]["candidate"],
        "candidate:1 1 udp 1 10.0.0.1 5000 typ host"
    );
    assert!(json.get("sdp").is_none());

    // the server hangs up after the first frame
    assert!(tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .unwrap()
        .is_none());
    let mut closed = relay.closed();
    tokio::time::timeout(Duration::from_secs(5), closed.wait_for(|c| *c))
        .await
        .unwrap()
        .unwrap();
    assert!(relay.is_closed());

    let err = relay
        .send(&SignalingMessage::parse(r#"{"ice":{"candidate":"c"}}"#))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Closed));
}

#[tokio::test]
async fn test_relay_passes_unknown_messages_through() {
    let (url, _got) = camera_relay("keepalive").await;
    let (_relay, mut inbound) = WsRelay::connect(&url).await.unwrap();

    assert_eq!(
        inbound.recv().await,
        Some(SignalingMessage::Unrecognized("keepalive".to_string()))
    );
}

#[tokio::test]
async fn test_relay_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WsRelay::connect(&format!("ws://{}", addr)).await;
    assert!(matches!(result, Err(RelayError::Connect(_))));
}
