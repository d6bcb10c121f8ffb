use super::*;
use crate::protocol::{
    NextState, STATUS_REQUEST_PACKET_ID, decode_handshake, encode_pong, encode_status_response,
    split_packet, write_varint,
};
use tokio::net::TcpListener;

/// Accept a single connection on a loopback port and hand it to `handler`.
async fn spawn_server<F, Fut>(handler: F) -> StatusClient
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            handler(stream).await;
        }
    });
    StatusClient::new("127.0.0.1", port)
}

async fn expect_status_handshake(stream: &mut TcpStream) {
    let frame = read_frame(stream).await.unwrap();
    let handshake = decode_handshake(&frame).unwrap();
    assert_eq!(handshake.host, "127.0.0.1");
    assert_eq!(handshake.next_state, NextState::Status);
}

// ========================================================================
// read_frame tests
// ========================================================================

#[tokio::test]
async fn read_frame_returns_body() {
    let bytes = vec![0x03, 0x00, 0xaa, 0xbb, 0xff];
    let mut reader: &[u8] = &bytes;
    let body = read_frame(&mut reader).await.unwrap();
    assert_eq!(body, vec![0x00, 0xaa, 0xbb]);
}

#[tokio::test]
async fn read_frame_rejects_oversized_length() {
    let mut bytes = Vec::new();
    write_varint(&mut bytes, (MAX_FRAME_SIZE + 1) as i32);
    let mut reader: &[u8] = &bytes;
    let result = read_frame(&mut reader).await;
    assert!(matches!(
        result,
        Err(ClientError::Protocol(ProtocolError::FrameTooLarge(_)))
    ));
}

#[tokio::test]
async fn read_frame_rejects_unterminated_varint() {
    let bytes = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
    let mut reader: &[u8] = &bytes;
    let result = read_frame(&mut reader).await;
    assert!(matches!(
        result,
        Err(ClientError::Protocol(ProtocolError::VarIntTooLong))
    ));
}

#[tokio::test]
async fn read_frame_short_body_is_receive_error() {
    let bytes = vec![0x05, 0x00, 0x01];
    let mut reader: &[u8] = &bytes;
    assert!(matches!(
        read_frame(&mut reader).await,
        Err(ClientError::Receive(_))
    ));
}

// ========================================================================
// Status exchange
// ========================================================================

#[tokio::test]
async fn status_returns_player_counts() {
    let client = spawn_server(|mut stream| async move {
        expect_status_handshake(&mut stream).await;

        let request = read_frame(&mut stream).await.unwrap();
        let (packet_id, payload) = split_packet(&request).unwrap();
        assert_eq!(packet_id, STATUS_REQUEST_PACKET_ID);
        assert!(payload.is_empty());

        let json = r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":4},"description":"hi"}"#;
        stream
            .write_all(&encode_status_response(json).unwrap())
            .await
            .unwrap();
    })
    .await;

    let status = client.status().await.unwrap();
    assert_eq!(status.players.online, 4);
    assert_eq!(status.players.max, 20);
}

#[tokio::test]
async fn status_with_invalid_json_is_protocol_error() {
    let client = spawn_server(|mut stream| async move {
        expect_status_handshake(&mut stream).await;
        let _ = read_frame(&mut stream).await.unwrap();
        stream
            .write_all(&encode_status_response("{not json").unwrap())
            .await
            .unwrap();
    })
    .await;

    assert!(matches!(
        client.status().await,
        Err(ClientError::Protocol(ProtocolError::StatusJson(_)))
    ));
}

#[tokio::test]
async fn status_times_out_when_server_is_silent() {
    let client = spawn_server(|mut stream| async move {
        expect_status_handshake(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await
    .with_timeout(Duration::from_millis(100));

    assert!(matches!(client.status().await, Err(ClientError::Timeout(_))));
}

// ========================================================================
// Ping exchange
// ========================================================================

#[tokio::test]
async fn ping_accepts_echoed_payload() {
    let client = spawn_server(|mut stream| async move {
        expect_status_handshake(&mut stream).await;
        let ping = read_frame(&mut stream).await.unwrap();
        let (packet_id, payload) = split_packet(&ping).unwrap();
        assert_eq!(packet_id, crate::protocol::PING_PACKET_ID);

        let mut raw = [0u8; 8];
        raw.copy_from_slice(payload);
        stream
            .write_all(&encode_pong(i64::from_be_bytes(raw)).unwrap())
            .await
            .unwrap();
    })
    .await;

    assert!(client.ping().await.is_ok());
}

#[tokio::test]
async fn ping_rejects_mismatched_pong() {
    let client = spawn_server(|mut stream| async move {
        expect_status_handshake(&mut stream).await;
        let _ = read_frame(&mut stream).await.unwrap();
        stream.write_all(&encode_pong(-42).unwrap()).await.unwrap();
    })
    .await;

    assert!(matches!(
        client.ping().await,
        Err(ClientError::PongMismatch { received: -42, .. })
    ));
}

#[tokio::test]
async fn ping_to_closed_port_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = StatusClient::new("127.0.0.1", port);
    assert!(matches!(
        client.ping().await,
        Err(ClientError::Connect { .. })
    ));
}

#[test]
fn address_joins_host_and_port() {
    assert_eq!(StatusClient::new("mc.local", 25565).address(), "mc.local:25565");
}
