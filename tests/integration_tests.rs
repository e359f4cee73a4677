//! Integration tests for matchmaking and room sessions
//!
//! These tests run the client against an in-process room server that answers
//! matchmaking requests and room sockets on a single port.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_approx_eq::assert_approx_eq;
use client::{Client, MatchMakeError, Message, Room, RoomEvent};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use shared::encode::{encode_number, encode_string};
use shared::schema::{ChildType, FieldType, PrimitiveType, SchemaType};
use shared::{NoneSerializer, Protocol, SchemaSerializer, Serializer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

type Socket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

/// IN-PROCESS ROOM SERVER
mod support {
    use super::*;

    pub struct RoomServer {
        pub endpoint: String,
        /// Request line and body of every matchmaking request
        pub requests: Arc<Mutex<Vec<(String, String)>>>,
        /// Request URIs of accepted room sockets
        pub socket_paths: Arc<Mutex<Vec<String>>>,
        script: oneshot::Receiver<JoinHandle<()>>,
    }

    impl RoomServer {
        /// Waits for the room socket script and propagates its panics
        pub async fn finish(self) {
            let script = timeout(WAIT, self.script)
                .await
                .expect("room socket never opened")
                .expect("server stopped");
            timeout(WAIT, script)
                .await
                .expect("room script timed out")
                .expect("room script failed");
        }
    }

    pub async fn start_server<F, Fut>(matchmake: (u16, Value), script: F) -> RoomServer
    where
        F: FnOnce(Socket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let socket_paths = Arc::new(Mutex::new(Vec::new()));
        let (script_tx, script_rx) = oneshot::channel();

        let server_requests = Arc::clone(&requests);
        let server_paths = Arc::clone(&socket_paths);

        tokio::spawn(async move {
            let mut script = Some(script);
            let mut script_tx = Some(script_tx);

            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };

                if is_matchmake_request(&stream).await {
                    let request = read_http_request(&mut stream).await;
                    server_requests.lock().unwrap().push(request);
                    write_http_response(&mut stream, matchmake.0, &matchmake.1).await;
                    continue;
                }

                let Some(script) = script.take() else {
                    continue;
                };

                let paths = Arc::clone(&server_paths);
                let callback = move |request: &Request,
                                     response: Response|
                      -> Result<Response, ErrorResponse> {
                    paths.lock().unwrap().push(request.uri().to_string());
                    Ok(response)
                };
                let socket = accept_hdr_async(stream, callback).await.unwrap();

                let handle = tokio::spawn(script(socket));
                if let Some(sender) = script_tx.take() {
                    let _ = sender.send(handle);
                }
            }
        });

        RoomServer {
            endpoint,
            requests,
            socket_paths,
            script: script_rx,
        }
    }

    async fn is_matchmake_request(stream: &TcpStream) -> bool {
        let mut buffer = [0u8; 512];
        loop {
            let read = stream.peek(&mut buffer).await.unwrap_or(0);
            if read == 0 {
                return false;
            }
            let head = &buffer[..read];
            if let Some(end) = head.windows(2).position(|window| window == b"\r\n") {
                return String::from_utf8_lossy(&head[..end]).contains("/matchmake/");
            }
            if read == buffer.len() {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    async fn read_http_request(stream: &mut TcpStream) -> (String, String) {
        let mut data = Vec::new();
        let mut chunk = [0u8; 1024];

        let header_end = loop {
            let read = stream.read(&mut chunk).await.unwrap();
            data.extend_from_slice(&chunk[..read]);
            if let Some(position) = data.windows(4).position(|window| window == b"\r\n\r\n") {
                break position + 4;
            }
            if read == 0 {
                break data.len();
            }
        };

        let head = String::from_utf8_lossy(&data[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while data.len() < header_end + content_length {
            let read = stream.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
        }

        let request_line = head.lines().next().unwrap_or_default().to_string();
        let body = String::from_utf8_lossy(&data[header_end..]).to_string();
        (request_line, body)
    }

    async fn write_http_response(stream: &mut TcpStream, status: u16, body: &Value) {
        let body = body.to_string();
        let response = format!(
            "HTTP/1.1 {} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
    }

    pub fn reservation(room_id: &str, process_id: &str, session_id: &str) -> (u16, Value) {
        (
            200,
            json!({
                "room": { "roomId": room_id, "processId": process_id, "name": "battle" },
                "sessionId": session_id
            }),
        )
    }

    pub fn join_frame(serializer_id: &str) -> WsMessage {
        let mut frame = vec![Protocol::JoinRoom.code()];
        encode_string(&mut frame, serializer_id);
        WsMessage::Binary(frame)
    }

    pub async fn next_binary(socket: &mut Socket) -> Vec<u8> {
        loop {
            match socket.next().await {
                Some(Ok(WsMessage::Binary(bytes))) => return bytes,
                Some(Ok(_)) => continue,
                other => panic!("expected a binary frame, got {:?}", other),
            }
        }
    }

    pub async fn close(socket: &mut Socket, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = socket.close(Some(frame)).await;
    }

    /// Polls the room until an event matches, failing on timeout or close
    pub async fn wait_for<S: Serializer>(
        room: &mut Room<S>,
        accept: impl Fn(&RoomEvent) -> bool,
    ) -> RoomEvent {
        timeout(WAIT, async {
            loop {
                match room.poll_event().await {
                    Some(event) if accept(&event) => return event,
                    Some(_) => continue,
                    None => panic!("room connection ended early"),
                }
            }
        })
        .await
        .expect("timed out waiting for room event")
    }
}

use support::*;

fn battle_state() -> Arc<SchemaType> {
    let player = SchemaType::builder("Player")
        .primitive("name", PrimitiveType::String)
        .primitive("x", PrimitiveType::Float32)
        .build();

    SchemaType::builder("State")
        .field("players", FieldType::Map(ChildType::Schema(player)))
        .primitive("turn", PrimitiveType::Uint8)
        .build()
}

fn player_state_frame(code: Protocol, key: &str, name: Option<&str>, x: f32) -> Vec<u8> {
    let mut frame = vec![code.code(), 0x00];
    encode_number(&mut frame, 1);
    encode_string(&mut frame, key);
    if let Some(name) = name {
        frame.push(0x00);
        encode_string(&mut frame, name);
    }
    frame.push(0x01);
    frame.extend_from_slice(&x.to_le_bytes());
    frame.push(shared::protocol::END_OF_STRUCTURE);
    frame
}

/// FULL SESSION TESTS
mod session_tests {
    use super::*;

    /// Tests a join, state sync, message exchange and consented leave end to end
    #[tokio::test]
    async fn join_sync_and_leave() {
        let server = start_server(reservation("r1", "p1", "s1"), |mut socket| async move {
            socket.send(join_frame("schema")).await.unwrap();
            assert_eq!(next_binary(&mut socket).await, vec![Protocol::JoinRoom.code()]);

            let mut state = player_state_frame(Protocol::RoomState, "p1", Some("ada"), 1.5);
            state.push(0x01);
            state.push(7);
            socket.send(WsMessage::Binary(state)).await.unwrap();

            let mut chat = vec![Protocol::RoomData.code()];
            encode_string(&mut chat, "chat");
            chat.extend(rmp_serde::to_vec("hi there").unwrap());
            socket.send(WsMessage::Binary(chat)).await.unwrap();

            let moved = next_binary(&mut socket).await;
            assert_eq!(&moved[..6], &[13, 0xa4, b'm', b'o', b'v', b'e']);
            let payload: Value = rmp_serde::from_slice(&moved[6..]).unwrap();
            assert_eq!(payload, json!({ "x": 2.5 }));

            let patch = player_state_frame(Protocol::RoomStatePatch, "p1", None, 2.5);
            socket.send(WsMessage::Binary(patch)).await.unwrap();

            assert_eq!(next_binary(&mut socket).await, vec![Protocol::LeaveRoom.code()]);
            close(&mut socket, 1000, "").await;
        })
        .await;

        let client = Client::new(server.endpoint.clone());
        let mut room = timeout(
            WAIT,
            client.join_or_create(
                "battle",
                json!({ "mode": "duo" }),
                SchemaSerializer::new(battle_state()),
            ),
        )
        .await
        .expect("join timed out")
        .expect("join failed");

        assert_eq!(room.id, "r1");
        assert_eq!(room.session_id, "s1");
        assert_eq!(room.serializer_id, "schema");
        assert!(room.has_joined());

        let chats = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chats);
        room.on_message("chat", move |message: &Message| {
            sink.lock().unwrap().push(message.decode::<String>().unwrap());
        });
        let left = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&left);
        room.on_leave(move |code| *sink.lock().unwrap() = Some(code));

        wait_for(&mut room, |event| *event == RoomEvent::StateChanged).await;
        {
            let players = room.state().get_map("players").unwrap();
            let ada = players.at("p1").and_then(|value| value.as_schema()).unwrap();
            assert_eq!(ada.get_str("name"), Some("ada"));
            assert_approx_eq!(ada.get_number("x").unwrap(), 1.5);
            assert_eq!(room.state().get_number("turn"), Some(7.0));
        }

        wait_for(&mut room, |event| matches!(event, RoomEvent::Message { .. })).await;
        assert_eq!(*chats.lock().unwrap(), vec!["hi there".to_string()]);

        room.send_with("move", &json!({ "x": 2.5 })).unwrap();

        wait_for(&mut room, |event| *event == RoomEvent::StateChanged).await;
        {
            let players = room.state().get_map("players").unwrap();
            let ada = players.at("p1").and_then(|value| value.as_schema()).unwrap();
            assert_approx_eq!(ada.get_number("x").unwrap(), 2.5);
            assert_eq!(ada.get_str("name"), Some("ada"));
        }

        room.leave(true).unwrap();
        let event = wait_for(&mut room, |event| matches!(event, RoomEvent::Left { .. })).await;
        assert!(matches!(event, RoomEvent::Left { code: 1000, .. }));
        assert_eq!(*left.lock().unwrap(), Some(1000));
        assert!(!room.is_connected());

        let requests = server.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].0.starts_with("POST /matchmake/joinOrCreate/battle "));
        let body: Value = serde_json::from_str(&requests[0].1).unwrap();
        assert_eq!(body, json!({ "mode": "duo" }));
        assert_eq!(
            *server.socket_paths.lock().unwrap(),
            vec!["/p1/r1?sessionId=s1".to_string()]
        );

        server.finish().await;
    }

    /// Tests the server-initiated leave handshake
    #[tokio::test]
    async fn server_requested_leave() {
        let server = start_server(reservation("r2", "p9", "s2"), |mut socket| async move {
            socket.send(join_frame("none")).await.unwrap();
            assert_eq!(next_binary(&mut socket).await, vec![Protocol::JoinRoom.code()]);

            socket
                .send(WsMessage::Binary(vec![Protocol::LeaveRoom.code()]))
                .await
                .unwrap();
            assert_eq!(next_binary(&mut socket).await, vec![Protocol::LeaveRoom.code()]);
            close(&mut socket, 1000, "bye").await;
        })
        .await;

        let client = Client::new(server.endpoint.clone());
        let mut room = timeout(WAIT, client.create("lobby", Value::Null, NoneSerializer))
            .await
            .unwrap()
            .unwrap();

        wait_for(&mut room, |event| *event == RoomEvent::LeaveRequested).await;
        let event = wait_for(&mut room, |event| matches!(event, RoomEvent::Left { .. })).await;
        assert_eq!(
            event,
            RoomEvent::Left {
                code: 1000,
                reason: "bye".to_string()
            }
        );
        assert_eq!(room.poll_event().await, None);

        let requests = server.requests.lock().unwrap().clone();
        assert_eq!(requests[0].1, "{}");
        server.finish().await;
    }

    /// Tests that reconnect rejoins by id with the previous session
    #[tokio::test]
    async fn reconnect_sends_session_id() {
        let server = start_server(reservation("r3", "p3", "old-session"), |mut socket| async move {
            socket.send(join_frame("none")).await.unwrap();
            assert_eq!(next_binary(&mut socket).await, vec![Protocol::JoinRoom.code()]);
            close(&mut socket, 1000, "").await;
        })
        .await;

        let client = Client::new(format!("{}/", server.endpoint));
        let room = timeout(WAIT, client.reconnect("r3", "old-session", NoneSerializer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(room.session_id, "old-session");

        let requests = server.requests.lock().unwrap().clone();
        assert!(requests[0].0.starts_with("POST /matchmake/joinById/r3 "));
        let body: Value = serde_json::from_str(&requests[0].1).unwrap();
        assert_eq!(body, json!({ "sessionId": "old-session" }));
        server.finish().await;
    }
}

/// JOIN FAILURE TESTS
mod failure_tests {
    use super::*;

    /// Tests that a JOIN_ERROR frame fails the join with the server's code
    #[tokio::test]
    async fn join_error_frame() {
        let server = start_server(reservation("r1", "p1", "s1"), |mut socket| async move {
            let mut frame = vec![Protocol::JoinError.code()];
            encode_number(&mut frame, 4212);
            encode_string(&mut frame, "room is locked");
            socket.send(WsMessage::Binary(frame)).await.unwrap();
            close(&mut socket, 4212, "room is locked").await;
        })
        .await;

        let client = Client::new(server.endpoint.clone());
        let error = timeout(WAIT, client.join("battle", json!({}), NoneSerializer))
            .await
            .unwrap()
            .err()
            .unwrap();
        assert_eq!(error, MatchMakeError::new(4212, "room is locked"));
        server.finish().await;
    }

    /// Tests a socket closed by the server before JOIN_ROOM arrives
    #[tokio::test]
    async fn closed_before_join() {
        let server = start_server(reservation("r1", "p1", "s1"), |mut socket| async move {
            close(&mut socket, 4002, "seat expired").await;
        })
        .await;

        let client = Client::new(server.endpoint.clone());
        let error = timeout(WAIT, client.join("battle", json!({}), NoneSerializer))
            .await
            .unwrap()
            .err()
            .unwrap();
        assert_eq!(error, MatchMakeError::new(4002, "seat expired"));
        server.finish().await;
    }

    /// Tests a matchmaker that answers with an error body
    #[tokio::test]
    async fn matchmaker_error_body() {
        let server = start_server(
            (200, json!({ "code": 4211, "error": "no rooms found" })),
            |_socket| async move {},
        )
        .await;

        let client = Client::new(server.endpoint.clone());
        let error = client
            .join("battle", json!({}), NoneSerializer)
            .await
            .err()
            .unwrap();
        assert_eq!(error, MatchMakeError::new(4211, "no rooms found"));
        assert!(server.socket_paths.lock().unwrap().is_empty());
    }

    /// Tests a matchmaker that answers with a failure status
    #[tokio::test]
    async fn matchmaker_failure_status() {
        let server = start_server((503, json!({})), |_socket| async move {}).await;

        let client = Client::new(server.endpoint.clone());
        let error = client
            .join_or_create("battle", json!({}), NoneSerializer)
            .await
            .err()
            .unwrap();
        assert_eq!(error, MatchMakeError::new(503, "Server Error"));
    }
}

/// STATE DIFF TESTS
mod compare_tests {
    use shared::compare::{get_patch_list_from_msgpack, PatchOperation};

    /// Tests diffing two message payloads as a client would receive them
    #[test]
    fn payload_diff() {
        let before = rmp_serde::to_vec_named(&serde_json::json!({
            "score": 10,
            "inventory": { "sword": 1 }
        }))
        .unwrap();
        let after = rmp_serde::to_vec_named(&serde_json::json!({
            "score": 12,
            "inventory": { "sword": 1, "shield": 1 }
        }))
        .unwrap();

        let patches = get_patch_list_from_msgpack(&before, &after).unwrap();
        let summary: Vec<(String, PatchOperation)> = patches
            .iter()
            .map(|patch| (patch.path.join("/"), patch.op))
            .collect();

        assert!(summary.contains(&("score".to_string(), PatchOperation::Replace)));
        assert!(summary.contains(&("inventory/shield".to_string(), PatchOperation::Add)));
        assert_eq!(summary.len(), 2);
    }
}
