//! Matchmaking client
//!
//! Seats are reserved over HTTP (`POST /matchmake/{method}/{room}`); the
//! reservation names the room and process to open the room socket on. The
//! returned [`Room`] has already received `JOIN_ROOM`.

use log::{debug, info, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::protocol::CLOSE_CONNECTION_ERROR;
use shared::Serializer;

use crate::error::{ClientError, MatchMakeError};
use crate::room::{Room, RoomEvent};

const NO_RESPONSE: &str = "HttpRequest => no/invalid response";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReservedRoom {
    pub room_id: String,
    pub process_id: String,
}

/// Successful matchmaking response
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatReservation {
    pub room: ReservedRoom,
    pub session_id: String,
}

/// Entry of the room listing
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomAvailable {
    pub room_id: String,
    #[serde(default)]
    pub clients: u32,
    #[serde(default)]
    pub max_clients: u32,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct Client {
    endpoint: String,
    http: reqwest::Client,
}

impl Client {
    /// Creates a client for a `ws://` or `wss://` endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_http_client(endpoint, reqwest::Client::new())
    }

    pub fn with_http_client(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { endpoint, http }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The endpoint with its socket scheme swapped for the HTTP one
    pub fn http_endpoint(&self) -> String {
        if let Some(rest) = self.endpoint.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = self.endpoint.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else {
            self.endpoint.clone()
        }
    }

    pub async fn join_or_create<S: Serializer>(
        &self,
        room_name: &str,
        options: Value,
        serializer: S,
    ) -> Result<Room<S>, MatchMakeError> {
        self.matchmake("joinOrCreate", room_name, options, serializer)
            .await
    }

    pub async fn join<S: Serializer>(
        &self,
        room_name: &str,
        options: Value,
        serializer: S,
    ) -> Result<Room<S>, MatchMakeError> {
        self.matchmake("join", room_name, options, serializer).await
    }

    pub async fn create<S: Serializer>(
        &self,
        room_name: &str,
        options: Value,
        serializer: S,
    ) -> Result<Room<S>, MatchMakeError> {
        self.matchmake("create", room_name, options, serializer)
            .await
    }

    pub async fn join_by_id<S: Serializer>(
        &self,
        room_id: &str,
        options: Value,
        serializer: S,
    ) -> Result<Room<S>, MatchMakeError> {
        self.matchmake("joinById", room_id, options, serializer)
            .await
    }

    /// Rejoins a room with a previous session id
    pub async fn reconnect<S: Serializer>(
        &self,
        room_id: &str,
        session_id: &str,
        serializer: S,
    ) -> Result<Room<S>, MatchMakeError> {
        self.join_by_id(room_id, json!({ "sessionId": session_id }), serializer)
            .await
    }

    /// Lists the rooms currently open under `room_name`
    pub async fn get_available_rooms(
        &self,
        room_name: &str,
    ) -> Result<Vec<RoomAvailable>, ClientError> {
        let url = endpoint_url(&self.http_endpoint(), &["matchmake", room_name])
            .map_err(ClientError::InvalidEndpoint)?;
        let rooms = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<RoomAvailable>>()
            .await?;
        Ok(rooms)
    }

    /// Reserves a seat without joining
    pub async fn reserve_seat(
        &self,
        method: &str,
        room_name: &str,
        options: &Value,
    ) -> Result<SeatReservation, MatchMakeError> {
        let url = endpoint_url(&self.http_endpoint(), &["matchmake", method, room_name])
            .map_err(|e| MatchMakeError::new(0, e))?;
        let body = if options.is_null() {
            "{}".to_string()
        } else {
            options.to_string()
        };
        debug!("POST {} {}", url, body);

        let response = self
            .http
            .post(url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Matchmaking request to {} failed: {}", url, e);
                MatchMakeError::new(0, NO_RESPONSE)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchMakeError::new(status.as_u16() as i32, "Server Error"));
        }

        let text = response
            .text()
            .await
            .map_err(|_| MatchMakeError::new(0, NO_RESPONSE))?;
        let data: Value =
            serde_json::from_str(&text).map_err(|e| MatchMakeError::new(0, e.to_string()))?;

        if let Some(message) = data.get("error").and_then(Value::as_str) {
            let code = data.get("code").and_then(Value::as_i64).unwrap_or(0) as i32;
            return Err(MatchMakeError::new(code, message));
        }

        serde_json::from_value(data).map_err(|e| MatchMakeError::new(0, e.to_string()))
    }

    /// `{endpoint}/{processId}/{roomId}?sessionId={sessionId}`
    pub fn room_socket_url(&self, reservation: &SeatReservation) -> Result<Url, String> {
        let mut url = endpoint_url(
            &self.endpoint,
            &[
                reservation.room.process_id.as_str(),
                reservation.room.room_id.as_str(),
            ],
        )?;
        url.query_pairs_mut()
            .append_pair("sessionId", &reservation.session_id);
        Ok(url)
    }

    async fn matchmake<S: Serializer>(
        &self,
        method: &str,
        room_name: &str,
        options: Value,
        serializer: S,
    ) -> Result<Room<S>, MatchMakeError> {
        let reservation = self.reserve_seat(method, room_name, &options).await?;
        let url = self
            .room_socket_url(&reservation)
            .map_err(|e| MatchMakeError::new(CLOSE_CONNECTION_ERROR as i32, e))?;

        let mut room = Room::new(room_name, serializer);
        room.id = reservation.room.room_id;
        room.session_id = reservation.session_id;

        room.connect(url.as_str()).await.map_err(|e| {
            warn!("Could not open room socket {}: {}", url, e);
            MatchMakeError::new(CLOSE_CONNECTION_ERROR as i32, e.to_string())
        })?;

        loop {
            match room.poll_event().await {
                Some(RoomEvent::Joined) => {
                    info!("Seat in {} confirmed ({})", room_name, room.session_id);
                    return Ok(room);
                }
                Some(RoomEvent::Error { code, message }) => {
                    return Err(MatchMakeError::new(code, message))
                }
                Some(RoomEvent::Left { code, reason }) => {
                    return Err(MatchMakeError::new(code as i32, reason))
                }
                Some(_) => continue,
                None => {
                    return Err(MatchMakeError::new(
                        CLOSE_CONNECTION_ERROR as i32,
                        "room connection closed before join",
                    ))
                }
            }
        }
    }
}

/// Appends percent-encoded path segments to `base`
fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("invalid endpoint {}: {}", base, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("endpoint {} cannot take a path", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
