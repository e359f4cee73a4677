//! A joined (or joining) room
//!
//! [`Room`] owns the room socket and the state serializer. Frames are
//! processed one at a time through [`Room::poll_event`]; each call invokes
//! the matching callbacks and returns a [`RoomEvent`] describing what
//! happened, so callers can either register callbacks or match on events.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::Serialize;
use shared::protocol::{CLOSE_CONNECTION_ERROR, CLOSE_NORMAL, CLOSE_NOT_JOINED};
use shared::{Cursor, Protocol, Serializer};

use crate::connection::{Connection, ConnectionEvent};
use crate::error::{ClientError, Result};
use crate::message::{encode_frame, Message, MessageType};

type JoinCallback = Box<dyn FnMut() + Send>;
type LeaveCallback = Box<dyn FnMut(u16) + Send>;
type ErrorCallback = Box<dyn FnMut(i32, &str) + Send>;
type StateCallback<S> =
    Box<dyn FnMut(&<S as Serializer>::State, &[<S as Serializer>::Change]) + Send>;
type MessageHandler = Box<dyn FnMut(&Message) + Send>;

/// Outcome of processing one connection event
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Joined,
    Error { code: i32, message: String },
    Left { code: u16, reason: String },
    StateChanged,
    Message {
        message_type: MessageType,
        message: Message,
    },
    LeaveRequested,
    Ignored,
    /// Frame that could not be decoded
    Invalid { reason: String },
}

pub struct Room<S: Serializer> {
    pub id: String,
    pub name: String,
    pub session_id: String,
    /// Serializer announced by the server on join
    pub serializer_id: String,

    serializer: S,
    connection: Option<Connection>,
    has_joined: bool,

    on_join: Option<JoinCallback>,
    on_leave: Option<LeaveCallback>,
    on_error: Option<ErrorCallback>,
    on_state_change: Option<StateCallback<S>>,
    handlers: HashMap<String, MessageHandler>,
}

impl<S: Serializer> Room<S> {
    pub fn new(name: impl Into<String>, serializer: S) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            session_id: String::new(),
            serializer_id: String::new(),
            serializer,
            connection: None,
            has_joined: false,
            on_join: None,
            on_leave: None,
            on_error: None,
            on_state_change: None,
            handlers: HashMap::new(),
        }
    }

    pub async fn connect(&mut self, url: &str) -> Result<()> {
        self.connection = Some(Connection::connect(url).await?);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn attach(&mut self, connection: Connection) {
        self.connection = Some(connection);
    }

    pub fn state(&self) -> &S::State {
        self.serializer.state()
    }

    pub fn has_joined(&self) -> bool {
        self.has_joined
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn on_join(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_join = Some(Box::new(callback));
    }

    pub fn on_leave(&mut self, callback: impl FnMut(u16) + Send + 'static) {
        self.on_leave = Some(Box::new(callback));
    }

    pub fn on_error(&mut self, callback: impl FnMut(i32, &str) + Send + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    pub fn on_state_change(
        &mut self,
        callback: impl FnMut(&S::State, &[S::Change]) + Send + 'static,
    ) {
        self.on_state_change = Some(Box::new(callback));
    }

    /// Registers the handler for one message type, replacing any previous one
    pub fn on_message(
        &mut self,
        message_type: impl Into<MessageType>,
        handler: impl FnMut(&Message) + Send + 'static,
    ) {
        self.handlers
            .insert(message_type.into().handler_key(), Box::new(handler));
    }

    /// Leaves the room
    ///
    /// A consented leave asks the server to remove us; otherwise the socket is
    /// closed directly. A room that was never assigned an id only reports the
    /// leave locally.
    pub fn leave(&mut self, consented: bool) -> Result<()> {
        if self.id.is_empty() {
            self.emit_leave(CLOSE_NOT_JOINED);
            return Ok(());
        }

        let connection = self.connection.as_ref().ok_or(ClientError::ConnectionClosed)?;
        if consented {
            connection.send(vec![Protocol::LeaveRoom.code()])
        } else {
            connection.close(CLOSE_NORMAL, "")
        }
    }

    /// Sends a message with no payload
    pub fn send(&self, message_type: impl Into<MessageType>) -> Result<()> {
        let frame = encode_frame::<()>(Protocol::RoomData.code(), &message_type.into(), None)?;
        self.send_raw(frame)
    }

    /// Sends a message with a MessagePack-encoded payload
    pub fn send_with<T: Serialize + ?Sized>(
        &self,
        message_type: impl Into<MessageType>,
        message: &T,
    ) -> Result<()> {
        let frame =
            encode_frame(Protocol::RoomData.code(), &message_type.into(), Some(message))?;
        self.send_raw(frame)
    }

    fn send_raw(&self, frame: Vec<u8>) -> Result<()> {
        self.connection
            .as_ref()
            .ok_or(ClientError::ConnectionClosed)?
            .send(frame)
    }

    /// Waits for and processes the next connection event
    ///
    /// Returns `None` once the connection is gone.
    pub async fn poll_event(&mut self) -> Option<RoomEvent> {
        let event = self.connection.as_mut()?.recv().await;

        let room_event = match event {
            Some(ConnectionEvent::Message(bytes)) => match self.handle_message(&bytes) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Room {}: dropping invalid frame: {}", self.name, e);
                    RoomEvent::Invalid {
                        reason: e.to_string(),
                    }
                }
            },
            Some(ConnectionEvent::Error(message)) => self.handle_error(message),
            Some(ConnectionEvent::Close { code, reason, .. }) => self.handle_close(code, reason),
            None => self.handle_close(shared::protocol::CLOSE_ABNORMAL, String::new()),
        };

        Some(room_event)
    }

    /// Processes events until the room is closed
    pub async fn run(&mut self) {
        while self.poll_event().await.is_some() {}
    }

    /// Dispatches one incoming frame on its protocol code
    pub fn handle_message(&mut self, bytes: &[u8]) -> Result<RoomEvent> {
        let mut cursor = Cursor::new(bytes);
        let code = cursor.decode_uint8()?;

        let protocol = match Protocol::try_from(code) {
            Ok(protocol) => protocol,
            Err(_) => {
                debug!("Room {}: ignoring frame with code {}", self.name, code);
                return Ok(RoomEvent::Ignored);
            }
        };

        match protocol {
            Protocol::JoinRoom => {
                self.serializer_id = cursor.decode_string()?;
                if self.serializer_id != S::ID {
                    warn!(
                        "Room {}: server uses serializer '{}', local serializer is '{}'",
                        self.name,
                        self.serializer_id,
                        S::ID
                    );
                }

                if cursor.has_remaining() {
                    self.serializer.handshake(cursor.remaining())?;
                }

                self.has_joined = true;
                info!("Joined room {} ({})", self.name, self.id);
                if let Some(callback) = self.on_join.as_mut() {
                    callback();
                }

                self.send_raw(vec![Protocol::JoinRoom.code()])?;
                Ok(RoomEvent::Joined)
            }

            Protocol::JoinError => {
                let code = cursor.decode_number()? as i32;
                let message = cursor.decode_string()?;
                warn!("Room {}: join error {}: {}", self.name, code, message);
                if let Some(callback) = self.on_error.as_mut() {
                    callback(code, &message);
                }
                Ok(RoomEvent::Error { code, message })
            }

            Protocol::LeaveRoom => {
                self.leave(true)?;
                Ok(RoomEvent::LeaveRequested)
            }

            Protocol::RoomData => {
                let message_type = if cursor.number_check() {
                    MessageType::Code(cursor.decode_number()? as i32)
                } else {
                    MessageType::Name(cursor.decode_string()?)
                };
                let message = Message::new(cursor.remaining().to_vec());

                match self.handlers.get_mut(&message_type.handler_key()) {
                    Some(handler) => handler(&message),
                    None => warn!(
                        "Room {}: no handler for message type '{}'",
                        self.name, message_type
                    ),
                }

                Ok(RoomEvent::Message {
                    message_type,
                    message,
                })
            }

            Protocol::RoomState => {
                let changes = self.serializer.set_state(cursor.remaining())?;
                self.emit_state_change(&changes);
                Ok(RoomEvent::StateChanged)
            }

            Protocol::RoomStatePatch => {
                let changes = self.serializer.patch(cursor.remaining())?;
                self.emit_state_change(&changes);
                Ok(RoomEvent::StateChanged)
            }

            other => {
                debug!("Room {}: ignoring {:?} frame", self.name, other);
                Ok(RoomEvent::Ignored)
            }
        }
    }

    fn handle_error(&mut self, message: String) -> RoomEvent {
        let code = CLOSE_CONNECTION_ERROR as i32;
        if let Some(callback) = self.on_error.as_mut() {
            callback(code, &message);
        }
        RoomEvent::Error { code, message }
    }

    fn handle_close(&mut self, code: u16, reason: String) -> RoomEvent {
        info!("Room {} closed with code {}", self.name, code);
        self.connection = None;

        if !self.has_joined {
            if let Some(callback) = self.on_error.as_mut() {
                callback(code as i32, &reason);
            }
        }
        self.has_joined = false;
        self.emit_leave(code);
        self.serializer.teardown();

        RoomEvent::Left { code, reason }
    }

    fn emit_leave(&mut self, code: u16) {
        if let Some(callback) = self.on_leave.as_mut() {
            callback(code);
        }
    }

    fn emit_state_change(&mut self, changes: &[S::Change]) {
        if let Some(callback) = self.on_state_change.as_mut() {
            callback(self.serializer.state(), changes);
        }
    }
}
