//! # Room Client Library
//!
//! Async client for a room-based multiplayer server. Seats are reserved over
//! HTTP and rooms are then played over a WebSocket carrying binary frames.
//!
//! ## Architecture Overview
//!
//! ### Matchmaking
//! [`Client`] posts join requests to the matchmaker and turns the returned
//! seat reservation into a connected [`Room`]. Failures at any step surface
//! as a [`MatchMakeError`] carrying an HTTP status, matchmaker code or close
//! code.
//!
//! ### Room Session
//! A [`Room`] owns its socket and state serializer. Every incoming frame is
//! dispatched on its protocol code: join confirmations, user messages and
//! state snapshots or patches. Callbacks fire as frames are processed, and
//! each processed frame is also returned as a [`RoomEvent`].
//!
//! ### Transport
//! The socket runs in its own reader and writer tasks
//! ([`connection`]), so sending never waits on receiving.
//!
//! ## Module Organization
//!
//! - [`client`]: matchmaking requests and room listings
//! - [`room`]: frame dispatch, callbacks and outgoing user messages
//! - [`message`]: user message types and MessagePack payloads
//! - [`connection`]: WebSocket reader/writer tasks
//! - [`error`]: [`ClientError`] and [`MatchMakeError`]
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{Client, Message};
//! use shared::NoneSerializer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("ws://localhost:2567");
//! let mut room = client
//!     .join_or_create("lobby", serde_json::json!({}), NoneSerializer)
//!     .await?;
//!
//! room.on_message("chat", |message: &Message| {
//!     println!("{:?}", message.to_json());
//! });
//! room.send_with("chat", "hello")?;
//! room.run().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod message;
pub mod room;

pub use client::{Client, RoomAvailable, SeatReservation};
pub use error::{ClientError, MatchMakeError};
pub use message::{Message, MessageType};
pub use room::{Room, RoomEvent};
