use std::fmt::Debug;
use std::fs;

use clap::{Parser, ValueEnum};
use client::{Client, MatchMakeError, Message, MessageType, Room, RoomEvent};
use log::{debug, error, info, warn};
use shared::schema::SchemaDefinition;
use shared::{NoneSerializer, SchemaSerializer, Serializer};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Method {
    JoinOrCreate,
    Join,
    Create,
    JoinById,
    Reconnect,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Room server endpoint
    #[arg(short = 'e', long, default_value = "ws://localhost:2567")]
    endpoint: String,

    /// Room name, or room id for join-by-id and reconnect
    #[arg(short = 'r', long)]
    room: String,

    #[arg(short = 'm', long, value_enum, default_value = "join-or-create")]
    method: Method,

    /// Join options as JSON
    #[arg(short = 'o', long, default_value = "{}")]
    options: String,

    /// Previous session id, required by reconnect
    #[arg(long)]
    session_id: Option<String>,

    /// JSON schema description of the room state
    #[arg(long)]
    schema: Option<String>,

    /// Message types to log payloads for
    #[arg(long = "listen")]
    listen: Vec<String>,

    /// Message type to send once joined
    #[arg(long)]
    send: Option<String>,

    /// JSON payload for --send
    #[arg(long, requires = "send")]
    payload: Option<String>,
}

fn message_type(text: &str) -> MessageType {
    match text.parse::<i32>() {
        Ok(code) => MessageType::Code(code),
        Err(_) => MessageType::Name(text.to_string()),
    }
}

async fn join<S: Serializer>(
    client: &Client,
    args: &Args,
    options: serde_json::Value,
    serializer: S,
) -> Result<Room<S>, MatchMakeError> {
    match args.method {
        Method::JoinOrCreate => client.join_or_create(&args.room, options, serializer).await,
        Method::Join => client.join(&args.room, options, serializer).await,
        Method::Create => client.create(&args.room, options, serializer).await,
        Method::JoinById => client.join_by_id(&args.room, options, serializer).await,
        Method::Reconnect => {
            let session_id = args.session_id.as_deref().unwrap_or_default();
            client.reconnect(&args.room, session_id, serializer).await
        }
    }
}

async fn play<S>(args: &Args, serializer: S) -> Result<(), Box<dyn std::error::Error>>
where
    S: Serializer + 'static,
    S::State: Debug,
    S::Change: Debug,
{
    let options: serde_json::Value = serde_json::from_str(&args.options)?;
    let client = Client::new(args.endpoint.as_str());

    info!("Requesting seat in '{}' via {:?}", args.room, args.method);
    let mut room = join(&client, args, options, serializer).await?;
    info!(
        "Joined room {} (session {}, serializer '{}')",
        room.id, room.session_id, room.serializer_id
    );

    room.on_leave(|code| info!("Left room with code {}", code));
    room.on_error(|code, message| error!("Room error {}: {}", code, message));
    room.on_state_change(|state, changes| {
        info!("State changed ({} change(s))", changes.len());
        for change in changes {
            debug!("  {:?}", change);
        }
        debug!("State: {:?}", state);
    });

    for listened in &args.listen {
        let label = listened.clone();
        room.on_message(message_type(listened), move |message: &Message| {
            match message.to_json() {
                Ok(payload) => info!("[{}] {}", label, payload),
                Err(e) => warn!("[{}] undecodable payload: {}", label, e),
            }
        });
    }

    if let Some(send) = &args.send {
        match &args.payload {
            Some(payload) => {
                let payload: serde_json::Value = serde_json::from_str(payload)?;
                room.send_with(message_type(send), &payload)?;
            }
            None => room.send(message_type(send))?,
        }
        info!("Sent '{}'", send);
    }

    info!("Press Ctrl+C to leave");
    let mut leaving = false;

    loop {
        tokio::select! {
            event = room.poll_event() => match event {
                None => break,
                Some(RoomEvent::Invalid { reason }) => warn!("Invalid frame: {}", reason),
                Some(RoomEvent::LeaveRequested) => info!("Server asked us to leave"),
                Some(event) => debug!("{:?}", event),
            },
            _ = tokio::signal::ctrl_c() => {
                if leaving {
                    warn!("Closing room socket");
                    room.leave(false)?;
                } else {
                    info!("Leaving room...");
                    leaving = true;
                    room.leave(true)?;
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.method == Method::Reconnect && args.session_id.is_none() {
        return Err("--session-id is required for reconnect".into());
    }

    info!("Connecting to: {}", args.endpoint);

    match &args.schema {
        Some(path) => {
            let definition = SchemaDefinition::from_json(&fs::read_to_string(path)?)?;
            let root = definition.build()?;
            info!("Using schema '{}' from {}", root.name(), path);
            play(&args, SchemaSerializer::new(root)).await
        }
        None => play(&args, NoneSerializer).await,
    }
}
