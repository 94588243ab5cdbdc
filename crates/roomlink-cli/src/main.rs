mod command;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use roomlink_client::{
    ChannelState, ChatClient, ClientConfig, HistoryFetcher, HttpHistoryFetcher, SessionAccessor,
    StaticSession, Transport, Update, WsTransport,
};
use roomlink_types::models::{Message, User};

use command::{Command, HELP};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they stay out of the chat transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomlink=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let session = session_from_env()?;
    info!("Using API at {} and channels at {}", config.api_url, config.ws_url);

    let api = HttpHistoryFetcher::new(config.api_url.as_str(), session.clone());
    let transport = WsTransport::new(config.ws_url.as_str(), config.heartbeat_interval);
    let mut client = ChatClient::new(&config, api, transport, session);

    match client.refresh_rooms().await {
        Ok(()) => print_rooms(&client),
        Err(e) => warn!("Could not load rooms: {}", e),
    }
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => run(&mut client, command).await,
                    Ok(None) => {}
                    Err(e) => println!("! {}", e),
                }
            }
            update = client.next_update() => render(&client, update),
        }
    }

    client.shutdown();
    Ok(())
}

fn session_from_env() -> anyhow::Result<Arc<dyn SessionAccessor>> {
    let Ok(token) = std::env::var("ROOMLINK_TOKEN") else {
        warn!("ROOMLINK_TOKEN not set, running signed out");
        return Ok(Arc::new(StaticSession::signed_out()));
    };
    let id = std::env::var("ROOMLINK_USER_ID")
        .context("ROOMLINK_USER_ID is required with ROOMLINK_TOKEN")?
        .parse()
        .context("ROOMLINK_USER_ID must be an integer")?;
    let username =
        std::env::var("ROOMLINK_USERNAME").context("ROOMLINK_USERNAME is required with ROOMLINK_TOKEN")?;

    Ok(Arc::new(StaticSession::new(User { id, username }, token)))
}

async fn run<A: HistoryFetcher, T: Transport>(client: &mut ChatClient<A, T>, command: Command) {
    let result = match command {
        Command::Rooms => client.refresh_rooms().await.map(|()| print_rooms(client)),
        Command::Select(room_id) => client.select_room_id(room_id),
        Command::Close => {
            client.select_room(None);
            Ok(())
        }
        Command::Create {
            name,
            description,
            is_private,
        } => client
            .create_room(&name, description.as_deref(), is_private)
            .await
            .map(|room| println!("* created #{} {}", room.id, room.name)),
        Command::Join(room_id) => client.join_room(room_id).await.map(|()| print_rooms(client)),
        Command::Leave => match client.selected().map(|r| r.id) {
            Some(room_id) => client.leave_room(room_id).await,
            None => {
                println!("! no room selected");
                Ok(())
            }
        },
        Command::Who => {
            print_who(client);
            Ok(())
        }
        Command::Reconnect => {
            if !client.reconnect() {
                println!("! nothing to reconnect");
            }
            Ok(())
        }
        Command::Typing => {
            client.input_changed();
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Say(text) => client.send_message(&text).await.map(|sent| {
            if let Some(message) = sent {
                print_message(&message);
            }
        }),
        Command::Quit => Ok(()),
    };

    if let Err(e) = result {
        println!("! {}", e);
    }
}

fn render<A: HistoryFetcher, T: Transport>(client: &ChatClient<A, T>, update: Update) {
    match update {
        Update::Channel(ChannelState::Closed) => match client.snapshot().close_reason {
            Some(reason) => println!("* disconnected: {} (/reconnect to retry)", reason),
            None => println!("* disconnected"),
        },
        Update::Channel(state) => println!("* channel {}", state),
        Update::HistoryLoaded { count, .. } => {
            if let Some(room) = client.selected() {
                println!("--- #{} {} ({} messages) ---", room.id, room.name, count);
            }
            client.messages().iter().for_each(print_message);
        }
        Update::HistoryFailed { error, .. } => println!("! history unavailable: {}", error),
        Update::Messages => {
            if let Some(message) = client.messages().last() {
                print_message(message);
            }
        }
        Update::Presence => print_who(client),
        Update::Typing => {
            let names: Vec<_> = client.typing().iter().map(|e| e.username.as_str()).collect();
            if !names.is_empty() {
                println!("* {} typing...", names.join(", "));
            }
        }
        Update::Nothing => {}
    }
}

fn print_rooms<A: HistoryFetcher, T: Transport>(client: &ChatClient<A, T>) {
    if client.rooms().is_empty() {
        println!("* no rooms");
        return;
    }
    for room in client.rooms() {
        let marker = if client.selected().map(|r| r.id) == Some(room.id) { '>' } else { ' ' };
        let lock = if room.is_private { " (private)" } else { "" };
        match &room.description {
            Some(description) => {
                println!("{} #{} {}{} - {}", marker, room.id, room.name, lock, description)
            }
            None => println!("{} #{} {}{}", marker, room.id, room.name, lock),
        }
    }
}

fn print_who<A: HistoryFetcher, T: Transport>(client: &ChatClient<A, T>) {
    let online: Vec<_> = client.online().iter().map(|e| e.username.as_str()).collect();
    println!("* online: {}", online.join(", "));
    let typing: Vec<_> = client.typing().iter().map(|e| e.username.as_str()).collect();
    if !typing.is_empty() {
        println!("* typing: {}", typing.join(", "));
    }
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M"),
        message.author_username,
        message.content
    );
}
