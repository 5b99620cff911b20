use std::collections::HashMap;

use anyhow::Context;
use roomsync::{
    ApiClient, Config, Credentials, Message, ModerationStatus, RoomHandle, Session, User,
    WsConnector,
};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const CLOCK: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let api = ApiClient::new(&config.api_url);

    let mut session = Session::new();
    session.init(sign_in(&api).await?);

    let Some(room_id) = std::env::args().nth(1) else {
        for room in api.rooms(&session).await? {
            println!("{}  {}", room.id, room.name);
        }
        return Ok(());
    };

    let room = RoomHandle::spawn(
        api.clone(),
        WsConnector::new(&config.ws_url),
        config.backlog_limit,
    );
    room.open(&room_id, &session);

    let own_id = session.user().map(|u| u.id.clone()).unwrap_or_default();
    let mut messages = room.watch_messages();
    let mut status = room.watch_status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown: HashMap<String, ModerationStatus> = HashMap::new();

    loop {
        tokio::select! {
            changed = messages.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = messages.borrow_and_update().clone();
                print_changes(&snapshot, &mut shown, &own_id);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                eprintln!("-- {current}");
            }
            line = lines.next_line() => match line.context("reading stdin")? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if !room.send(&line).await {
                        eprintln!("-- not sent, {}", room.status());
                    }
                }
                None => break,
            },
        }
    }

    room.leave();
    session.teardown();
    Ok(())
}

async fn sign_in(api: &ApiClient) -> anyhow::Result<Credentials> {
    if let Ok(token) = dotenv::var("ROOMSYNC_TOKEN") {
        return Ok(Credentials {
            token,
            user: User {
                id: dotenv::var("ROOMSYNC_USER_ID").unwrap_or_default(),
                email: String::new(),
                username: String::new(),
            },
        });
    }

    let email = dotenv::var("ROOMSYNC_EMAIL")
        .context("set ROOMSYNC_TOKEN, or ROOMSYNC_EMAIL and ROOMSYNC_PASSWORD")?;
    let password = dotenv::var("ROOMSYNC_PASSWORD").context("ROOMSYNC_PASSWORD is not set")?;
    api.login(&email, &password).await.context("login failed")
}

/// Print messages not shown yet and moderation changes of shown ones.
fn print_changes(
    snapshot: &[Message],
    shown: &mut HashMap<String, ModerationStatus>,
    own_id: &str,
) {
    for message in snapshot {
        match shown.insert(message.id.clone(), message.moderation_status) {
            None => println!("{}", render(message, own_id)),
            Some(previous) if previous != message.moderation_status => {
                println!("   ~ {}", render(message, own_id));
            }
            Some(_) => {}
        }
    }
}

fn render(message: &Message, own_id: &str) -> String {
    let clock = if message.has_timestamp() {
        message.created_at.format(CLOCK).unwrap_or_default()
    } else {
        "--:--:--".to_string()
    };
    let who = if !own_id.is_empty() && message.is_own(own_id) {
        "you"
    } else {
        message.username.as_str()
    };
    let tag = match message.moderation_status {
        ModerationStatus::Pending => " (pending)",
        ModerationStatus::Approved => "",
        ModerationStatus::Flagged => " (flagged)",
    };
    format!("[{clock}] {who}{tag}: {}", message.display_content())
}
