//! Long-running client session: connect, keep the configured rooms joined on
//! every (re)connect, and log inbound envelopes until shutdown or until the
//! connection settles to Disconnected.

use std::future::Future;

use secrecy::SecretString;
use tracing::{info, warn};

use wstether_core::error::Result;

use crate::realtime::{ConnectionManager, ConnectionStatus};

pub async fn run<F>(
    manager: &ConnectionManager,
    credential: SecretString,
    rooms: &[String],
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    // Subscribe before connecting so no transition falls between the two.
    let mut inbound = manager.subscribe_inbound();
    let mut status = manager.subscribe_status().await;
    if status.current().is_connected() {
        join_rooms(manager, rooms).await;
    }

    manager.connect_configured(credential).await?;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted");
                manager.disconnect().await;
                return Ok(());
            }
            next = status.next() => match next {
                Some(ConnectionStatus::Connected) => join_rooms(manager, rooms).await,
                Some(ConnectionStatus::Disconnected) | None => {
                    info!("session ended");
                    return Ok(());
                }
                Some(_) => {}
            },
            env = inbound.recv() => match env {
                Some(env) => info!(
                    kind = %env.kind(),
                    room = env.room_id().unwrap_or(""),
                    sender = env.sender_id().unwrap_or(""),
                    content = env.content().unwrap_or(""),
                    "inbound"
                ),
                None => return Ok(()),
            },
        }
    }
}

async fn join_rooms(manager: &ConnectionManager, rooms: &[String]) {
    for room in rooms {
        if let Err(e) = manager.join_room(room).await {
            warn!(room = %room, error.code = e.code().as_str(), error = %e, "join failed");
        }
    }
}
