use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{game_service, sse_events},
    state::{SharedState, code::GameCode},
};

/// A live subscription to one game, primed with the events that greet the client.
pub struct GameSubscription {
    pub code: GameCode,
    pub receiver: broadcast::Receiver<ServerEvent>,
    pub greeting: Vec<ServerEvent>,
}

/// Subscribe to the broadcasts of `code`.
///
/// The receiver is registered before the snapshot is read so no change
/// committed in between is lost.
pub async fn subscribe_game(
    state: &SharedState,
    code: &str,
) -> Result<GameSubscription, ServiceError> {
    let code =
        GameCode::parse(code).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let receiver = state.sse().hub(&code).subscribe();

    let game = match game_service::current_game(state, &code).await {
        Ok(game) => game,
        Err(err) => {
            drop(receiver);
            state.sse().prune(&code);
            return Err(err);
        }
    };

    let degraded = state.is_degraded().await;
    let greeting = sse_events::handshake_event(&code, degraded)
        .into_iter()
        .chain(sse_events::snapshot_event(game_service::snapshot(state, &game)))
        .collect();
    debug!(%code, version = game.version, "game subscription registered");

    Ok(GameSubscription {
        code,
        receiver,
        greeting,
    })
}

/// Convert a subscription into an SSE response, forwarding events and
/// dropping the game's hub once its last client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    subscription: GameSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let GameSubscription {
        code,
        mut receiver,
        greeting,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in greeting {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Snapshots are complete; the next one catches the client up.
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(%code, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.sse().prune(&code);
        info!(%code, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Relay degraded mode changes to every connected client.
pub async fn relay_system_status(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        sse_events::broadcast_system_status(&state, degraded);
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
