use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        game::{GameSnapshot, MarkReportDto},
        sse::{GameSnapshotEvent, Handshake, ServerEvent, SongMarkedEvent, SystemStatus},
    },
    state::{SharedState, code::GameCode, game::MarkOutcome, grid::SongId},
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_GAME_SNAPSHOT: &str = "game.snapshot";
const EVENT_SONG_MARKED: &str = "game.marked";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the authoritative snapshot of a game to its subscribers.
pub fn broadcast_snapshot(state: &SharedState, code: &GameCode, snapshot: GameSnapshot) {
    send_game_event(state, code, EVENT_GAME_SNAPSHOT, &GameSnapshotEvent(snapshot));
}

/// Broadcast which players completed lines because of a mark.
pub fn broadcast_song_marked(
    state: &SharedState,
    code: &GameCode,
    song_id: &SongId,
    marked: bool,
    outcome: &MarkOutcome,
) {
    let payload = SongMarkedEvent {
        song_id: song_id.to_string(),
        marked,
        players: outcome.players.iter().map(MarkReportDto::from).collect(),
    };
    send_game_event(state, code, EVENT_SONG_MARKED, &payload);
}

/// Tell every connected client that storage went away or came back.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    match ServerEvent::json(
        Some(EVENT_SYSTEM_STATUS.to_string()),
        &SystemStatus { degraded },
    ) {
        Ok(event) => state.sse().broadcast_all(event),
        Err(err) => warn!(error = %err, "failed to serialize system status payload"),
    }
}

/// Per-connection greeting sent before any broadcast.
pub fn handshake_event(code: &GameCode, degraded: bool) -> Option<ServerEvent> {
    let payload = Handshake {
        code: code.to_string(),
        message: format!("subscribed to game {code}"),
        degraded,
    };
    to_event(EVENT_HANDSHAKE, &payload)
}

/// Per-connection copy of the current snapshot so late subscribers start in sync.
pub fn snapshot_event(snapshot: GameSnapshot) -> Option<ServerEvent> {
    to_event(EVENT_GAME_SNAPSHOT, &GameSnapshotEvent(snapshot))
}

fn to_event(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    ServerEvent::json(Some(event.to_string()), payload)
        .inspect_err(|err| warn!(event, error = %err, "failed to serialize SSE payload"))
        .ok()
}

fn send_game_event(state: &SharedState, code: &GameCode, event: &str, payload: &impl Serialize) {
    // Nobody subscribed yet: nothing to serialize.
    let Some(hub) = state.sse().existing(code) else {
        return;
    };
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(%code, event, error = %err, "failed to serialize game SSE payload"),
    }
}
