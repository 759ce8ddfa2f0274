use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a bingo game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Players join and fill their grids.
    #[default]
    Lobby,
    /// Songs are being called and marked.
    Playing,
    /// Terminal state; the game is read-only.
    Finished,
}

/// Why a game moved to [`GameStatus::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The host ended the game.
    Host,
    /// The game outlived its time to live.
    Expired,
}

/// Events that can be applied to the status state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Host starts the game from the lobby.
    Start,
    /// Game ends, either by host action or expiry.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The status the game was in when the invalid event was received.
    pub from: GameStatus,
    /// The event that cannot be applied from this status.
    pub event: GameEvent,
}

impl GameStatus {
    /// Compute the next status for `event`, rejecting anything out of a terminal state.
    pub fn transition(self, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
        let next = match (self, event) {
            (GameStatus::Lobby, GameEvent::Start) => GameStatus::Playing,
            (GameStatus::Lobby | GameStatus::Playing, GameEvent::Finish(_)) => {
                GameStatus::Finished
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, GameStatus::Finished)
    }

    /// Whether a new player may be appended in this status.
    pub fn accepts_players(self, allow_late_join: bool) -> bool {
        match self {
            GameStatus::Lobby => true,
            GameStatus::Playing => allow_late_join,
            GameStatus::Finished => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_status_is_lobby() {
        assert_eq!(GameStatus::default(), GameStatus::Lobby);
    }

    #[test]
    fn happy_path_through_game() {
        let status = GameStatus::Lobby.transition(GameEvent::Start).unwrap();
        assert_eq!(status, GameStatus::Playing);
        let status = status
            .transition(GameEvent::Finish(FinishReason::Host))
            .unwrap();
        assert_eq!(status, GameStatus::Finished);
    }

    #[test]
    fn lobby_can_expire_directly() {
        assert_eq!(
            GameStatus::Lobby.transition(GameEvent::Finish(FinishReason::Expired)),
            Ok(GameStatus::Finished)
        );
    }

    #[test]
    fn finished_is_terminal() {
        for event in [
            GameEvent::Start,
            GameEvent::Finish(FinishReason::Host),
            GameEvent::Finish(FinishReason::Expired),
        ] {
            let err = GameStatus::Finished.transition(event).unwrap_err();
            assert_eq!(err.from, GameStatus::Finished);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn playing_cannot_restart() {
        assert!(GameStatus::Playing.transition(GameEvent::Start).is_err());
    }

    #[test]
    fn late_join_depends_on_settings() {
        assert!(GameStatus::Lobby.accepts_players(false));
        assert!(!GameStatus::Playing.accepts_players(false));
        assert!(GameStatus::Playing.accepts_players(true));
        assert!(!GameStatus::Finished.accepts_players(true));
    }
}
