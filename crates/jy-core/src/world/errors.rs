//! Load-time errors
//!
//! Gameplay never fails with an error: missing records and invalid actions
//! are reported as `false`/`None` and logged. These variants cover setting
//! up a session or a battle from content that is not there.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("battle {0} is not defined")]
    MissingBattle(i16),

    #[error("battle map {0} is not defined")]
    MissingBattleMap(i16),

    #[error("event script {0} is not defined")]
    MissingEvent(i16),

    #[error("invalid session data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read session file: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
