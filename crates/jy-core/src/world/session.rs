//! A running game session

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::GameRng;
use crate::world::{Content, CoreResult, Factors, GameData};

/// Everything the battle engine and event VM read or mutate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub data: GameData,
    pub content: Content,
    pub factors: Factors,
    pub rng: GameRng,
}

impl Session {
    pub fn new(data: GameData, content: Content, factors: Factors, rng: GameRng) -> Self {
        Self {
            data,
            content,
            factors,
            rng,
        }
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_minimal() {
        let session = Session::from_json(r#"{"rng": 5, "data": {"party": [0, -1, -1, -1, -1, -1]}}"#).unwrap();
        assert_eq!(session.rng.seed(), 5);
        assert_eq!(session.data.party[0], 0);
        assert!(session.content.events.is_empty());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Session::from_json("[").is_err());
    }
}
