//! Session state for one board: which game is tracked and its score.
//!
//! This module only mutates state and reports what changed; the dispatcher
//! decides which connections to reopen and what to forward to the board.

pub mod models;

pub use models::{DeviceIdentity, GameSwitch, ScorePair};

use serde_json::Value;
use tracing::debug;

use crate::firebase::PutEvent;

const TEAM_1_KEY: &str = "team_1_score";
const TEAM_2_KEY: &str = "team_2_score";

pub struct Session {
    device: DeviceIdentity,
    game_id: Option<String>,
    score: ScorePair,
}

impl Session {
    pub fn new(device: DeviceIdentity) -> Self {
        Session {
            device,
            game_id: None,
            score: ScorePair::default(),
        }
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    #[cfg(test)]
    pub fn score(&self) -> ScorePair {
        self.score
    }

    /// Apply an update from the table stream. The payload's `data` is the
    /// game now assigned to this table (`null` when none).
    ///
    /// Returns `Some` only when the tracked game actually changed.
    pub fn apply_table_update(&mut self, put: &PutEvent) -> Option<GameSwitch> {
        let game = match &put.data {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => {
                debug!("Ignoring table update with non-string game id: {}", other);
                return None;
            }
        };

        if game == self.game_id {
            return None;
        }

        let previous = std::mem::replace(&mut self.game_id, game.clone());
        Some(GameSwitch {
            previous,
            current: game,
        })
    }

    /// Apply an update from the game stream.
    ///
    /// Returns the new score when the path was recognized; unrelated paths and
    /// non-numeric slot values leave the score untouched and return `None`.
    pub fn apply_game_update(&mut self, put: &PutEvent) -> Option<ScorePair> {
        match put.path.as_str() {
            "/" => {
                // Keys missing from the new document keep their current value.
                let doc = put.data.as_object();
                let field = |key: &str| doc.and_then(|d| d.get(key)).and_then(score_value);
                if let Some(v) = field(TEAM_1_KEY) {
                    self.score.team_1 = v;
                }
                if let Some(v) = field(TEAM_2_KEY) {
                    self.score.team_2 = v;
                }
            }
            "/team_1_score" => self.score.team_1 = score_value(&put.data)?,
            "/team_2_score" => self.score.team_2 = score_value(&put.data)?,
            other => {
                debug!("Ignoring game update for path {}", other);
                return None;
            }
        }
        Some(self.score)
    }

    /// Remote identifier for a physical button on this board.
    pub fn button_id(&self, button_name: &str) -> String {
        format!("{}-{}", button_name, self.device)
    }
}

/// Scores are stored as JSON numbers; accept integral floats as well.
fn score_value(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put(path: &str, data: Value) -> PutEvent {
        PutEvent {
            path: path.to_string(),
            data,
        }
    }

    fn session() -> Session {
        Session::new(DeviceIdentity::new("B4218AF83536"))
    }

    #[test]
    fn test_table_update_switches_once_per_distinct_game() {
        let mut s = session();
        let sequence = ["/games/a", "/games/a", "/games/b", "/games/b", "/games/a"];
        let mut switches = 0;
        for game in sequence {
            if s.apply_table_update(&put("/", json!(game))).is_some() {
                switches += 1;
            }
            assert_eq!(s.game_id(), Some(game));
        }
        assert_eq!(switches, 3);
    }

    #[test]
    fn test_table_update_reports_previous_game() {
        let mut s = session();
        s.apply_table_update(&put("/", json!("/games/a")));
        let switch = s.apply_table_update(&put("/", json!("/games/b"))).unwrap();
        assert_eq!(switch.previous.as_deref(), Some("/games/a"));
        assert_eq!(switch.current.as_deref(), Some("/games/b"));
    }

    #[test]
    fn test_table_update_null_clears_game() {
        let mut s = session();
        s.apply_table_update(&put("/", json!("/games/a")));
        let switch = s.apply_table_update(&put("/", Value::Null)).unwrap();
        assert_eq!(switch.current, None);
        assert_eq!(s.game_id(), None);
        // Null while already untracked is not a switch.
        assert!(s.apply_table_update(&put("/", Value::Null)).is_none());
    }

    #[test]
    fn test_table_update_non_string_is_ignored() {
        let mut s = session();
        s.apply_table_update(&put("/", json!("/games/a")));
        assert!(s.apply_table_update(&put("/", json!(42))).is_none());
        assert_eq!(s.game_id(), Some("/games/a"));
    }

    #[test]
    fn test_slot_updates_ignore_unrelated_paths() {
        let mut s = session();
        assert_eq!(s.apply_game_update(&put("/team_1_score", json!(3))), Some(ScorePair::new(3, 0)));
        assert_eq!(s.apply_game_update(&put("/team_1_name", json!("Reds"))), None);
        assert_eq!(s.apply_game_update(&put("/started", json!(true))), None);
        assert_eq!(s.apply_game_update(&put("/team_2_score", json!(7))), Some(ScorePair::new(3, 7)));
        assert_eq!(s.score(), ScorePair::new(3, 7));
    }

    #[test]
    fn test_full_document_preserves_absent_key() {
        let mut s = session();
        s.apply_game_update(&put("/", json!({"team_1_score": 2, "team_2_score": 9})));
        let score = s.apply_game_update(&put("/", json!({"team_1_score": 5})));
        assert_eq!(score, Some(ScorePair::new(5, 9)));
    }

    #[test]
    fn test_full_document_null_keeps_score() {
        let mut s = session();
        s.apply_game_update(&put("/", json!({"team_1_score": 1, "team_2_score": 4})));
        assert_eq!(s.apply_game_update(&put("/", Value::Null)), Some(ScorePair::new(1, 4)));
    }

    #[test]
    fn test_slot_with_non_numeric_value_is_ignored() {
        let mut s = session();
        s.apply_game_update(&put("/team_1_score", json!(2)));
        assert_eq!(s.apply_game_update(&put("/team_1_score", Value::Null)), None);
        assert_eq!(s.apply_game_update(&put("/team_1_score", json!(-1))), None);
        assert_eq!(s.score(), ScorePair::new(2, 0));
    }

    #[test]
    fn test_integral_float_scores_accepted() {
        let mut s = session();
        assert_eq!(s.apply_game_update(&put("/team_2_score", json!(4.0))), Some(ScorePair::new(0, 4)));
        assert_eq!(s.apply_game_update(&put("/team_2_score", json!(4.5))), None);
    }

    #[test]
    fn test_button_id_appends_device() {
        assert_eq!(session().button_id("red"), "red-B4218AF83536");
    }
}
