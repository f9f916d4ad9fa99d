//! WASM bindings for story-engine: the runtime embedded in exported games
//! and the editor's live preview.

use wasm_bindgen::prelude::*;

use story_engine::core::engine::{EngineError, PlayerAction, StoryEngine};
use story_engine::core::validator::GraphValidator;
use story_engine::schema::graph::Story;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ActionResult {
    ok: bool,
    error: Option<String>,
    notices: Vec<String>,
    ended: bool,
}

#[derive(serde::Serialize)]
struct ReportInfo {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn engine_error(e: EngineError) -> JsError {
    JsError::new(&format!("Engine error: {e}"))
}

// ---------------------------------------------------------------------------
// StoryPlayer, the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryPlayer {
    engine: StoryEngine,
}

#[wasm_bindgen]
impl StoryPlayer {
    /// Start a playthrough of a story exported as JSON.
    #[wasm_bindgen(constructor)]
    pub fn new(story_json: &str, seed: u64) -> Result<StoryPlayer, JsError> {
        let story = Story::parse_json(story_json)
            .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;
        Self::from_story(story, seed)
    }

    /// Start a playthrough of a story written in RON.
    pub fn from_ron(story_ron: &str, seed: u64) -> Result<StoryPlayer, JsError> {
        let story = Story::parse_ron(story_ron)
            .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;
        Self::from_story(story, seed)
    }

    /// Validate a JSON story without playing it. Returns
    /// `{"errors": [...], "warnings": [...]}`.
    pub fn validate(story_json: &str) -> Result<String, JsError> {
        let story = Story::parse_json(story_json)
            .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;
        let report = GraphValidator::validate(&story.graph);
        to_json(&ReportInfo {
            errors: report.errors,
            warnings: report.warnings,
        })
    }

    /// The current screen as JSON: speaker, rendered text, visible options
    /// and, on timer nodes, `countdown: {remaining, show, can_skip}`.
    pub fn view(&mut self) -> Result<String, JsError> {
        let view = self.engine.view().map_err(engine_error)?;
        to_json(&view)
    }

    /// JSON array of the actions available right now.
    pub fn actions(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.available_actions())
    }

    /// Perform an action given as JSON, e.g. `{"action": "choose", "index": 0}`
    /// or `{"action": "buy", "item": "Sword", "price": 10}`.
    ///
    /// Engine errors are reported in the result rather than thrown so the
    /// page can show them next to the notices.
    pub fn perform(&mut self, action_json: &str) -> Result<String, JsError> {
        let action: PlayerAction = serde_json::from_str(action_json)
            .map_err(|e| JsError::new(&format!("Invalid action JSON: {e}")))?;
        let outcome = self.engine.perform(&action);
        self.result(outcome)
    }

    /// Let `seconds` of game time pass (timers, auto-advance, random
    /// event display).
    pub fn tick(&mut self, seconds: u32) -> Result<String, JsError> {
        let outcome = self.engine.advance(u64::from(seconds));
        self.result(outcome)
    }

    /// Jump to a node by id (editor preview).
    pub fn jump_to(&mut self, node_id: &str) -> Result<String, JsError> {
        let outcome = self.engine.jump_to(node_id);
        self.result(outcome)
    }

    /// The playthrough's game state as JSON.
    pub fn game_state(&self) -> Result<String, JsError> {
        to_json(self.engine.game_state())
    }

    /// Visited node ids as a JSON array.
    pub fn history(&self) -> Result<String, JsError> {
        to_json(&self.engine.history())
    }

    pub fn save(&self) -> Result<String, JsError> {
        self.engine.save_snapshot().map_err(engine_error)
    }

    pub fn load(&mut self, snapshot_json: &str) -> Result<(), JsError> {
        self.engine.load_snapshot(snapshot_json).map_err(engine_error)
    }

    pub fn restart(&mut self) -> Result<(), JsError> {
        self.engine.restart().map_err(engine_error)
    }

    pub fn is_ended(&self) -> bool {
        self.engine.is_ended()
    }
}

// Private helpers
impl StoryPlayer {
    fn from_story(story: Story, seed: u64) -> Result<StoryPlayer, JsError> {
        let mut engine = StoryEngine::builder()
            .seed(seed)
            .with_story(story)
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;
        engine.start().map_err(engine_error)?;
        Ok(StoryPlayer { engine })
    }

    fn result(&mut self, outcome: Result<(), EngineError>) -> Result<String, JsError> {
        let result = ActionResult {
            ok: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            notices: self.engine.drain_notices(),
            ended: self.engine.is_ended(),
        };
        to_json(&result)
    }
}
