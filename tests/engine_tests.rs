/// Engine integration tests: full playthroughs of fixture stories.

use std::path::Path;
use story_engine::core::config::EngineConfig;
use story_engine::core::engine::{
    CountdownView, EngineError, EngineState, PlayerAction, StoryEngine, SubAction,
};
use story_engine::core::variables::VariableStore;
use story_engine::schema::graph::Story;
use story_engine::schema::node::NodeKindTag;

const TAVERN_JSON: &str = "tests/fixtures/tavern.json";
const TAVERN_RON: &str = "tests/fixtures/tavern.ron";
const ENGINE_CONFIG: &str = "tests/fixtures/engine.ron";

fn tavern(seed: u64) -> StoryEngine {
    let mut engine = StoryEngine::builder()
        .seed(seed)
        .story_path(TAVERN_JSON)
        .build()
        .unwrap();
    engine.start().unwrap();
    engine
}

#[test]
fn guard_example_sets_flag_and_moves_to_town() {
    let json = r#"{"nodes": {
        "intro": {"node_type": "Dialogue", "npc": "Guard", "text": "Halt!", "options": [
            {"text": "Go", "nextNode": "town", "conditions": [],
             "effects": [{"type": "flag", "subject": "met_guard", "operator": "=", "value": true}]}
        ]},
        "town": {"npc": "Narrator", "text": "The town square.", "options": []}
    }}"#;
    let story = Story::parse_json(json).unwrap();
    let mut engine = StoryEngine::builder()
        .seed(1)
        .with_story(story)
        .build()
        .unwrap();
    engine.start().unwrap();

    engine.choose(0).unwrap();

    assert_eq!(engine.current_node(), Some("town"));
    assert!(engine.game_state().flag("met_guard"));
    // A dialogue node without options idles rather than erroring.
    assert!(engine.available_actions().is_empty());
    assert!(engine.tick().is_ok());
    assert_eq!(engine.current_node(), Some("town"));
}

#[test]
fn intro_renders_variables_and_inline_math() {
    let mut engine = tavern(1);
    let view = engine.view().unwrap();
    assert_eq!(view.speaker, "Barkeep");
    assert_eq!(view.chapter, "The Crooked Tankard");
    assert_eq!(view.text, "Welcome, traveler. You have 12 gold.");
    assert_eq!(view.kind, Some(NodeKindTag::Dialogue));
    let texts: Vec<&str> = view.options.iter().map(|o| o.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Ask about work",
            "Buy a drink (3 gold)",
            "Visit the stall out back",
            "Leave"
        ]
    );
}

#[test]
fn drink_costs_gold_and_auto_advances() {
    let mut engine = tavern(1);
    engine.choose(1).unwrap();
    assert_eq!(engine.current_node(), Some("drink"));
    assert_eq!(engine.game_state().variable("gold"), 9.0);

    engine.advance(2).unwrap();
    assert_eq!(engine.current_node(), Some("intro"));
    assert_eq!(engine.history(), ["intro", "drink", "intro"]);
}

#[test]
fn drink_option_hides_when_broke() {
    let mut engine = tavern(1);
    for _ in 0..4 {
        engine.choose(1).unwrap();
        engine.complete_pending().unwrap();
    }
    assert_eq!(engine.game_state().variable("gold"), 0.0);
    let view = engine.view().unwrap();
    assert!(view.options.iter().all(|o| o.index != 1));
    assert!(matches!(engine.choose(1), Err(EngineError::OptionUnavailable(1))));
}

#[test]
fn shop_trades_against_currency_variable() {
    let mut engine = tavern(1);
    engine.choose(2).unwrap();
    assert!(matches!(
        engine.state(),
        EngineState::AwaitingSubAction {
            action: SubAction::Shop,
            ..
        }
    ));

    assert!(engine.buy("Sword").unwrap());
    assert_eq!(engine.game_state().variable("gold"), 2.0);
    assert!(engine.buy("String").unwrap());
    assert_eq!(engine.game_state().variable("gold"), 0.0);

    let before = engine.game_state().clone();
    assert!(!engine.buy("Sword").unwrap());
    assert_eq!(engine.game_state(), &before);
    assert_eq!(
        engine.drain_notices().last().map(String::as_str),
        Some("Not enough gold! Need 10, have 0")
    );

    engine.leave().unwrap();
    assert_eq!(engine.current_node(), Some("intro"));
}

#[test]
fn quest_path_through_every_sub_action() {
    let mut engine = tavern(7);

    engine.choose(0).unwrap();
    assert_eq!(engine.game_state().quest_state("rats"), "active");
    let view = engine.view().unwrap();
    assert_eq!(view.text, "The barkeep nods. Rats in the cellar.");

    engine.choose(0).unwrap();
    assert_eq!(engine.available_actions(), vec![PlayerAction::RollDice]);
    let roll = engine.roll_dice().unwrap();
    if !roll.success {
        assert_eq!(engine.current_node(), Some("ambush"));
        // Base power is 12 + 6 + 10 = 28, below 50 even at the top of the range.
        assert!(!engine.fight().unwrap().victory);
        assert_eq!(engine.current_node(), Some("defeat"));
        engine.jump_to("victory").unwrap();
    }
    assert_eq!(engine.current_node(), Some("victory"));

    engine.choose(0).unwrap();
    let state = engine.game_state();
    assert_eq!(state.variable("gold"), 22.0);
    assert_eq!(state.quest_state("rats"), "completed");
    assert!(state.has_item("Rat Tail"));

    assert_eq!(engine.current_node(), Some("rest"));
    engine.advance(59).unwrap();
    assert_eq!(engine.current_node(), Some("rest"));
    engine.tick().unwrap();
    assert_eq!(engine.current_node(), Some("crafting"));

    assert!(!engine.craft("Lucky Charm").unwrap());
    engine.jump_to("shop").unwrap();
    assert!(engine.buy("String").unwrap());
    engine.jump_to("crafting").unwrap();
    assert!(engine.craft("Lucky Charm").unwrap());
    assert!(engine.game_state().has_item("Charm"));
    assert!(!engine.game_state().has_item("Rat Tail"));

    engine.leave().unwrap();
    assert_eq!(engine.current_node(), Some("fate"));
    let description = engine.trigger_event().unwrap().unwrap();
    engine.complete_pending().unwrap();
    match description.as_str() {
        "A storm traps you inside." => assert_eq!(engine.current_node(), Some("intro")),
        "The sky clears." => assert_eq!(engine.current_node(), Some("finale")),
        other => panic!("unexpected outcome {other}"),
    }
}

#[test]
fn dice_outcomes_follow_threshold() {
    let mut successes = 0;
    let mut failures = 0;
    for seed in 0..60 {
        let mut engine = tavern(seed);
        engine.jump_to("cellar_roll").unwrap();
        let roll = engine.roll_dice().unwrap();
        assert_eq!(roll.rolls.len(), 1);
        assert_eq!(roll.success, roll.total >= 4);
        if roll.success {
            successes += 1;
            assert_eq!(engine.current_node(), Some("victory"));
        } else {
            failures += 1;
            assert_eq!(engine.current_node(), Some("ambush"));
        }
    }
    assert!(successes > 0 && failures > 0);
}

#[test]
fn random_event_respects_weights() {
    let mut storms = 0;
    let mut clears = 0;
    for seed in 0..200 {
        let mut engine = tavern(seed);
        engine.jump_to("fate").unwrap();
        match engine.trigger_event().unwrap().as_deref() {
            Some("A storm traps you inside.") => storms += 1,
            Some("The sky clears.") => clears += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert!(clears > 0);
    assert!(storms > clears);
}

#[test]
fn same_seed_same_playthrough() {
    let run = |seed| {
        let mut engine = tavern(seed);
        engine.jump_to("cellar_roll").unwrap();
        let roll = engine.roll_dice().unwrap();
        engine.jump_to("fate").unwrap();
        let outcome = engine.trigger_event().unwrap();
        (roll.rolls, outcome)
    };
    assert_eq!(run(99), run(99));
}

#[test]
fn config_file_changes_combat_and_ending() {
    let mut engine = StoryEngine::builder()
        .seed(5)
        .story_path(TAVERN_JSON)
        .config_path(ENGINE_CONFIG)
        .build()
        .unwrap();
    engine.start().unwrap();
    assert_eq!(engine.config().random_event_delay_secs, 3);

    engine.jump_to("ambush").unwrap();
    let outcome = engine.fight().unwrap();
    assert!((25.0..=31.0).contains(&outcome.power));
    assert!(outcome.victory);
    assert_eq!(engine.current_node(), Some("victory"));

    engine.jump_to("[End Game]").unwrap();
    let view = engine.view().unwrap();
    assert_eq!(view.speaker, "Fin");
    assert_eq!(view.text, "Thanks for playing.");
}

#[test]
fn timer_view_counts_down() {
    let mut engine = tavern(1);
    assert_eq!(engine.view().unwrap().countdown, None);

    engine.jump_to("rest").unwrap();
    assert_eq!(
        engine.view().unwrap().countdown,
        Some(CountdownView {
            remaining: 60,
            show: true,
            can_skip: true,
        })
    );

    engine.advance(15).unwrap();
    let countdown = engine.view().unwrap().countdown.unwrap();
    assert_eq!(countdown.remaining, 45);

    engine.skip().unwrap();
    assert_eq!(engine.current_node(), Some("crafting"));
    assert_eq!(engine.view().unwrap().countdown, None);
}

#[test]
fn random_event_delay_comes_from_config() {
    let config = EngineConfig::load_from_ron(Path::new(ENGINE_CONFIG)).unwrap();
    let mut engine = StoryEngine::builder()
        .seed(5)
        .story_path(TAVERN_JSON)
        .with_config(config)
        .build()
        .unwrap();
    engine.start().unwrap();
    engine.jump_to("fate").unwrap();
    engine.trigger_event().unwrap();
    engine.advance(2).unwrap();
    assert_eq!(engine.current_node(), Some("fate"));
    engine.tick().unwrap();
    assert_ne!(engine.current_node(), Some("fate"));
}

#[test]
fn ron_story_plays_like_json() {
    let mut engine = StoryEngine::builder()
        .seed(3)
        .story_path(TAVERN_RON)
        .build()
        .unwrap();
    engine.start().unwrap();
    assert_eq!(
        engine.view().unwrap().text,
        "You have 6 gold. Keep your coin."
    );

    engine.choose(0).unwrap();
    assert_eq!(engine.game_state().variable("gold"), 12.0);
    // Two six-sided dice can never reach 13.
    assert!(!engine.roll_dice().unwrap().success);
    assert_eq!(engine.current_node(), Some("broke"));

    engine.choose(0).unwrap();
    assert_eq!(
        engine.view().unwrap().text,
        "You have 12 gold. Drinks are on you."
    );
}

#[test]
fn runtime_broken_link_halts_playthrough() {
    let json = r#"{"nodes": {
        "intro": {"text": "A door.", "options": [{"text": "Open", "nextNode": "hallway"}]}
    }}"#;
    let mut engine = StoryEngine::builder()
        .seed(1)
        .with_story(Story::parse_json(json).unwrap())
        .build()
        .unwrap();
    engine.start().unwrap();

    let err = engine.choose(0).unwrap_err();
    assert_eq!(
        err.to_string(),
        "node 'intro', Choice #1: unknown target node 'hallway'"
    );
    assert!(matches!(engine.view(), Err(EngineError::Halted)));
    assert!(matches!(engine.jump_to("intro"), Err(EngineError::Halted)));

    engine.restart().unwrap();
    assert_eq!(engine.current_node(), Some("intro"));
}

#[test]
fn snapshot_survives_a_new_engine() {
    let mut engine = tavern(2);
    engine.choose(0).unwrap();
    let saved = engine.save_snapshot().unwrap();

    let mut fresh = tavern(2);
    fresh.load_snapshot(&saved).unwrap();
    assert_eq!(fresh.current_node(), Some("quest_board"));
    assert_eq!(fresh.game_state().quest_state("rats"), "active");
    assert_eq!(fresh.history(), ["intro", "quest_board"]);

    let bogus = saved.replace("quest_board", "attic");
    assert!(matches!(
        fresh.load_snapshot(&bogus),
        Err(EngineError::NoSuchNode(_))
    ));
}

#[test]
fn actions_dispatch_through_perform() {
    let mut engine = tavern(1);
    engine.perform(&PlayerAction::Choose { index: 2 }).unwrap();
    let actions = engine.available_actions();
    assert!(actions.contains(&PlayerAction::Buy {
        item: "Sword".to_string(),
        price: 10.0
    }));
    assert_eq!(actions.last(), Some(&PlayerAction::Leave));

    engine
        .perform(&PlayerAction::Buy {
            item: "Sword".to_string(),
            price: 10.0,
        })
        .unwrap();
    assert!(engine.game_state().has_item("Sword"));
    engine.perform(&PlayerAction::Leave).unwrap();
    assert_eq!(engine.current_node(), Some("intro"));
}
