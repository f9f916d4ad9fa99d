/// Story Player: interactive terminal playthrough of a story file.
///
/// Usage: story_player <story.json|story.ron> [--config <engine.ron>] [--seed <n>]
///
/// Commands:
///   <n>              choose the n-th visible option
///   roll | fight     resolve a dice or combat node
///   buy <item>       buy from the current shop
///   sell <item>      sell to the current shop
///   craft <recipe>   craft at the current inventory node
///   leave            leave a shop or inventory
///   skip             skip a skippable timer
///   trigger          trigger a random event
///   continue         complete a pending random event or auto-advance
///   wait [n]         let n seconds pass (default 1)
///   jump <node>      jump to a node
///   state | history  show game state or visited nodes
///   save <file> | load <file>
///   restart | help | quit

use std::io::{self, BufRead, Write};
use std::process;
use story_engine::core::engine::{EngineError, EngineState, StoryEngine};
use story_engine::core::variables::format_number;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let story_path = args[1].clone();
    let mut config_path = None;
    let mut seed = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().ok();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = StoryEngine::builder().story_path(&story_path);
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }

    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = engine.start() {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }

    println!("Loaded {} nodes", engine.story().graph.nodes.len());
    println!("Type 'help' for commands.\n");
    show(&mut engine);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        let result = match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
                continue;
            }
            "state" => {
                print_state(&engine);
                continue;
            }
            "history" => {
                println!("{}", engine.history().join(" -> "));
                continue;
            }
            "roll" => engine.roll_dice().map(|_| ()),
            "fight" => engine.fight().map(|_| ()),
            "buy" => engine.buy(rest).map(|_| ()),
            "sell" => engine.sell(rest).map(|_| ()),
            "craft" => engine.craft(rest).map(|_| ()),
            "leave" => engine.leave(),
            "skip" => engine.skip(),
            "trigger" => engine.trigger_event().map(|_| ()),
            "continue" => engine.complete_pending(),
            "wait" => {
                let seconds = rest.parse().unwrap_or(1);
                engine.advance(seconds)
            }
            "jump" => engine.jump_to(rest),
            "restart" => engine.restart(),
            "save" => match engine.save_snapshot() {
                Ok(json) => match std::fs::write(rest, json) {
                    Ok(()) => {
                        println!("Saved to {}", rest);
                        continue;
                    }
                    Err(e) => {
                        println!("ERROR: {}", e);
                        continue;
                    }
                },
                Err(e) => Err(e),
            },
            "load" => match std::fs::read_to_string(rest) {
                Ok(json) => engine.load_snapshot(&json),
                Err(e) => {
                    println!("ERROR: {}", e);
                    continue;
                }
            },
            other => match other.parse::<usize>() {
                Ok(n) => choose_visible(&mut engine, n),
                Err(_) => {
                    println!("Unknown command: {}. Type 'help' for commands.", other);
                    continue;
                }
            },
        };

        for notice in engine.drain_notices() {
            println!("  * {}", notice);
        }
        if let Err(e) = result {
            println!("ERROR: {}", e);
        }
        show(&mut engine);
    }
}

/// Options are numbered from 1 among the visible ones.
fn choose_visible(engine: &mut StoryEngine, n: usize) -> Result<(), EngineError> {
    let view = engine.view()?;
    match n.checked_sub(1).and_then(|i| view.options.get(i)) {
        Some(option) => engine.choose(option.index),
        None => Err(EngineError::OptionOutOfRange(n)),
    }
}

fn show(engine: &mut StoryEngine) {
    if matches!(engine.state(), EngineState::Halted { .. }) {
        println!("\n[halted] type 'restart' to play again\n");
        return;
    }
    let view = match engine.view() {
        Ok(view) => view,
        Err(e) => {
            println!("ERROR: {}", e);
            return;
        }
    };

    println!();
    if !view.chapter.is_empty() {
        println!("[{}]", view.chapter);
    }
    println!("{}: {}", view.speaker, view.text);
    for (i, option) in view.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option.text);
    }
    if let Some(countdown) = view.countdown.as_ref().filter(|c| c.show) {
        println!("  [{} seconds remaining]", countdown.remaining);
    }

    let actions = engine.available_actions();
    let extra: Vec<String> = actions
        .iter()
        .filter_map(|action| {
            let json = serde_json::to_value(action).ok()?;
            let name = json.get("action")?.as_str()?.to_string();
            (name != "choose").then_some(name)
        })
        .collect();
    if !extra.is_empty() {
        println!("  ({})", extra.join(", "));
    }
    if let EngineState::AwaitingSubAction { action, .. } = engine.state() {
        println!("  waiting on: {:?}", action);
    }
    println!();
}

fn print_state(engine: &StoryEngine) {
    let state = engine.game_state();
    println!("Node: {}", engine.current_node().unwrap_or("-"));

    let mut stats: Vec<_> = state.stats.iter().collect();
    stats.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in stats {
        println!("  stat {} = {}", name, format_number(*value));
    }

    let mut variables: Vec<_> = state.variables.iter().collect();
    variables.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in variables {
        println!("  var  {} = {}", name, format_number(*value));
    }

    let mut flags: Vec<_> = state.flags.iter().collect();
    flags.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in flags {
        println!("  flag {} = {}", name, value);
    }

    for item in &state.inventory {
        println!("  item {}", item.name);
    }

    let mut quests: Vec<_> = state.quests.iter().collect();
    quests.sort_by(|a, b| a.0.cmp(b.0));
    for (id, quest) in quests {
        println!("  quest {} ({}) = {}", id, quest.name, quest.state);
    }
}

fn print_usage() {
    println!("Usage: story_player <story.json|story.ron> [--config <engine.ron>] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <n>              choose the n-th visible option");
    println!("  roll | fight     resolve a dice or combat node");
    println!("  buy <item>       buy from the current shop");
    println!("  sell <item>      sell to the current shop");
    println!("  craft <recipe>   craft at the current inventory node");
    println!("  leave            leave a shop or inventory");
    println!("  skip             skip a skippable timer");
    println!("  trigger          trigger a random event");
    println!("  continue         complete a pending event or auto-advance");
    println!("  wait [n]         let n seconds pass");
    println!("  jump <node>      jump to a node");
    println!("  state | history  show game state or visited nodes");
    println!("  save <file>      save progress");
    println!("  load <file>      load progress");
    println!("  restart          start over");
    println!("  quit             exit");
}
