/// Story Linter: checks a story file for a missing intro, broken links,
/// unreachable nodes and empty content.
///
/// Usage: story_linter <story.json|story.ron> [<more stories>...] [--strict]
///
/// Exits with status 1 when any story has errors (or, with --strict,
/// warnings).

use std::path::Path;
use std::process;
use story_engine::core::validator::GraphValidator;
use story_engine::schema::graph::Story;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story.json|story.ron> [<more stories>...] [--strict]");
        process::exit(0);
    }

    let mut strict = false;
    let mut paths = Vec::new();
    for arg in &args[1..] {
        if arg == "--strict" {
            strict = true;
        } else {
            paths.push(arg.as_str());
        }
    }

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for path in paths {
        println!("\n=== {} ===\n", path);

        let story = match Story::load(Path::new(path)) {
            Ok(story) => story,
            Err(e) => {
                println!("ERROR: Failed to load story: {}", e);
                total_errors += 1;
                continue;
            }
        };

        println!("Loaded {} nodes", story.graph.nodes.len());

        let report = GraphValidator::validate(&story.graph);
        if report.errors.is_empty() && report.warnings.is_empty() {
            println!("All checks passed!");
        }

        for warning in &report.warnings {
            println!("WARNING: {}", warning);
        }

        for error in &report.errors {
            println!("ERROR: {}", error);
        }

        total_errors += report.errors.len();
        total_warnings += report.warnings.len();
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        total_errors, total_warnings
    );

    if total_errors > 0 || (strict && total_warnings > 0) {
        process::exit(1);
    }
}
