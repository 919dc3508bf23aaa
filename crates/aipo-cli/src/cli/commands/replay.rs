//! `aipo replay-conversation`: print one persisted conversation back out,
//! in the format an operator reconstructing a transcript wants (spec.md §6
//! `replay-conversation` surface).

use aipo_core::{ConversationMemory, Paths};
use aipo_evidence::EXIT_SUCCESS;
use anyhow::Context;

use crate::cli::args::{ReplayConversationArgs, ReplayFormat};

pub fn run(args: ReplayConversationArgs) -> anyhow::Result<i32> {
    let paths = match args.storage.output_dir.as_deref() {
        Some(root) => Paths::under(root),
        None => Paths::resolve(),
    };
    paths.ensure_all().context("creating aipo data/cache/state directories")?;
    let memory = ConversationMemory::open(&paths.memory_db_path()).context("opening conversation memory")?;
    let turns = memory.list(args.conversation_id)?;

    match args.format {
        ReplayFormat::Json => println!("{}", serde_json::to_string_pretty(&turns)?),
        ReplayFormat::Text => {
            for turn in &turns {
                println!("--- turn {} ({}) ---\n{}\n", turn.turn_index, speaker(turn.role), turn.content);
            }
        }
        ReplayFormat::Interactive => {
            let mut line = String::new();
            for turn in &turns {
                println!("--- turn {} ({}) ---\n{}\n", turn.turn_index, speaker(turn.role), turn.content);
                if turn.turn_index as usize + 1 < turns.len() {
                    println!("(press enter for next turn)");
                    line.clear();
                    std::io::stdin().read_line(&mut line).ok();
                }
            }
        }
    }
    Ok(EXIT_SUCCESS)
}

fn speaker(role: aipo_core::memory::Role) -> &'static str {
    match role {
        aipo_core::memory::Role::System => "system",
        aipo_core::memory::Role::User => "user",
        aipo_core::memory::Role::Assistant => "assistant",
        aipo_core::memory::Role::Tool => "tool",
    }
}
