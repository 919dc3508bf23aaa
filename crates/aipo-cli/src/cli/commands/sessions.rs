//! `aipo sessions {list,show,export,delete,prune}`: inspect and manage
//! persisted conversations (spec.md §6 `sessions` surface, §4.6 memory).

use aipo_core::{ConversationMemory, Paths};
use aipo_evidence::EXIT_SUCCESS;
use anyhow::Context;

use crate::cli::args::{
    SessionsDeleteArgs, SessionsExportArgs, SessionsListArgs, SessionsPruneArgs, SessionsShowArgs,
};

fn open_memory(output_dir: Option<&std::path::Path>) -> anyhow::Result<ConversationMemory> {
    let paths = match output_dir {
        Some(root) => Paths::under(root),
        None => Paths::resolve(),
    };
    paths.ensure_all().context("creating aipo data/cache/state directories")?;
    ConversationMemory::open(&paths.memory_db_path()).context("opening conversation memory")
}

pub fn list(args: SessionsListArgs) -> anyhow::Result<i32> {
    let memory = open_memory(args.storage.output_dir.as_deref())?;
    for conversation in memory.list_all()? {
        println!("{}  ({} turns)", conversation.conversation_id, conversation.turns.len());
    }
    Ok(EXIT_SUCCESS)
}

pub fn show(args: SessionsShowArgs) -> anyhow::Result<i32> {
    let memory = open_memory(args.storage.output_dir.as_deref())?;
    let turns = memory.list(args.conversation_id)?;
    for turn in turns {
        println!("[{}] {:?}: {}", turn.turn_index, turn.role, turn.content);
    }
    Ok(EXIT_SUCCESS)
}

pub fn export(args: SessionsExportArgs) -> anyhow::Result<i32> {
    let memory = open_memory(args.storage.output_dir.as_deref())?;
    let turns = memory.list(args.conversation_id)?;
    let json = serde_json::to_vec_pretty(&turns)?;
    std::fs::write(&args.out, json).with_context(|| format!("writing {}", args.out.display()))?;
    println!("exported {} turns to {}", turns.len(), args.out.display());
    Ok(EXIT_SUCCESS)
}

pub fn delete(args: SessionsDeleteArgs) -> anyhow::Result<i32> {
    let memory = open_memory(args.storage.output_dir.as_deref())?;
    let removed = memory.delete(args.conversation_id)?;
    println!("deleted {removed} turn(s) from {}", args.conversation_id);
    Ok(EXIT_SUCCESS)
}

pub fn prune(args: SessionsPruneArgs) -> anyhow::Result<i32> {
    let memory = open_memory(args.storage.output_dir.as_deref())?;
    let cutoff = chrono::Utc::now() - chrono::Duration::days(args.older_than_days);
    let removed = memory.prune(cutoff)?;
    println!("pruned {} conversation(s) older than {} day(s)", removed.len(), args.older_than_days);
    Ok(EXIT_SUCCESS)
}
