//! `aipo list-conversations`: print every persisted conversation id
//! (spec.md §6 `list-conversations` surface).

use aipo_core::{ConversationMemory, Paths};
use aipo_evidence::EXIT_SUCCESS;
use anyhow::Context;

use crate::cli::args::ListConversationsArgs;

pub fn run(args: ListConversationsArgs) -> anyhow::Result<i32> {
    let paths = match args.storage.output_dir.as_deref() {
        Some(root) => Paths::under(root),
        None => Paths::resolve(),
    };
    paths.ensure_all().context("creating aipo data/cache/state directories")?;
    let memory = ConversationMemory::open(&paths.memory_db_path()).context("opening conversation memory")?;
    for conversation in memory.list_all()? {
        println!("{}", conversation.conversation_id);
    }
    Ok(EXIT_SUCCESS)
}
