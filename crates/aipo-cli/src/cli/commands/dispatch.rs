//! Routes a parsed [`Cli`] to its command implementation. Grounded in the
//! teacher's `cli::commands::dispatch::dispatch` match-and-delegate shape.

use crate::cli::args::{Cli, Command, SessionsCmd, DoctorCmd};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => super::run::run(args).await,
        Command::Gate(args) => super::gate::run(args).await,
        Command::VerifySuite(args) => super::verify_suite::run(args).await,
        Command::Sessions(args) => match args.cmd {
            SessionsCmd::List(a) => super::sessions::list(a),
            SessionsCmd::Show(a) => super::sessions::show(a),
            SessionsCmd::Export(a) => super::sessions::export(a),
            SessionsCmd::Delete(a) => super::sessions::delete(a),
            SessionsCmd::Prune(a) => super::sessions::prune(a),
        },
        Command::ReplayConversation(args) => super::replay::run(args),
        Command::ListConversations(args) => super::list_conversations::run(args),
        Command::Doctor(args) => match args.cmd {
            DoctorCmd::Check(a) => super::doctor::check(a).await,
        },
    }
}
