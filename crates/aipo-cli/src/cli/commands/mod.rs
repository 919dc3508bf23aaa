mod dispatch;
mod doctor;
mod gate;
mod incremental;
mod list_conversations;
mod replay;
mod run;
mod runtime;
mod sessions;
mod verify_suite;

pub use dispatch::dispatch;
