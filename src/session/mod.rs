// Server session: per-connection read loop and command dispatch

mod commands;
mod context;
mod responses;
mod run;

pub use commands::*;
pub use context::*;
pub use responses::*;
pub use run::*;
