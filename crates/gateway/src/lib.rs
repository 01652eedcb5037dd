pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod sessions;
pub mod state;
pub mod ws;
