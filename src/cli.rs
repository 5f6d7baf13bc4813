//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; the route table dispatches to the controller.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_find_output, format_resolution_output};
pub use route::RunContext;
