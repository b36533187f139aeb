pub mod commands;
pub mod ui;
pub mod util;

pub use ui::output::Output;
pub use util::{CommandContext, read_input};
