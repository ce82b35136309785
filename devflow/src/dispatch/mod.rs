//! Command dispatch: registration of every command handler.

mod info;
mod tasks;

use crate::command_registry::CommandRegistry;

pub fn register_all(reg: &mut CommandRegistry) {
    tasks::register(reg);
    info::register(reg);
}
