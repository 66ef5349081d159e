pub mod commands;
pub mod executor;
pub mod scripts;

pub use executor::{CommandExecutor, RedisExecutor, execute_command};
