pub mod command;
pub mod human;
