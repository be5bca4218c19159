pub mod commands;
pub mod discord;
