//! # PriceWatch Gateway
//! Front-ends over the tracker: the HTTP API (axum) for the web form and
//! the Telegram command bot.

pub mod bot;
pub mod commands;
pub mod routes;
pub mod server;

#[cfg(test)]
mod testing;

pub use bot::Bot;
pub use server::{AppState, build_router, start};
