pub extern crate actix_web;

pub mod admin;
pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod handlers;
pub mod server;
mod server_state;
mod session;
