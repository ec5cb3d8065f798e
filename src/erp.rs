pub mod xmlrpc;
pub mod client;
pub use client::{ErpClient, ErpCredentials};
