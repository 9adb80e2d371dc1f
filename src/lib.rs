pub mod auth;
pub mod chat;
pub mod error;
pub mod integration;
pub mod message;
pub mod result;
pub mod schema;
pub mod state;
pub mod thread;
pub mod user;

pub use result::Result;
