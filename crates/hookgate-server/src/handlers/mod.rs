pub mod connections;
pub mod health;
pub mod websocket;
