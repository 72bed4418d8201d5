pub mod email;
pub mod webhook;
pub mod websocket;
