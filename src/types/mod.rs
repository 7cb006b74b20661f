mod channel;
mod instrument;
mod websocket;

// Re-export all types
pub use channel::*;
pub use instrument::*;
pub use websocket::*;
