pub mod chat;

pub use chat::ChatPanel;
