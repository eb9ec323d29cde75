pub mod chat;
pub mod common;
pub mod generation;

pub use chat::*;
pub use common::*;
pub use generation::*;
