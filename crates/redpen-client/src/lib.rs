//! HTTP implementations of the engine's service contracts, plus the
//! ignore-history store client.

pub mod generative;
pub mod grammar;
pub mod history;
pub mod transport;

pub use generative::GenerativeClient;
pub use grammar::GrammarClient;
pub use history::HistoryClient;
pub use transport::ClientConfig;
