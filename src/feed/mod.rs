pub mod channel;
pub mod protocol;
pub mod transport;

pub use channel::FeedChannel;
pub use transport::WsTransport;
