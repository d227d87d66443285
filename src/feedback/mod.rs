pub mod channel;
pub mod message;
pub mod transport;

pub use channel::FeedbackChannel;
pub use message::{feedback_url, parse_message, FeedbackMessage, PoseSelection};
pub use transport::{ChannelTransport, DetectorEnd, FeedbackTransport, LineTransport, StdioTransport};
