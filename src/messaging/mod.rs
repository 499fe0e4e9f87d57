mod channel;
mod pump;

pub use channel::{LogLevel, Message, MessageCallback, MessageChannel, MessageKind, MessageReceiver, MessageSender};
pub use pump::{MessageHandler, Pump, PumpHandle, TracingHandler};
