pub mod channel;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod snapshot;
pub mod trainer;

pub use channel::{FramedChannel, Received};
pub use client::{Phase, RoundClient, SessionReport, SessionState, StopReason};
pub use codec::{Codec, JsonCodec};
pub use config::ClientConfig;
pub use error::{BoxError, ClientErr, FrameErr, Result};
pub use message::RoundMessage;
pub use snapshot::WeightsFile;
pub use trainer::Trainer;
