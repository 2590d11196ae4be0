use serde::{Deserialize, Serialize};

/// The message the coordinator broadcasts at the start of every round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMessage<S> {
    /// No further rounds follow this one.
    #[serde(rename = "STOP_FLAG")]
    pub stop_flag: bool,

    /// The global model state.
    #[serde(rename = "WEIGHTS")]
    pub state: S,
}

impl<S> RoundMessage<S> {
    pub fn new(stop_flag: bool, state: S) -> Self {
        Self { stop_flag, state }
    }
}
