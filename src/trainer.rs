use serde::{Serialize, de::DeserializeOwned};

use crate::error::BoxError;

/// The local training step, treated as a black box from state to state.
///
/// The round client calls it once per round, synchronously, with the state it
/// just received and sends whatever it returns back to the coordinator.
pub trait Trainer {
    /// The model state exchanged with the coordinator.
    type State: Serialize + DeserializeOwned;

    /// Computes the local update for `state`.
    ///
    /// # Errors
    /// Any failure aborts the session.
    fn compute_update(&mut self, state: &Self::State) -> Result<Self::State, BoxError>;
}
