use std::env;

use anyhow::{Context, bail};
use log::{error, info};

use round_client::{BoxError, ClientConfig, RoundClient, Trainer};

/// Per layer weight arrays, as the coordinator broadcasts them.
type Weights = Vec<Vec<f32>>;

/// Hands the received weights straight back.
///
/// Stands in for a real training routine, which embedding programs plug in
/// through `Trainer`.
struct EchoTrainer;

impl Trainer for EchoTrainer {
    type State = Weights;

    fn compute_update(&mut self, state: &Weights) -> Result<Weights, BoxError> {
        info!("echoing {} layers", state.len());
        Ok(state.clone())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Trailing positional paths belong to the training routine.
    let Some(weights_path) = env::args().nth(1) else {
        bail!("Usage: round-client <weights_path> [data paths...]");
    };

    let cfg = ClientConfig::from_env(weights_path).context("reading configuration")?;

    let mut client = RoundClient::connect(&cfg, EchoTrainer)
        .with_context(|| format!("connecting to coordinator at {}", cfg.addr()))?;

    match client.run() {
        Ok(report) => {
            info!(
                "session stopped after {} rounds: {}",
                report.rounds, report.reason
            );
            Ok(())
        }
        Err(e) => {
            let rounds = client.session().rounds;
            error!("session failed after {rounds} rounds: {e}");
            Err(e).context("round session failed")
        }
    }
}
