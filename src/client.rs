use std::{
    fmt, io,
    io::{Read, Write},
    net::TcpStream,
};

use log::{debug, info};

use crate::{
    channel::{FramedChannel, Received},
    codec::{Codec, JsonCodec},
    config::ClientConfig,
    error::{ClientErr, Result},
    message::RoundMessage,
    snapshot::WeightsFile,
    trainer::Trainer,
};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Active,
    Stopped,
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The coordinator raised the stop flag.
    StopSignal,
    /// The coordinator closed the connection between rounds.
    EndOfStream,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopSignal => write!(f, "stop signal"),
            Self::EndOfStream => write!(f, "coordinator closed the connection"),
        }
    }
}

/// Counters owned by the round loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Completed receive, compute and send cycles.
    pub rounds: u64,
    /// Stop flag of the last received round message.
    pub stop_flag: bool,
}

/// Outcome of a cleanly terminated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub rounds: u64,
    pub reason: StopReason,
}

/// A single peer of the round based training protocol.
///
/// Each round the client:
/// - receives the global state from the coordinator,
/// - applies it locally and persists it to the weights file,
/// - stops if the coordinator said so,
/// - otherwise computes the local update and sends it back.
///
/// The connection is released as soon as the session stops, whatever the reason.
pub struct RoundClient<T, S = TcpStream, C = JsonCodec>
where
    T: Trainer,
{
    channel: Option<FramedChannel<S>>,
    trainer: T,
    codec: C,
    weights: WeightsFile,
    state: Option<T::State>,
    session: SessionState,
    phase: Phase,
}

impl<T: Trainer> RoundClient<T> {
    /// Connects to the coordinator described by `cfg`, exchanging JSON payloads.
    ///
    /// # Args
    /// * `cfg` - Coordinator address, header width and weights path.
    /// * `trainer` - The local computation step.
    ///
    /// # Errors
    /// `ClientErr::InvalidConfig` or `ClientErr::Connect`, the connection is not retried.
    pub fn connect(cfg: &ClientConfig, trainer: T) -> Result<Self> {
        Self::connect_with_codec(cfg, trainer, JsonCodec)
    }
}

impl<T: Trainer, C: Codec> RoundClient<T, TcpStream, C> {
    /// Same as `connect` but with a custom serialization scheme.
    pub fn connect_with_codec(cfg: &ClientConfig, trainer: T, codec: C) -> Result<Self> {
        cfg.validate()?;

        let addr = cfg.addr();
        info!("connecting to coordinator at {addr}");

        let connect = || {
            let stream = TcpStream::connect(&addr)?;
            stream.set_read_timeout(None)?;
            Ok::<_, io::Error>(stream)
        };

        let stream = connect().map_err(|source| ClientErr::Connect {
            addr: addr.clone(),
            source,
        })?;

        info!("connected to coordinator at {addr}");
        Self::from_stream_with_codec(stream, cfg, trainer, codec)
    }
}

impl<T: Trainer, S: Read + Write> RoundClient<T, S> {
    /// Builds a client over an already connected stream.
    pub fn from_stream(stream: S, cfg: &ClientConfig, trainer: T) -> Result<Self> {
        Self::from_stream_with_codec(stream, cfg, trainer, JsonCodec)
    }
}

impl<T, S, C> RoundClient<T, S, C>
where
    T: Trainer,
    S: Read + Write,
    C: Codec,
{
    /// Builds a client over an already connected stream with a custom codec.
    ///
    /// # Errors
    /// `ClientErr::InvalidConfig` if `cfg` does not validate.
    pub fn from_stream_with_codec(
        stream: S,
        cfg: &ClientConfig,
        trainer: T,
        codec: C,
    ) -> Result<Self> {
        cfg.validate()?;

        let mut client = Self {
            channel: Some(FramedChannel::new(stream, cfg.header_len)),
            trainer,
            codec,
            weights: WeightsFile::new(&cfg.weights_path),
            state: None,
            session: SessionState::default(),
            phase: Phase::Connecting,
        };

        client.transition(Phase::Active);
        Ok(client)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// The last applied or computed model state.
    pub fn state(&self) -> Option<&T::State> {
        self.state.as_ref()
    }

    pub fn weights_file(&self) -> &WeightsFile {
        &self.weights
    }

    /// Runs rounds until the coordinator stops the session or an error occurs.
    ///
    /// # Returns
    /// The number of completed rounds and why the session stopped.
    ///
    /// # Errors
    /// Any transport, framing, decoding, computation or persistence failure.
    /// The session is stopped either way and the connection is closed.
    pub fn run(&mut self) -> Result<SessionReport> {
        let Some(mut channel) = self.channel.take() else {
            return Err(ClientErr::Transport {
                round: self.session.rounds,
                source: io::Error::new(io::ErrorKind::NotConnected, "session already stopped"),
            });
        };

        let res = self.rounds(&mut channel);

        drop(channel);
        self.transition(Phase::Stopped);

        let reason = res?;
        let rounds = self.session.rounds;
        info!(rounds = rounds; "training done: {reason}");

        Ok(SessionReport { rounds, reason })
    }

    fn rounds(&mut self, channel: &mut FramedChannel<S>) -> Result<StopReason> {
        loop {
            let round = self.session.rounds;

            let payload = match channel
                .receive_frame()
                .map_err(|e| ClientErr::from_frame(round, e))?
            {
                Received::Frame(payload) => payload,
                Received::EndOfStream => return Ok(StopReason::EndOfStream),
            };

            let msg: RoundMessage<T::State> = self
                .codec
                .decode(&payload)
                .map_err(|source| ClientErr::Decoding { round, source })?;
            let RoundMessage { stop_flag, state } = msg;

            self.persist(round, &state)?;
            let state = self.state.insert(state);

            self.session.stop_flag = stop_flag;
            if stop_flag {
                return Ok(StopReason::StopSignal);
            }

            info!("model version {round} fetched");

            self.session.rounds += 1;
            let round = self.session.rounds;
            info!("training cycle {round}");

            let update = self
                .trainer
                .compute_update(state)
                .map_err(|source| ClientErr::Computation { round, source })?;

            let payload = self
                .codec
                .encode(&update)
                .map_err(|source| ClientErr::Encoding { round, source })?;

            channel
                .send_frame(&payload)
                .map_err(|e| ClientErr::from_frame(round, e))?;

            *state = update;
            info!("sent local model");
        }
    }

    fn persist(&self, round: u64, state: &T::State) -> Result<()> {
        let bytes = self
            .codec
            .encode(state)
            .map_err(|source| ClientErr::Encoding { round, source })?;

        self.weights
            .store(&bytes)
            .map_err(|source| ClientErr::Persist {
                round,
                path: self.weights.path().to_path_buf(),
                source,
            })
    }

    fn transition(&mut self, to: Phase) {
        debug!("session phase {:?} -> {to:?}", self.phase);
        self.phase = to;
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, env, io::Cursor, path::PathBuf, process, rc::Rc};

    use super::*;
    use crate::error::{BoxError, FrameErr};

    /// Replays scripted coordinator bytes and records what the client writes.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Rc<RefCell<Vec<u8>>>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Serves `input`, then resets the connection. Writes fail when `broken_pipe` is set.
    struct Flaky {
        input: Cursor<Vec<u8>>,
        broken_pipe: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.input.read(buf)? {
                0 if !buf.is_empty() => Err(io::ErrorKind::ConnectionReset.into()),
                n => Ok(n),
            }
        }
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.broken_pipe {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Doubler;

    impl Trainer for Doubler {
        type State = Vec<f32>;

        fn compute_update(&mut self, state: &Vec<f32>) -> std::result::Result<Vec<f32>, BoxError> {
            Ok(state.iter().map(|w| w * 2.0).collect())
        }
    }

    fn frame(body: &str) -> Vec<u8> {
        let mut bytes = format!("{:<10}", body.len()).into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        bytes
    }

    fn weights_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("round-client-unit-{}-{name}.json", process::id()))
    }

    fn client(
        script: Vec<u8>,
        name: &str,
    ) -> (RoundClient<Doubler, Scripted>, Rc<RefCell<Vec<u8>>>) {
        let output = Rc::new(RefCell::new(Vec::new()));
        let stream = Scripted {
            input: Cursor::new(script),
            output: Rc::clone(&output),
        };
        let cfg = ClientConfig::new(weights_path(name));
        let client = RoundClient::from_stream(stream, &cfg, Doubler).unwrap();
        (client, output)
    }

    #[test]
    fn replies_once_per_round_until_stopped() {
        let mut script = frame(r#"{"STOP_FLAG":false,"WEIGHTS":[1.0,2.0]}"#);
        script.extend(frame(r#"{"STOP_FLAG":false,"WEIGHTS":[3.0]}"#));
        script.extend(frame(r#"{"STOP_FLAG":true,"WEIGHTS":[9.0]}"#));

        let (mut client, output) = client(script, "replies");
        assert_eq!(client.phase(), Phase::Active);

        let report = client.run().unwrap();

        assert_eq!(report.rounds, 2);
        assert_eq!(report.reason, StopReason::StopSignal);
        assert_eq!(client.phase(), Phase::Stopped);
        assert!(client.session().stop_flag);
        assert_eq!(client.state(), Some(&vec![9.0]));

        let mut expected = frame("[2.0,4.0]");
        expected.extend(frame("[6.0]"));
        assert_eq!(*output.borrow(), expected);

        std::fs::remove_file(client.weights_file().path()).unwrap();
    }

    #[test]
    fn garbage_payload_is_a_decoding_error() {
        let (mut client, output) = client(frame("definitely not json"), "garbage");

        let err = client.run().unwrap_err();

        assert!(matches!(err, ClientErr::Decoding { round: 0, .. }));
        assert_eq!(client.phase(), Phase::Stopped);
        assert_eq!(client.state(), None);
        assert!(output.borrow().is_empty());
    }

    #[test]
    fn malformed_header_is_a_framing_error() {
        let (mut client, _) = client(b"xyz       {}".to_vec(), "header");

        let err = client.run().unwrap_err();
        assert!(matches!(
            err,
            ClientErr::Framing {
                source: FrameErr::MalformedHeader(_),
                ..
            }
        ));
    }

    #[test]
    fn stopped_session_cannot_run_again() {
        let (mut client, _) = client(Vec::new(), "rerun");

        let report = client.run().unwrap();
        assert_eq!(report.reason, StopReason::EndOfStream);
        assert!(matches!(client.run(), Err(ClientErr::Transport { .. })));
    }

    #[test]
    fn reset_mid_payload_is_a_transport_error() {
        let mut script = b"50        ".to_vec();
        script.extend_from_slice(&[b'x'; 30]);

        let stream = Flaky {
            input: Cursor::new(script),
            broken_pipe: false,
        };
        let cfg = ClientConfig::new(weights_path("reset"));
        let mut client = RoundClient::from_stream(stream, &cfg, Doubler).unwrap();

        let err = client.run().unwrap_err();

        let ClientErr::Transport { round: 0, source } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(client.phase(), Phase::Stopped);
        assert_eq!(client.state(), None);
    }

    #[test]
    fn failed_send_is_a_transport_error() {
        let stream = Flaky {
            input: Cursor::new(frame(r#"{"STOP_FLAG":false,"WEIGHTS":[1.0]}"#)),
            broken_pipe: true,
        };
        let cfg = ClientConfig::new(weights_path("send"));
        let mut client = RoundClient::from_stream(stream, &cfg, Doubler).unwrap();

        let err = client.run().unwrap_err();

        let ClientErr::Transport { round: 1, source } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(client.phase(), Phase::Stopped);
        assert_eq!(client.session().rounds, 1);

        std::fs::remove_file(client.weights_file().path()).unwrap();
    }
}
