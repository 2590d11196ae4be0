use std::{error::Error, fmt, io, path::PathBuf};

/// Boxed error used at the capability seams (codecs and trainers).
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The client module's result type.
pub type Result<T> = std::result::Result<T, ClientErr>;

/// Failures of the framed channel.
#[derive(Debug)]
pub enum FrameErr {
    /// The underlying stream failed.
    Io(io::Error),
    /// The header is not a padded unsigned decimal number.
    MalformedHeader(String),
    /// The stream closed before a whole frame arrived.
    Truncated { expected: usize, received: usize },
    /// The payload length does not fit in the header width.
    PayloadTooLarge { len: usize, header_len: usize },
}

impl fmt::Display for FrameErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameErr::Io(e) => write!(f, "io error: {e}"),
            FrameErr::MalformedHeader(header) => write!(f, "malformed frame header {header:?}"),
            FrameErr::Truncated { expected, received } => write!(
                f,
                "stream closed mid-frame: expected {expected} bytes, received {received}"
            ),
            FrameErr::PayloadTooLarge { len, header_len } => write!(
                f,
                "payload of {len} bytes does not fit a {header_len} byte header"
            ),
        }
    }
}

impl Error for FrameErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FrameErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FrameErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Round client failures. Every variant is fatal for the session.
#[derive(Debug)]
pub enum ClientErr {
    /// Invalid configuration, caught before connecting.
    InvalidConfig(String),
    /// Could not reach the coordinator.
    Connect { addr: String, source: io::Error },
    /// The connection broke while receiving or sending.
    Transport { round: u64, source: io::Error },
    /// A frame could not be read or written.
    Framing { round: u64, source: FrameErr },
    /// A received payload is not a valid round message.
    Decoding { round: u64, source: BoxError },
    /// The local update could not be serialized.
    Encoding { round: u64, source: BoxError },
    /// The local computation step failed.
    Computation { round: u64, source: BoxError },
    /// The applied state could not be written to the weights file.
    Persist {
        round: u64,
        path: PathBuf,
        source: io::Error,
    },
}

impl ClientErr {
    /// Classifies a channel failure raised during `round`.
    pub(crate) fn from_frame(round: u64, err: FrameErr) -> Self {
        match err {
            FrameErr::Io(source) => Self::Transport { round, source },
            source => Self::Framing { round, source },
        }
    }

    /// Returns the round the session was in when it failed, if any.
    pub fn round(&self) -> Option<u64> {
        match self {
            Self::InvalidConfig(_) | Self::Connect { .. } => None,
            Self::Transport { round, .. }
            | Self::Framing { round, .. }
            | Self::Decoding { round, .. }
            | Self::Encoding { round, .. }
            | Self::Computation { round, .. }
            | Self::Persist { round, .. } => Some(*round),
        }
    }
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Connect { addr, source } => write!(f, "connection failed to {addr}: {source}"),
            Self::Transport { round, source } => {
                write!(f, "connection lost at round {round}: {source}")
            }
            Self::Framing { round, source } => write!(f, "framing error at round {round}: {source}"),
            Self::Decoding { round, source } => {
                write!(f, "undecodable round message at round {round}: {source}")
            }
            Self::Encoding { round, source } => {
                write!(f, "failed to encode update at round {round}: {source}")
            }
            Self::Computation { round, source } => {
                write!(f, "local computation failed at round {round}: {source}")
            }
            Self::Persist {
                round,
                path,
                source,
            } => write!(
                f,
                "failed to persist weights to {} at round {round}: {source}",
                path.display()
            ),
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Connect { source, .. }
            | Self::Transport { source, .. }
            | Self::Persist { source, .. } => Some(source),
            Self::Framing { source, .. } => Some(source),
            Self::Decoding { source, .. }
            | Self::Encoding { source, .. }
            | Self::Computation { source, .. } => Some(&**source),
        }
    }
}
