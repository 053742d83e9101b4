use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// A non-success HTTP status from the tracker.
    #[error("bad http status: {0}")]
    BadHttpStatus(u16),

    /// A UDP datagram from an address other than the tracker's.
    #[error("response from unexpected sender")]
    BadSender,

    /// A UDP response whose transaction id is not the one we sent.
    #[error("transaction id mismatch")]
    BadTransactionId,

    /// A UDP connect response shorter than its fixed 16 bytes.
    #[error("connect response too short: {0} bytes")]
    BadConnectResponseLength(usize),

    /// An announce response that does not parse.
    #[error("invalid announce response: {0}")]
    InvalidAnnounceResponse(&'static str),

    /// The announce socket could not be opened.
    #[error("failed to open socket: {0}")]
    FailedToOpenSocket(std::io::Error),

    /// The tracker reported a failure reason.
    #[error("tracker failure: {0}")]
    Failure(String),

    #[error("invalid tracker url: {0}")]
    InvalidUrl(String),

    #[error("timeout")]
    Timeout,
}
