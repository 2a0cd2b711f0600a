use thiserror::Error;

/// Crate-level errors: failures that abort or degrade the pipeline as a whole,
/// never a single candidate (see [`crate::pipeline::candidate::CandidateReject`]
/// and [`crate::proxyrun::ProxyProbeError`] for per-candidate outcomes).
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("template error: {0}")]
    Template(String),

    #[error("setup error: {0}")]
    Setup(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors from the VLESS/Trojan URI ↔ structured-config transform (C2).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host in URI")]
    MissingHost,

    #[error("missing credential in URI")]
    MissingCredential,

    #[error("invalid UUID credential: {0}")]
    InvalidUuid(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("malformed URI: {0}")]
    Malformed(String),

    #[error("unrecognized transport type: {0}")]
    UnknownTransport(String),

    #[error("template missing required field: {0}")]
    MissingField(&'static str),

    #[error("template field has wrong shape: {0}")]
    WrongShape(&'static str),
}
