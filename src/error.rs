use std::io;

/// Anything that stops the runner
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Failed to write status line: {0}")]
    Output(#[source] io::Error),
    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Block '{name}' with instance '{instance}' already exists")]
    Duplicate { name: String, instance: String },
    #[error("Signal {0} cannot be handled")]
    ForbiddenSignal(i32),
}

/// Failure of a block's data source
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Unable to parse {what}: {value}")]
    Parse { what: &'static str, value: String },
    #[error("No {0} found")]
    Missing(&'static str),
    #[error(transparent)]
    Dbus(#[from] zbus::Error),
    #[error(transparent)]
    Pulse(#[from] crate::blocks::volume::PulseError),
    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// Problems on the inbound click event stream
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Expected '{expected}' but got {found:?}")]
    UnexpectedByte { expected: char, found: char },
    #[error("Stream ended inside an event")]
    UnexpectedEof,
    #[error("Invalid click event: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read config file: {0}")]
    Read(#[source] io::Error),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("Unknown block kind: {0}")]
    UnknownBlock(String),
}
