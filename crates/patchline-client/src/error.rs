//! Error types for the client subsystem.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Message(#[from] patchline_midi::Error),

    #[error("client already has {max} ports")]
    TooManyPorts { max: usize },

    #[error("a port named \"{0}\" already exists")]
    DuplicatePort(String),

    #[error("no port named \"{0}\"")]
    UnknownPort(String),

    #[error("port \"{0}\" is not serviced by this client")]
    Unserviced(String),

    #[error("port \"{0}\" is not an output port")]
    NotOutput(String),

    #[error("client is closed")]
    Closed,

    #[error("driver error: {0}")]
    Driver(String),
}

pub type Result<T> = std::result::Result<T, Error>;
