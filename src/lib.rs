pub mod command;
pub mod config;
pub mod connection;
pub mod maintenance;
pub mod util;

use mio::Token;
use thiserror::{self, Error};

/// Token of the listening socket, client tokens count up from here
pub const SERVER: Token = Token(0);

#[derive(Debug, Error)]
pub enum ServerError {
    /// Derived IO error
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Derived dictionary error
    #[error("Dict error: {0}")]
    Dict(#[from] dict::DictError),

    /// An environment variable held something we could not use
    #[error("Invalid value {value:?} for {var}")]
    InvalidConfig { var: &'static str, value: String },
}
