use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("chain id check failed, expected {expected}, got {actual}")]
    CheckChainErr { expected: String, actual: String },
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    TooLarge(String),
    #[error("Server configuration error - {0}")]
    Config(String),
    #[error("Internal Error:: {0}")]
    Internal(String),
    #[error("Web3 error {0}")]
    Web3(#[from] web3::Error),
    #[error("Contract error {0}")]
    Contract(#[from] web3::contract::Error),
    #[error("Abi error {0}")]
    Abi(#[from] web3::ethabi::Error),
    #[error("Http error {0}")]
    Http(#[from] reqwest::Error),
    #[error("Csv error {0}")]
    Csv(#[from] csv::Error),
    #[error("Io error {0}")]
    Io(#[from] std::io::Error),
    #[error("Json error {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error {0}")]
    Db(#[from] redis::RedisError),
}

impl Error {
    /// HTTP status code the error is reported with.
    pub fn code(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,
            Error::Unauthorized => 401,
            Error::NotFound(_) => 404,
            Error::TooLarge(_) => 413,
            Error::Fetch(_) | Error::Http(_) => 502,
            _ => 500,
        }
    }
}
