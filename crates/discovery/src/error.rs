use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlattenError>;

#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Payload is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Payload is a bare {0}, expected an object or array")]
    NotAContainer(&'static str),
}
