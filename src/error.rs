#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("key not found")]
    NotFound,
    #[error("container is empty")]
    EmptyContainer,
    #[error("odd number of arguments ({0}) for a flat key/value list")]
    InvalidArgumentCount(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
