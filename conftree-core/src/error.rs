use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parent: expected a config name, a Configuration or none, got {0}")]
    InvalidParentType(String),

    #[error("config is locked, cannot write '{0}'")]
    Locked(String),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("no config named '{0}'")]
    UnknownName(String),
}
