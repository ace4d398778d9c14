use crate::config::ConfigError;
use crate::persist::PersistenceError;
use crate::secret::DecodeError;

/// Everything that can stop the program.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("not a compatible Google secret key: {0}")]
    Secret(#[from] DecodeError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
}
