use thiserror::Error;

use drawx_render::RenderError;
use drawx_store::StoreError;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Bad arguments: {0}")]
    Usage(String),
}
