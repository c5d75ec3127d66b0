use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache: {0}")]
    Other(String),
}
