use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: {0}")]
    Other(String),
}
