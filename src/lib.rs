use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod evaluate;
pub mod index;
pub mod scrapers;
pub mod search;
pub mod training;
pub mod web;
