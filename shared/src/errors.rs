//! Shared error types for the bulk-load system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },

    #[error("Missing environment variable: {name}")]
    MissingEnv { name: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
