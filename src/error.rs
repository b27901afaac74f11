use thiserror::Error;

use crate::shape::Shape;
use crate::sig::InterId;

#[derive(Error, Debug)]
pub enum InterError {
    #[error("Inconsistent state for inter {inter}: {message}")]
    State { inter: InterId, message: String },

    #[error("Shape {shape:?} not supported by {context}")]
    UnsupportedShape { shape: Shape, context: &'static str },

    #[error("No inter with id {0}")]
    UnknownInter(InterId),

    #[error("Invalid constants: {0}")]
    Config(String),

    #[error("Edit rejected for inter {inter}: {message}")]
    Edit { inter: InterId, message: String },
}

impl From<serde_yaml::Error> for InterError {
    fn from(e: serde_yaml::Error) -> Self {
        InterError::Config(e.to_string())
    }
}
