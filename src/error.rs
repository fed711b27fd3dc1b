use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid training options: {}", .0.join("; "))]
    InvalidOptions(Vec<String>),

    #[error("Length mismatch: {what} has length {actual}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Part index {index} out of range for object with {num_parts} parts")]
    PartIndexOutOfRange { index: usize, num_parts: usize },

    #[error("Unsupported image type {0}, must be 8bit gray or RGB image")]
    UnsupportedPixelFormat(String),

    #[error("All objects must agree on the number of parts: expected {expected}, got {actual}")]
    InconsistentPartCount { expected: usize, actual: usize },

    #[error("Training requires at least one object with at least one part")]
    EmptyTrainingSet,

    #[error("Rectangle ({left}, {top}, {right}, {bottom}) has no area")]
    DegenerateRectangle {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },

    #[error("Landmark {0} is not present in any training object")]
    MissingLandmark(usize),

    #[error("Part {part} of object {object} in image {image} is not finite")]
    NonFinitePart {
        image: usize,
        object: usize,
        part: usize,
    },

    #[error("Scale {value} of object {object} in image {image} must be finite and positive")]
    InvalidScale {
        image: usize,
        object: usize,
        value: f64,
    },

    #[error("Initialization offset must be finite, got {0}")]
    InvalidOffset(f32),

    #[error("No present landmarks to evaluate")]
    NoEvaluablePoints,

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
