use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum VideoError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode video frames: {0}")]
    Decode(#[from] image::ImageError),
    #[error("{} contains no decodable frames", .0.display())]
    Empty(PathBuf),
    #[error("{} is not a GIF, still image or directory", .0.display())]
    Unsupported(PathBuf),
    #[error("decode of {} was abandoned", .0.display())]
    Cancelled(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RuleParseError {
    #[error("rule must look like B3/S23, got {0:?}")]
    Shape(String),
    #[error("neighbour count {0:?} is not a digit in 0-8")]
    Count(char),
}
