use thiserror::Error;

use crate::model::Timestamp;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt segment frame at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("interval ends before it starts ({start} > {end})")]
    InvalidInterval { start: Timestamp, end: Timestamp },
}

pub type Result<T> = std::result::Result<T, Error>;
