use thiserror::Error;

pub type MitmResult<T> = std::result::Result<T, MitmError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MitmError {
    #[error("The constant {0:#x} is even and has no multiplicative inverse modulo a power of two")]
    InvalidConstant(u64),

    #[error("The value {value:#x} does not fit in {width} bits")]
    WidthMismatch { value: u64, width: u32 },

    #[error("The segment set at position {index} has no candidates")]
    EmptySegmentSet { index: usize },

    #[error("Only widths between 1 and 64 bits are supported, but the provided width is {0}")]
    UnsupportedWidth(u32),

    #[error("A shift of {shift} bits does not give a bijective stage on {width}-bit words")]
    InvalidShift { shift: u32, width: u32 },

    #[error("Invalid pattern at position {position}: {reason}")]
    Pattern { position: usize, reason: String },

    #[error("The search space holds more combinations than a table can store")]
    SearchSpaceTooLarge,
}
