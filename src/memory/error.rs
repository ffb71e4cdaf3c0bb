use std::fmt;

#[derive(Debug)]
pub enum PoolError {
    /// The system heap refused a request.
    HeapAllocFailed(std::io::Error),
    /// The pool could neither grow from the system heap nor scavenge a
    /// larger free block to carve `block_size` blocks from.
    OutOfMemory { block_size: usize, requested: usize },
    /// A byte count computation overflowed `usize`.
    CapacityOverflow,
    /// The element type needs stronger alignment than pooled blocks provide.
    UnsupportedAlignment { align: usize },
    InvalidConfig(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::HeapAllocFailed(e) => write!(f, "system heap allocation failed: {e}"),
            PoolError::OutOfMemory { block_size, requested } => write!(
                f,
                "out of memory: could not obtain {requested} bytes for {block_size}-byte blocks"
            ),
            PoolError::CapacityOverflow => write!(f, "allocation size overflows usize"),
            PoolError::UnsupportedAlignment { align } => write!(
                f,
                "alignment {align} exceeds pooled block alignment {}",
                super::size_class::ALIGN
            ),
            PoolError::InvalidConfig(msg) => write!(f, "invalid pool configuration: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::HeapAllocFailed(e) => Some(e),
            PoolError::OutOfMemory { .. }
            | PoolError::CapacityOverflow
            | PoolError::UnsupportedAlignment { .. }
            | PoolError::InvalidConfig(_) => None,
        }
    }
}
