//! Error types for the tracked allocator.

use crate::allocators::AllocError;
use crate::api::zones::ZoneId;

/// Errors surfaced by [`TrackedAllocator`](crate::TrackedAllocator).
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The underlying allocator could not satisfy the request.
    #[error("out of memory ({requested} bytes requested)")]
    OutOfMemory { requested: usize },

    /// The underlying allocator rejected the size.
    #[error("invalid allocation size: {size}")]
    InvalidSize { size: usize },

    /// The underlying allocator cannot resize.
    #[error("resize is not supported by the underlying allocator")]
    ResizeUnsupported,

    /// Free or resize of a region with no live record (double free or a
    /// pointer that never came from this tracker).
    #[error("release of untracked region at {address:#x}")]
    UntrackedRelease { address: usize },

    /// `end_zone` did not match the innermost open zone of the thread.
    #[error(
        "cannot end {found}: innermost open zone on this thread is {}",
        .expected.map_or_else(|| "none".to_string(), |id| id.to_string())
    )]
    ZoneMismatch { expected: Option<ZoneId>, found: ZoneId },

    /// The export destination could not be written.
    #[error("export failed: {0}")]
    ExportIo(#[from] std::io::Error),
}

impl TrackError {
    /// True for errors caused by misuse of the API rather than by resources.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            TrackError::UntrackedRelease { .. } | TrackError::ZoneMismatch { .. }
        )
    }
}

impl From<AllocError> for TrackError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::OutOfMemory { requested } => TrackError::OutOfMemory { requested },
            AllocError::Unsupported => TrackError::ResizeUnsupported,
            AllocError::InvalidSize { size } => TrackError::InvalidSize { size },
        }
    }
}

/// Result alias for tracker operations.
pub type TrackResult<T> = Result<T, TrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_error_mapping() {
        assert!(matches!(
            TrackError::from(AllocError::OutOfMemory { requested: 64 }),
            TrackError::OutOfMemory { requested: 64 }
        ));
        assert!(matches!(
            TrackError::from(AllocError::Unsupported),
            TrackError::ResizeUnsupported
        ));
    }

    #[test]
    fn test_messages() {
        let err = TrackError::UntrackedRelease { address: 0xdead0 };
        assert_eq!(err.to_string(), "release of untracked region at 0xdead0");
        assert!(err.is_usage_error());
        assert!(!TrackError::ResizeUnsupported.is_usage_error());
    }
}
