//! Per-vector synchronization settings.

use serde::{Deserialize, Serialize};

use crate::algs::communicator::CommTag;

/// Default tag for cumulate exchanges.
pub const DEFAULT_SYNC_TAG: u16 = 0x50C0;

/// Knobs for a vector's cumulate/reduction path.
///
/// Vectors that synchronize concurrently over the same communicator must use
/// distinct tags; everything else can keep the default.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Message tag used by `cumulate`.
    pub tag: u16,
    /// Reject operands bound to different partitions before combining them.
    pub validate_layouts: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_SYNC_TAG,
            validate_layouts: true,
        }
    }
}

impl SyncConfig {
    #[inline]
    pub const fn comm_tag(&self) -> CommTag {
        CommTag::new(self.tag)
    }

    /// Same settings on a different tag.
    #[inline]
    pub const fn with_tag(self, tag: u16) -> Self {
        Self { tag, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.tag, DEFAULT_SYNC_TAG);
        assert!(cfg.validate_layouts);
        assert_eq!(cfg.comm_tag().as_u16(), DEFAULT_SYNC_TAG);
    }

    #[test]
    fn with_tag_keeps_other_fields() {
        let cfg = SyncConfig {
            validate_layouts: false,
            ..SyncConfig::default()
        }
        .with_tag(0x0101);
        assert_eq!(cfg.tag, 0x0101);
        assert!(!cfg.validate_layouts);
    }
}
