//! Per-face record replication
//!
//! One document capture can show several faces. Each face gets its own copy
//! of the record, identical except for the image reference.

use tracing::{error, info, warn};

use crate::document::{DocumentRecord, ImageRef};
use crate::storage::RecordSink;

/// Outcome of replicating one record across detected faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutReport {
    /// No face image was available; nothing was stored
    NoFaces,
    /// Every face was submitted; `failed` submissions were rejected by storage
    Submitted { stored: usize, failed: usize },
}

impl FanOutReport {
    pub fn stored(&self) -> usize {
        match self {
            FanOutReport::NoFaces => 0,
            FanOutReport::Submitted { stored, .. } => *stored,
        }
    }
}

/// Store one copy of `template` per face image, in face order.
///
/// Each submission is independent: a storage failure is logged and the
/// remaining faces are still submitted.
pub fn fan_out(
    template: &DocumentRecord,
    face_refs: &[ImageRef],
    sink: &mut dyn RecordSink,
) -> FanOutReport {
    if face_refs.is_empty() {
        warn!("No faces found, nothing stored");
        return FanOutReport::NoFaces;
    }

    let mut stored = 0;
    let mut failed = 0;

    for face_ref in face_refs {
        let replica = template.with_image_ref(face_ref.clone());
        match sink.store(&replica) {
            Ok(()) => {
                info!("Stored {:?} record for {}", replica.document_type(), face_ref);
                stored += 1;
            }
            Err(e) => {
                error!("Failed to store record for {}: {}", face_ref, e);
                failed += 1;
            }
        }
    }

    FanOutReport::Submitted { stored, failed }
}
