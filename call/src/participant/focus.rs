//! Stage focus selection.

use super::Participant;
use crate::session::ParticipantId;

/// Pick the participant shown large on the stage. Deterministic priority,
/// first match wins:
///
/// 1. Any screen-sharing participant (first in store order).
/// 2. The manual-focus participant, if still present.
/// 3. Any participant with camera video enabled.
/// 4. The first participant in the set, or none when empty.
///
/// Pure function, recomputed on every store update. Manual focus is only
/// cleared by staleness (the participant left), never by deselection;
/// staleness handling lives with the caller.
pub fn select_focus<'a>(participants: &'a [Participant], manual_focus: Option<&ParticipantId>) -> Option<&'a Participant> {
    if let Some(sharer) = participants.iter().find(|p| p.is_screen_sharing) {
        return Some(sharer);
    }

    if let Some(id) = manual_focus {
        if let Some(manual) = participants.iter().find(|p| &p.id == id) {
            return Some(manual);
        }
    }

    if let Some(with_video) = participants.iter().find(|p| p.is_video_enabled) {
        return Some(with_video);
    }

    participants.first()
}
