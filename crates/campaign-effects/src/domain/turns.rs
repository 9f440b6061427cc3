//! Turn bookkeeping for applied effect instances.

use campaign_core::model::AppliedEffectInstance;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Row counts of a bulk turn advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TurnSummary {
    /// Instances whose remaining duration was decremented.
    pub updated_count: u64,
    /// Instances retired.
    pub expired_count: u64,
}

/// Advances one live instance by a turn, retiring it once no duration
/// remains. Returns `true` if the instance was retired.
pub fn advance_instance(instance: &mut AppliedEffectInstance, now: DateTime<Utc>) -> bool {
    instance.duration_remaining -= 1;
    if instance.duration_remaining <= 0 {
        instance.deleted_at = Some(now);
        return true;
    }
    false
}
