//! Slot → wall-clock conversions for feed bucketing.

use serde::{Deserialize, Serialize};

/// Derives Unix timestamps and epoch numbers from slots.
///
/// After the base slot the chain runs at one slot per second, so a
/// timestamp is an offset from the base slot's wall-clock time and an epoch
/// is a fixed-length window of slots. The mainnet constants anchor at the
/// Shelley boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClock {
    /// Unix time of `base_slot`.
    pub system_start: i64,
    /// First slot of the one-second-slot era.
    pub base_slot: u64,
    /// Epoch number at `base_slot`.
    pub base_epoch: u64,
    /// Slots per epoch.
    pub epoch_length: u64,
}

impl SlotClock {
    /// Mainnet constants.
    pub fn mainnet() -> Self {
        Self {
            system_start: 1_596_491_091,
            base_slot: 4_924_800,
            base_epoch: 209,
            epoch_length: 432_000,
        }
    }

    /// Unix timestamp of `slot`.
    pub fn timestamp(&self, slot: u64) -> i64 {
        self.system_start + (slot as i64 - self.base_slot as i64)
    }

    /// Epoch number containing `slot`.
    pub fn epoch(&self, slot: u64) -> u64 {
        self.base_epoch + slot.saturating_sub(self.base_slot) / self.epoch_length
    }

    /// Wall-clock time of `slot`, for logs and operator tooling.
    pub fn datetime(&self, slot: u64) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.timestamp(slot), 0)
    }
}

impl Default for SlotClock {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_slot_anchors() {
        let clock = SlotClock::mainnet();
        assert_eq!(clock.timestamp(4_924_800), 1_596_491_091);
        assert_eq!(clock.epoch(4_924_800), 209);
    }

    #[test]
    fn later_slot_conversions() {
        let clock = SlotClock::mainnet();
        assert_eq!(clock.timestamp(87_848_215), 1_679_414_506);
        assert_eq!(clock.epoch(87_848_215), 400);
    }

    #[test]
    fn epoch_boundary() {
        let clock = SlotClock::mainnet();
        assert_eq!(clock.epoch(4_924_800 + 431_999), 209);
        assert_eq!(clock.epoch(4_924_800 + 432_000), 210);
    }

    #[test]
    fn datetime_matches_timestamp() {
        let clock = SlotClock::mainnet();
        let datetime = clock.datetime(4_924_800).unwrap();
        assert_eq!(datetime.timestamp(), 1_596_491_091);
    }
}
