//! Test fixtures for flat batch scenarios
//!
//! [`BatchBuilder`] numbers items densely in the order they are added, so
//! scenarios read as the list a client would submit.

use ofswitch_batch::{BatchItem, BatchOperation, FlatBatchRequest};
use ofswitch_types::{
    Bucket, DeviceRef, FlowEntry, FlowId, GroupEntry, GroupId, GroupType, MeterBand,
    MeterBandKind, MeterEntry, MeterId,
};

/// Builds an ordered flat batch.
#[derive(Debug, Clone, Default)]
pub struct BatchBuilder {
    items: Vec<BatchItem>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation with the next batch order.
    pub fn push(mut self, operation: BatchOperation) -> Self {
        let batch_order = self.items.len() as u32;
        self.items.push(BatchItem::new(batch_order, operation));
        self
    }

    pub fn flow_add(self, id: &str) -> Self {
        self.push(BatchOperation::FlowAdd {
            flow: entity_fixtures::flow(id),
        })
    }

    pub fn flow_remove(self, id: &str) -> Self {
        self.push(BatchOperation::FlowRemove {
            flow: entity_fixtures::flow(id),
        })
    }

    /// Updates the flow's priority from 42 to 43.
    pub fn flow_update(self, id: &str) -> Self {
        self.push(BatchOperation::FlowUpdate {
            original: entity_fixtures::flow(id).with_priority(42),
            updated: entity_fixtures::flow(id).with_priority(43),
        })
    }

    pub fn group_add(self, id: u32) -> Self {
        self.push(BatchOperation::GroupAdd {
            group: entity_fixtures::group(id),
        })
    }

    pub fn group_remove(self, id: u32) -> Self {
        self.push(BatchOperation::GroupRemove {
            group: entity_fixtures::group(id),
        })
    }

    /// Switches the group from `all` to `select`.
    pub fn group_update(self, id: u32) -> Self {
        let original = entity_fixtures::group(id);
        let mut updated = original.clone();
        updated.group_type = GroupType::Select;
        self.push(BatchOperation::GroupUpdate { original, updated })
    }

    pub fn meter_add(self, id: u32) -> Self {
        self.push(BatchOperation::MeterAdd {
            meter: entity_fixtures::meter(id),
        })
    }

    pub fn meter_remove(self, id: u32) -> Self {
        self.push(BatchOperation::MeterRemove {
            meter: entity_fixtures::meter(id),
        })
    }

    /// Doubles the meter's drop rate.
    pub fn meter_update(self, id: u32) -> Self {
        let original = entity_fixtures::meter(id);
        let mut updated = original.clone();
        for band in &mut updated.bands {
            band.rate *= 2;
        }
        self.push(BatchOperation::MeterUpdate { original, updated })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn build(self) -> Vec<BatchItem> {
        self.items
    }

    /// Wraps the items into a request for `device`.
    pub fn request(self, device: DeviceRef, exit_on_first_error: bool) -> FlatBatchRequest {
        FlatBatchRequest {
            node: device,
            items: self.items,
            exit_on_first_error,
            barrier_requested: None,
        }
    }
}

/// Entity payload fixtures
pub mod entity_fixtures {
    use super::*;

    /// Flow with a fixed match and output action.
    ///
    /// Panics on an invalid id; fixtures are only built from literals.
    pub fn flow(id: &str) -> FlowEntry {
        FlowEntry::new(FlowId::new(id).expect("valid flow id"))
            .with_priority(42)
            .with_match("in_port", "1")
            .with_instruction("output:2")
    }

    /// Flow forwarding to group `group_id`.
    pub fn flow_to_group(id: &str, group_id: u32) -> FlowEntry {
        FlowEntry::new(FlowId::new(id).expect("valid flow id"))
            .with_match("in_port", "1")
            .with_instruction(format!("group:{}", group_id))
    }

    /// All-type group with one output bucket.
    pub fn group(id: u32) -> GroupEntry {
        GroupEntry::new(GroupId::new(id).expect("valid group id"), GroupType::All).with_bucket(
            Bucket {
                actions: vec!["output:3".to_string()],
                ..Default::default()
            },
        )
    }

    /// Meter with one 1000 kbps drop band.
    pub fn meter(id: u32) -> MeterEntry {
        let mut meter = MeterEntry::new(MeterId::new(id).expect("valid meter id")).with_band(
            MeterBand {
                kind: MeterBandKind::Drop,
                rate: 1000,
                burst_size: 0,
            },
        );
        meter.flags.kbps = true;
        meter
    }
}
