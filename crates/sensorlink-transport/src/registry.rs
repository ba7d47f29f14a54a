use sensorlink_radio::NodeId;

use crate::endpoint::{Callbacks, Endpoint};

/// Fixed-capacity endpoint table keyed by (channel, initiator).
///
/// Slots are allocated once and never grow. A slot is free until an
/// endpoint with at least one callback is bound into it, and becomes free
/// again on destruct.
#[derive(Debug)]
pub struct Registry<C> {
    slots: Vec<Option<Endpoint<C>>>,
}

impl<C: Copy + Eq> Registry<C> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the live endpoint for (`channel`, `initiator`); failing
    /// that, if `create`, the first free slot.
    pub fn find_or_create(&self, channel: C, initiator: bool, create: bool) -> Option<usize> {
        let mut free = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(ep) if ep.used() => {
                    if ep.channel() == channel && ep.initiator() == initiator {
                        return Some(idx);
                    }
                }
                _ => {
                    if free.is_none() {
                        free = Some(idx);
                    }
                }
            }
        }
        if create {
            free
        } else {
            None
        }
    }

    pub fn find(&self, channel: C, initiator: bool) -> Option<usize> {
        self.find_or_create(channel, initiator, false)
    }

    /// Bind an endpoint into slot `idx`, reinitializing whatever was there.
    pub fn bind(
        &mut self,
        idx: usize,
        remote_address: NodeId,
        channel: C,
        initiator: bool,
        callbacks: Callbacks<C>,
    ) {
        let Some(slot) = self.slots.get_mut(idx) else {
            return;
        };
        match slot {
            Some(ep) => ep.init(remote_address, channel, initiator, callbacks),
            None => *slot = Some(Endpoint::new(remote_address, channel, initiator, callbacks)),
        }
    }

    /// Live endpoint in slot `idx`.
    pub fn get(&self, idx: usize) -> Option<&Endpoint<C>> {
        self.slots
            .get(idx)
            .and_then(Option::as_ref)
            .filter(|ep| ep.used())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Endpoint<C>> {
        self.slots
            .get_mut(idx)
            .and_then(Option::as_mut)
            .filter(|ep| ep.used())
    }

    /// Number of live endpoints.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live endpoints with their slot index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Endpoint<C>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().filter(|ep| ep.used()).map(|ep| (idx, ep)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> Callbacks<u16> {
        Callbacks::new().on_event(|_, _| {})
    }

    #[test]
    fn find_or_create_prefers_match() {
        let mut registry = Registry::new(4);
        registry.bind(0, 2, 10u16, true, live());
        registry.bind(1, 2, 11u16, true, live());

        assert_eq!(registry.find_or_create(11, true, true), Some(1));
        assert_eq!(registry.find_or_create(11, false, false), None);
        assert_eq!(registry.find_or_create(11, false, true), Some(2));
    }

    #[test]
    fn first_free_slot_is_reused() {
        let mut registry = Registry::new(3);
        registry.bind(0, 2, 1u16, true, live());
        registry.bind(1, 2, 2u16, true, live());
        registry.get_mut(0).unwrap().destruct();

        assert_eq!(registry.find_or_create(3, true, true), Some(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn destructed_slot_never_matches() {
        let mut registry = Registry::new(2);
        registry.bind(0, 2, 7u16, true, live());
        registry.get_mut(0).unwrap().destruct();

        assert_eq!(registry.find(7, true), None);
        assert!(registry.get(0).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn full_registry_has_no_free_slot() {
        let mut registry = Registry::new(2);
        registry.bind(0, 2, 1u16, true, live());
        registry.bind(1, 2, 2u16, true, live());

        assert_eq!(registry.find_or_create(3, true, true), None);
        assert_eq!(registry.capacity(), 2);
    }

    #[test]
    fn binding_without_callbacks_leaves_slot_free() {
        let mut registry = Registry::new(1);
        registry.bind(0, 2, 1u16, true, Callbacks::new());
        assert_eq!(registry.find(1, true), None);
        assert_eq!(registry.find_or_create(1, true, true), Some(0));
    }

    #[test]
    fn iter_lists_live_endpoints() {
        let mut registry = Registry::new(4);
        registry.bind(1, 2, 5u16, false, live());
        registry.bind(3, 2, 6u16, true, live());
        let slots: Vec<usize> = registry.iter().map(|(idx, _)| idx).collect();
        assert_eq!(slots, vec![1, 3]);
    }
}
