//! In-memory [`Bus`] that records everything the service does with it.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::bus::{Bus, BusError, BusName, CallHandle, EventSender, NameHandle, ObjectPath};

#[derive(Debug, Default)]
struct Recorded {
    owned: Vec<String>,
    released: usize,
    published: Vec<(String, EventSender)>,
    completions: Vec<(CallHandle, String)>,
    notifications: Vec<String>,
}

/// Bus double recording names, objects, replies and notifications.
#[derive(Debug, Default)]
pub struct RecordingBus {
    taken: HashSet<String>,
    recorded: Mutex<Recorded>,
}

impl RecordingBus {
    /// Marks `name` as owned by another process.
    #[must_use]
    pub fn with_taken_name(mut self, name: &BusName) -> Self {
        self.taken.insert(name.to_string());
        self
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("recording bus mutex poisoned")
    }

    #[must_use]
    pub fn owned_names(&self) -> Vec<String> {
        self.recorded().owned.clone()
    }

    #[must_use]
    pub fn released(&self) -> usize {
        self.recorded().released
    }

    #[must_use]
    pub fn published_paths(&self) -> Vec<String> {
        self.recorded()
            .published
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Replies in completion order.
    #[must_use]
    pub fn completions(&self) -> Vec<(CallHandle, String)> {
        self.recorded().completions.clone()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<String> {
        self.recorded().notifications.clone()
    }
}

impl Bus for RecordingBus {
    fn own_name(&self, name: &BusName) -> Result<NameHandle, BusError> {
        if self.taken.contains(name.as_str()) {
            return Err(BusError::NameTaken {
                name: name.to_string(),
            });
        }
        let mut recorded = self.recorded();
        recorded.owned.push(name.to_string());
        Ok(NameHandle::new(recorded.owned.len() as u64))
    }

    fn release_name(&self, _handle: NameHandle) {
        self.recorded().released += 1;
    }

    fn publish_object(&self, path: &ObjectPath, events: EventSender) -> Result<(), BusError> {
        self.recorded()
            .published
            .push((path.to_string(), events));
        Ok(())
    }

    fn complete_call(&self, call: CallHandle, reply: String) {
        self.recorded().completions.push((call, reply));
    }

    fn emit_notification(&self, payload: String) {
        self.recorded().notifications.push(payload);
    }
}
