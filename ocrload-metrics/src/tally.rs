use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Counts occurrences per label (e.g. literal iteration outcomes).
#[derive(Debug, Default)]
pub struct Tally {
    inner: Mutex<BTreeMap<String, u64>>,
}

impl Tally {
    pub fn increment(&self, label: &str) {
        let mut inner = self.inner.lock();
        match inner.get_mut(label) {
            Some(v) => *v = v.saturating_add(1),
            None => {
                inner.insert(label.to_string(), 1);
            }
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.inner.lock().clone()
    }

    pub fn into_inner(self) -> BTreeMap<String, u64> {
        self.inner.into_inner()
    }
}
