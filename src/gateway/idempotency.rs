//! Message-id deduplication for webhook redeliveries.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Seen {
    at: HashMap<String, Instant>,
    /// Insertion order, oldest first. May hold ids already evicted from `at`.
    order: VecDeque<(String, Instant)>,
}

/// Remembers recently seen message ids for `ttl`, holding at most
/// `max_entries` of them.
pub struct IdempotencyStore {
    seen: Mutex<Seen>,
    ttl: Duration,
    max_entries: usize,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: Mutex::new(Seen {
                at: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Record `message_id`. Returns `true` the first time an id is seen
    /// within the TTL and `false` for a redelivery.
    pub fn check_and_record(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&at) = seen.at.get(message_id) {
            if now.duration_since(at) < self.ttl {
                return false;
            }
        }

        Self::expire(&mut seen, now, self.ttl);
        while seen.at.len() >= self.max_entries {
            match seen.order.pop_front() {
                Some((id, at)) => {
                    if seen.at.get(&id) == Some(&at) {
                        seen.at.remove(&id);
                    }
                }
                None => break,
            }
        }

        seen.at.insert(message_id.to_string(), now);
        seen.order.push_back((message_id.to_string(), now));
        true
    }

    fn expire(seen: &mut Seen, now: Instant, ttl: Duration) {
        while let Some((id, at)) = seen.order.front() {
            if now.duration_since(*at) < ttl {
                break;
            }
            if seen.at.get(id) == Some(at) {
                seen.at.remove(id);
            }
            seen.order.pop_front();
        }
    }

    /// Forget `message_id` so its next delivery is accepted again.
    pub fn forget(&self, message_id: &str) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.at.remove(message_id);
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
