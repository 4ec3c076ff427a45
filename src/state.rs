use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::contact::ContactLog;
use crate::models::BookingRecord;
use crate::store::BookingStore;
use crate::wizard::BookingWizard;

/// How long an untouched draft stays addressable.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);
/// Hard cap on concurrent drafts; opening sessions is unauthenticated.
pub const MAX_SESSIONS: usize = 256;

struct WizardSession {
    wizard: BookingWizard,
    expires_at: Instant,
    serial: u64,
}

/// Wizard sessions are in-memory only: a draft never outlives the process,
/// expires after [`SESSION_TTL`], and the oldest draft is dropped when the
/// map is full.
#[derive(Default)]
pub struct WizardSessions {
    sessions: HashMap<String, WizardSession>,
    next_serial: u64,
}

impl WizardSessions {
    pub fn insert(&mut self, id: String, wizard: BookingWizard) {
        let now = Instant::now();
        self.sessions.retain(|_, session| now < session.expires_at);
        while self.sessions.len() >= MAX_SESSIONS {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, session)| session.serial)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(oldest) => {
                    log::warn!("session map full, dropping abandoned draft {oldest}");
                    self.sessions.remove(&oldest);
                }
                None => break,
            }
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        self.sessions.insert(
            id,
            WizardSession {
                wizard,
                expires_at: now + SESSION_TTL,
                serial,
            },
        );
    }

    /// An expired session is indistinguishable from one that never existed.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut BookingWizard> {
        if self
            .sessions
            .get(id)
            .is_some_and(|session| Instant::now() >= session.expires_at)
        {
            self.sessions.remove(id);
        }
        self.sessions.get_mut(id).map(|session| &mut session.wizard)
    }

    pub fn remove(&mut self, id: &str) {
        self.sessions.remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    fn expire(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.expires_at = Instant::now();
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<BookingStore>>,
    pub contact: Arc<Mutex<ContactLog>>,
    pub wizards: Arc<Mutex<WizardSessions>>,
    pub events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub fn new(store: BookingStore, contact: ContactLog) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store: Arc::new(Mutex::new(store)),
            contact: Arc::new(Mutex::new(contact)),
            wizards: Arc::new(Mutex::new(WizardSessions::default())),
            events,
        }
    }

    pub fn publish(&self, event: ServerEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub booking_id: String,
    pub status: String,
    pub service: String,
    pub date: String,
    pub time: String,
    pub customer_name: String,
    pub total: u32,
}

impl ServerEvent {
    pub fn from_record(kind: &str, record: &BookingRecord) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: record.id.clone(),
            status: record.status.to_string(),
            service: record.service.name.clone(),
            date: record.date.to_string(),
            time: record.time.format("%H:%M").to_string(),
            customer_name: format!(
                "{} {}",
                record.customer.first_name, record.customer.last_name
            ),
            total: record.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(count: usize) -> WizardSessions {
        let mut sessions = WizardSessions::default();
        for i in 0..count {
            sessions.insert(format!("session-{i}"), BookingWizard::new());
        }
        sessions
    }

    #[test]
    fn full_map_drops_the_oldest_draft() {
        let mut sessions = filled(MAX_SESSIONS);
        assert!(sessions.get_mut("session-0").is_some());

        sessions.insert("one-more".into(), BookingWizard::new());
        assert_eq!(sessions.len(), MAX_SESSIONS);
        assert!(sessions.get_mut("session-0").is_none());
        assert!(sessions.get_mut("session-1").is_some());
        assert!(sessions.get_mut("one-more").is_some());
    }

    #[test]
    fn expired_drafts_are_unreachable_and_swept() {
        let mut sessions = filled(3);

        sessions.expire("session-1");
        assert!(sessions.get_mut("session-1").is_none());
        assert!(sessions.get_mut("session-0").is_some());
        assert_eq!(sessions.len(), 2);

        // inserting sweeps whatever else has expired in the meantime
        sessions.expire("session-2");
        sessions.insert("fresh".into(), BookingWizard::new());
        assert_eq!(sessions.len(), 2);
        assert!(sessions.get_mut("session-2").is_none());
        assert!(sessions.get_mut("fresh").is_some());
    }
}
