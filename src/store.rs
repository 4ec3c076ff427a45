use chrono::{NaiveDate, NaiveTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{BookingRecord, BookingStatus, NewBooking};
use crate::storage::{Storage, StorageError};

const BOOKINGS_KEY: &str = "massage_bookings";

pub const OPENING_HOUR: u32 = 9;
pub const CLOSING_HOUR: u32 = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("booking {0} not found")]
    NotFound(String),
    #[error("the {date} {time} slot is already booked")]
    SlotTaken { date: NaiveDate, time: NaiveTime },
    #[error("cannot move a {from} booking to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The half-hour grid across business hours: 09:00 through 20:00 inclusive,
/// with no 20:30. 23 slots.
pub fn slot_grid() -> Vec<NaiveTime> {
    let mut slots = Vec::with_capacity(23);
    for hour in OPENING_HOUR..=CLOSING_HOUR {
        slots.push(NaiveTime::from_hms_opt(hour, 0, 0).unwrap());
        if hour < CLOSING_HOUR {
            slots.push(NaiveTime::from_hms_opt(hour, 30, 0).unwrap());
        }
    }
    slots
}

/// Sole authority over the persisted booking collection and slot
/// availability. Single writer; callers hold it behind one lock.
pub struct BookingStore {
    storage: Storage,
    bookings: Vec<BookingRecord>,
}

impl BookingStore {
    pub async fn load(storage: Storage) -> Result<Self, StoreError> {
        storage.ensure_dir().await?;
        let bookings = storage.load(BOOKINGS_KEY).await?;
        Ok(Self { storage, bookings })
    }

    /// Writes a candidate collection to storage before adopting it, so a
    /// failed write never leaves memory ahead of disk.
    async fn commit(&mut self, next: Vec<BookingRecord>) -> Result<(), StoreError> {
        self.storage.persist(BOOKINGS_KEY, &next).await?;
        self.bookings = next;
        Ok(())
    }

    /// Persists a finished draft. The slot must still be free: a
    /// non-cancelled booking on the same (date, time) pair rejects the
    /// create, closing the availability-read/create race.
    pub async fn create(&mut self, draft: NewBooking) -> Result<BookingRecord, StoreError> {
        if self.slot_taken(draft.date, draft.time) {
            return Err(StoreError::SlotTaken {
                date: draft.date,
                time: draft.time,
            });
        }

        let record = BookingRecord {
            id: Uuid::new_v4().to_string(),
            service: draft.service,
            addons: draft.addons,
            date: draft.date,
            time: draft.time,
            therapist: draft.therapist,
            customer: draft.customer,
            payment_method: draft.payment_method,
            total: draft.total,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut next = self.bookings.clone();
        next.push(record.clone());
        self.commit(next).await?;

        log::info!(
            "booking {} created: {} on {} at {}",
            record.id,
            record.service.name,
            record.date,
            record.time.format("%H:%M")
        );
        Ok(record)
    }

    pub fn list_all(&self) -> &[BookingRecord] {
        &self.bookings
    }

    pub fn find_by_id(&self, id: &str) -> Option<&BookingRecord> {
        self.bookings.iter().find(|booking| booking.id == id)
    }

    pub async fn update_status(
        &mut self,
        id: &str,
        status: BookingStatus,
    ) -> Result<BookingRecord, StoreError> {
        let index = self
            .bookings
            .iter()
            .position(|booking| booking.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !self.bookings[index].status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: self.bookings[index].status,
                to: status,
            });
        }

        let mut next = self.bookings.clone();
        next[index].status = status;
        next[index].updated_at = Some(Utc::now());
        let updated = next[index].clone();

        self.commit(next).await?;
        log::info!("booking {id} moved to {status}");
        Ok(updated)
    }

    /// Removes a booking by identity. Unknown ids fall through silently,
    /// matching the collection-filter semantics of deletion.
    pub async fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let mut next = self.bookings.clone();
        next.retain(|booking| booking.id != id);
        self.commit(next).await
    }

    /// The slot grid for `date`, minus times held by non-cancelled bookings
    /// on that date. Ascending by time of day.
    pub fn available_slots(&self, date: NaiveDate) -> Vec<NaiveTime> {
        slot_grid()
            .into_iter()
            .filter(|slot| !self.slot_taken(date, *slot))
            .collect()
    }

    fn slot_taken(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.bookings.iter().any(|booking| {
            booking.date == date
                && booking.time == time
                && booking.status != BookingStatus::Cancelled
        })
    }
}
