use chrono::{Duration, Local, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog;
use crate::models::{
    AddonSelection, BookingRecord, Customer, NewBooking, PaymentMethod, ServiceSelection,
};
use crate::store::{BookingStore, StoreError};

/// Bookings may be placed up to 30 days out.
pub const BOOKING_WINDOW_DAYS: i64 = 30;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d{10,}$").unwrap());

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("unknown service '{0}'")]
    UnknownService(String),
    #[error("unknown add-on '{0}'")]
    UnknownAddon(String),
    #[error("unknown therapist '{0}'")]
    UnknownTherapist(String),
    #[error("please select a service")]
    ServiceRequired,
    #[error("please select a date")]
    DateRequired,
    #[error("please select a time")]
    TimeRequired,
    #[error("{0} is required")]
    FieldRequired(&'static str),
    #[error("please enter a valid email address")]
    InvalidEmail,
    #[error("please enter a valid phone number")]
    InvalidPhone,
    #[error("date must be between {earliest} and {latest}")]
    DateOutOfRange {
        earliest: NaiveDate,
        latest: NaiveDate,
    },
    #[error("that time is not available")]
    TimeUnavailable,
    #[error("please fill in your details first")]
    CustomerRequired,
    #[error("please accept the terms and conditions")]
    TermsRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The four ordered wizard steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Service,
    Schedule,
    Customer,
    Review,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        match self {
            WizardStep::Service => 1,
            WizardStep::Schedule => 2,
            WizardStep::Customer => 3,
            WizardStep::Review => 4,
        }
    }

    fn next(self) -> WizardStep {
        match self {
            WizardStep::Service => WizardStep::Schedule,
            WizardStep::Schedule => WizardStep::Customer,
            WizardStep::Customer | WizardStep::Review => WizardStep::Review,
        }
    }

    fn previous(self) -> WizardStep {
        match self {
            WizardStep::Service | WizardStep::Schedule => WizardStep::Service,
            WizardStep::Customer => WizardStep::Schedule,
            WizardStep::Review => WizardStep::Customer,
        }
    }
}

/// Customer-details form input, untrimmed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub first_time: bool,
    #[serde(default)]
    pub email_updates: bool,
    #[serde(default)]
    pub therapist: Option<String>,
}

/// The in-progress booking under construction. Discarded wholesale once a
/// record is created from it.
#[derive(Debug, Clone, Default)]
pub struct BookingDraft {
    pub service: Option<ServiceSelection>,
    pub addons: Vec<AddonSelection>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub therapist: Option<String>,
    pub customer: Option<Customer>,
    pub payment_method: PaymentMethod,
    pub total: u32,
}

/// Review-step projection of the draft.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub service: Option<String>,
    pub duration_minutes: Option<u32>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub therapist: String,
    pub addons: Vec<AddonSelection>,
    pub payment_method: PaymentMethod,
    pub total: u32,
}

/// Step-indexed draft of a booking. Each forward transition is gated on the
/// current step's validation; going backward never validates.
#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: WizardStep,
    draft: BookingDraft,
    offered_slots: Option<Vec<NaiveTime>>,
}

impl Default for BookingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Service,
            draft: BookingDraft::default(),
            offered_slots: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    /// Slots returned by the most recent availability query, if any.
    pub fn offered_slots(&self) -> Option<&[NaiveTime]> {
        self.offered_slots.as_deref()
    }

    pub fn select_service(&mut self, service_id: &str) -> Result<(), WizardError> {
        let service = catalog::find_service(service_id)
            .ok_or_else(|| WizardError::UnknownService(service_id.to_string()))?;
        self.draft.service = Some(service);
        self.recompute_total();
        Ok(())
    }

    pub fn toggle_addon(&mut self, addon_id: &str, selected: bool) -> Result<(), WizardError> {
        if selected {
            let addon = catalog::find_addon(addon_id)
                .ok_or_else(|| WizardError::UnknownAddon(addon_id.to_string()))?;
            if !self.draft.addons.iter().any(|a| a.id == addon.id) {
                self.draft.addons.push(addon);
            }
        } else {
            self.draft.addons.retain(|a| a.id != addon_id);
        }
        self.recompute_total();
        Ok(())
    }

    /// Sets the draft date and refreshes the offered slot list from the
    /// store. A previously chosen time that is no longer offered is cleared.
    pub fn select_date(
        &mut self,
        date: NaiveDate,
        store: &BookingStore,
    ) -> Result<&[NaiveTime], WizardError> {
        let earliest = Local::now().date_naive();
        let latest = earliest + Duration::days(BOOKING_WINDOW_DAYS);
        if date < earliest || date > latest {
            return Err(WizardError::DateOutOfRange { earliest, latest });
        }

        let slots = store.available_slots(date);
        if let Some(time) = self.draft.time {
            if !slots.contains(&time) {
                self.draft.time = None;
            }
        }
        self.draft.date = Some(date);
        self.offered_slots = Some(slots);
        Ok(self.offered_slots.as_deref().unwrap_or_default())
    }

    /// The chosen time must come from the most recent availability query.
    pub fn select_time(&mut self, time: NaiveTime) -> Result<(), WizardError> {
        let offered = self
            .offered_slots
            .as_deref()
            .ok_or(WizardError::DateRequired)?;
        if !offered.contains(&time) {
            return Err(WizardError::TimeUnavailable);
        }
        self.draft.time = Some(time);
        Ok(())
    }

    pub fn set_customer(&mut self, form: CustomerForm) -> Result<(), WizardError> {
        let first_name = form.first_name.trim();
        let last_name = form.last_name.trim();
        let email = form.email.trim();
        let phone = form.phone.trim();

        if first_name.is_empty() {
            return Err(WizardError::FieldRequired("first name"));
        }
        if last_name.is_empty() {
            return Err(WizardError::FieldRequired("last name"));
        }
        if email.is_empty() {
            return Err(WizardError::FieldRequired("email"));
        }
        if phone.is_empty() {
            return Err(WizardError::FieldRequired("phone"));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(WizardError::InvalidEmail);
        }
        if !is_valid_phone(phone) {
            return Err(WizardError::InvalidPhone);
        }

        let therapist = match form.therapist.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) => {
                if catalog::therapist_name(id).is_none() {
                    return Err(WizardError::UnknownTherapist(id.to_string()));
                }
                Some(id.to_string())
            }
        };

        self.draft.customer = Some(Customer {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            special_requests: form
                .special_requests
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            first_time: form.first_time,
            email_updates: form.email_updates,
        });
        self.draft.therapist = therapist;
        Ok(())
    }

    pub fn set_payment(&mut self, method: PaymentMethod) {
        self.draft.payment_method = method;
    }

    /// Validates the current step and moves forward on success, capped at
    /// Review. Entering Review refreshes the running total.
    pub fn advance(&mut self) -> Result<WizardStep, WizardError> {
        self.validate_step(self.step)?;
        let next = self.step.next();
        if next == WizardStep::Review {
            self.recompute_total();
        }
        self.step = next;
        Ok(next)
    }

    /// Moves backward without validation, floored at the first step.
    pub fn retreat(&mut self) -> WizardStep {
        self.step = self.step.previous();
        self.step
    }

    pub fn summary(&self) -> BookingSummary {
        let therapist = self
            .draft
            .therapist
            .as_deref()
            .and_then(catalog::therapist_name)
            .unwrap_or("No preference");

        BookingSummary {
            service: self.draft.service.as_ref().map(|s| s.name.clone()),
            duration_minutes: self.draft.service.as_ref().map(|s| s.duration_minutes),
            date: self.draft.date,
            time: self.draft.time.map(|t| t.format("%H:%M").to_string()),
            therapist: therapist.to_string(),
            addons: self.draft.addons.clone(),
            payment_method: self.draft.payment_method,
            total: self.draft.total,
        }
    }

    /// Final-step submission: checks terms acceptance, revalidates the whole
    /// draft, and hands a finished record to the store. On success the
    /// wizard resets to an empty step-1 draft; on any failure the draft is
    /// kept so the user may retry.
    pub async fn submit(
        &mut self,
        terms_accepted: bool,
        store: &mut BookingStore,
    ) -> Result<BookingRecord, WizardError> {
        if !terms_accepted {
            return Err(WizardError::TermsRequired);
        }
        self.validate_step(WizardStep::Service)?;
        self.validate_step(WizardStep::Schedule)?;
        self.validate_step(WizardStep::Customer)?;
        self.recompute_total();

        let draft = &self.draft;
        let new_booking = NewBooking {
            service: draft.service.clone().ok_or(WizardError::ServiceRequired)?,
            addons: draft.addons.clone(),
            date: draft.date.ok_or(WizardError::DateRequired)?,
            time: draft.time.ok_or(WizardError::TimeRequired)?,
            therapist: draft.therapist.clone(),
            customer: draft.customer.clone().ok_or(WizardError::CustomerRequired)?,
            payment_method: draft.payment_method,
            total: draft.total,
        };

        let record = store.create(new_booking).await?;
        *self = BookingWizard::new();
        Ok(record)
    }

    fn validate_step(&self, step: WizardStep) -> Result<(), WizardError> {
        match step {
            WizardStep::Service => {
                if self.draft.service.is_none() {
                    return Err(WizardError::ServiceRequired);
                }
            }
            WizardStep::Schedule => {
                if self.draft.date.is_none() {
                    return Err(WizardError::DateRequired);
                }
                if self.draft.time.is_none() {
                    return Err(WizardError::TimeRequired);
                }
            }
            WizardStep::Customer => {
                if self.draft.customer.is_none() {
                    return Err(WizardError::CustomerRequired);
                }
            }
            WizardStep::Review => {}
        }
        Ok(())
    }

    fn recompute_total(&mut self) {
        let service = self.draft.service.as_ref().map(|s| s.price).unwrap_or(0);
        let addons: u32 = self.draft.addons.iter().map(|a| a.price).sum();
        self.draft.total = service + addons;
    }
}

fn is_valid_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE_RE.is_match(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::store::tests::sample_draft;

    fn jane() -> CustomerForm {
        CustomerForm {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@example.com".into(),
            phone: "5551234567".into(),
            ..CustomerForm::default()
        }
    }

    fn upcoming_date() -> NaiveDate {
        Local::now().date_naive() + Duration::days(5)
    }

    async fn empty_store(dir: &tempfile::TempDir) -> BookingStore {
        BookingStore::load(Storage::new(dir.path())).await.unwrap()
    }

    fn two_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 0, 0).unwrap()
    }

    /// Drives a fresh wizard to the review step.
    fn wizard_at_review(store: &BookingStore) -> BookingWizard {
        let mut wizard = BookingWizard::new();
        wizard.select_service("swedish").unwrap();
        wizard.advance().unwrap();
        wizard.select_date(upcoming_date(), store).unwrap();
        wizard.select_time(two_pm()).unwrap();
        wizard.advance().unwrap();
        wizard.set_customer(jane()).unwrap();
        wizard.advance().unwrap();
        wizard
    }

    #[tokio::test]
    async fn advance_is_gated_on_service_selection() {
        let mut wizard = BookingWizard::new();
        assert_eq!(wizard.step(), WizardStep::Service);

        assert!(matches!(wizard.advance(), Err(WizardError::ServiceRequired)));
        assert_eq!(wizard.step(), WizardStep::Service);

        wizard.select_service("swedish").unwrap();
        assert_eq!(wizard.advance().unwrap(), WizardStep::Schedule);
    }

    #[test]
    fn unknown_catalog_ids_are_rejected() {
        let mut wizard = BookingWizard::new();
        assert!(matches!(
            wizard.select_service("cryotherapy"),
            Err(WizardError::UnknownService(_))
        ));
        assert!(matches!(
            wizard.toggle_addon("leeches", true),
            Err(WizardError::UnknownAddon(_))
        ));
    }

    #[test]
    fn total_tracks_service_and_addons() {
        let mut wizard = BookingWizard::new();
        wizard.select_service("swedish").unwrap();
        assert_eq!(wizard.draft().total, 90);

        wizard.toggle_addon("hot-stones", true).unwrap();
        assert_eq!(wizard.draft().total, 110);

        // toggling an already-selected add-on on again must not double it
        wizard.toggle_addon("hot-stones", true).unwrap();
        assert_eq!(wizard.draft().total, 110);

        wizard.toggle_addon("scalp-massage", true).unwrap();
        assert_eq!(wizard.draft().total, 125);

        wizard.toggle_addon("hot-stones", false).unwrap();
        assert_eq!(wizard.draft().total, 105);

        wizard.select_service("deep-tissue").unwrap();
        assert_eq!(wizard.draft().total, 125);
    }

    #[tokio::test]
    async fn dates_outside_the_window_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = empty_store(&dir).await;
        let mut wizard = BookingWizard::new();
        let today = Local::now().date_naive();

        assert!(matches!(
            wizard.select_date(today - Duration::days(1), &store),
            Err(WizardError::DateOutOfRange { .. })
        ));
        assert!(matches!(
            wizard.select_date(today + Duration::days(31), &store),
            Err(WizardError::DateOutOfRange { .. })
        ));

        let slots = wizard.select_date(today + Duration::days(30), &store).unwrap();
        assert_eq!(slots.len(), 23);
    }

    #[tokio::test]
    async fn time_must_come_from_the_offered_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir).await;
        let date = upcoming_date();

        let mut wizard = BookingWizard::new();
        // no availability query yet
        assert!(matches!(
            wizard.select_time(two_pm()),
            Err(WizardError::DateRequired)
        ));

        let mut occupied = sample_draft("2025-06-10", "14:00");
        occupied.date = date;
        store.create(occupied).await.unwrap();

        wizard.select_date(date, &store).unwrap();
        assert!(matches!(
            wizard.select_time(two_pm()),
            Err(WizardError::TimeUnavailable)
        ));
        assert!(wizard
            .select_time(NaiveTime::from_hms_opt(15, 0, 0).unwrap())
            .is_ok());
    }

    #[tokio::test]
    async fn reselecting_a_date_clears_a_stale_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir).await;
        let date = upcoming_date();

        let mut wizard = BookingWizard::new();
        wizard.select_date(date, &store).unwrap();
        wizard.select_time(two_pm()).unwrap();

        let mut occupied = sample_draft("2025-06-10", "14:00");
        occupied.date = date;
        store.create(occupied).await.unwrap();

        wizard.select_date(date, &store).unwrap();
        assert!(wizard.draft().time.is_none());
    }

    #[test]
    fn customer_details_are_validated_and_trimmed() {
        let mut wizard = BookingWizard::new();

        let mut form = jane();
        form.first_name = "  ".into();
        assert!(matches!(
            wizard.set_customer(form),
            Err(WizardError::FieldRequired("first name"))
        ));

        let mut form = jane();
        form.email = "jane-at-example.com".into();
        assert!(matches!(
            wizard.set_customer(form),
            Err(WizardError::InvalidEmail)
        ));

        let mut form = jane();
        form.phone = "12345".into();
        assert!(matches!(
            wizard.set_customer(form),
            Err(WizardError::InvalidPhone)
        ));

        let mut form = jane();
        form.phone = "+1 (555) 123-4567".into();
        form.first_name = " Jane ".into();
        form.special_requests = Some("  ".into());
        form.therapist = Some("sarah".into());
        wizard.set_customer(form).unwrap();

        let customer = wizard.draft().customer.as_ref().unwrap();
        assert_eq!(customer.first_name, "Jane");
        assert_eq!(customer.phone, "+1 (555) 123-4567");
        assert!(customer.special_requests.is_none());
        assert_eq!(wizard.draft().therapist.as_deref(), Some("sarah"));

        let mut form = jane();
        form.therapist = Some("nobody".into());
        assert!(matches!(
            wizard.set_customer(form),
            Err(WizardError::UnknownTherapist(_))
        ));
    }

    #[tokio::test]
    async fn retreat_floors_and_advance_caps() {
        let dir = tempfile::tempdir().unwrap();
        let store = empty_store(&dir).await;
        let mut wizard = wizard_at_review(&store);

        assert_eq!(wizard.step(), WizardStep::Review);
        assert_eq!(wizard.advance().unwrap(), WizardStep::Review);

        assert_eq!(wizard.retreat(), WizardStep::Customer);
        assert_eq!(wizard.retreat(), WizardStep::Schedule);
        assert_eq!(wizard.retreat(), WizardStep::Service);
        assert_eq!(wizard.retreat(), WizardStep::Service);
    }

    #[tokio::test]
    async fn review_summary_reflects_the_draft() {
        let dir = tempfile::tempdir().unwrap();
        let store = empty_store(&dir).await;
        let mut wizard = wizard_at_review(&store);
        wizard.toggle_addon("hot-stones", true).unwrap();

        let summary = wizard.summary();
        assert_eq!(summary.service.as_deref(), Some("Swedish Massage"));
        assert_eq!(summary.duration_minutes, Some(60));
        assert_eq!(summary.time.as_deref(), Some("14:00"));
        assert_eq!(summary.therapist, "No preference");
        assert_eq!(summary.addons.len(), 1);
        assert_eq!(summary.total, 110);
    }

    #[tokio::test]
    async fn submit_requires_accepted_terms() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir).await;
        let mut wizard = wizard_at_review(&store);

        let err = wizard.submit(false, &mut store).await.unwrap_err();
        assert!(matches!(err, WizardError::TermsRequired));
        // the draft survives for a retry
        assert!(wizard.draft().service.is_some());
        assert_eq!(wizard.step(), WizardStep::Review);
    }

    #[tokio::test]
    async fn submitted_booking_lands_in_the_store_and_blocks_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir).await;
        let date = upcoming_date();
        let mut wizard = wizard_at_review(&store);

        let record = wizard.submit(true, &mut store).await.unwrap();
        assert_eq!(record.total, 90);
        assert_eq!(record.status, crate::models::BookingStatus::Pending);
        assert_eq!(record.date, date);
        assert_eq!(record.time, two_pm());
        assert_eq!(record.customer.email, "jane@example.com");

        assert!(!store.available_slots(date).contains(&two_pm()));
        assert!(store.find_by_id(&record.id).is_some());

        // the wizard reset to an empty step-1 draft
        assert_eq!(wizard.step(), WizardStep::Service);
        assert!(wizard.draft().service.is_none());
        assert_eq!(wizard.draft().total, 0);
    }

    #[tokio::test]
    async fn hot_stones_addon_raises_the_booked_total_to_110() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir).await;
        let mut wizard = wizard_at_review(&store);
        wizard.toggle_addon("hot-stones", true).unwrap();

        let record = wizard.submit(true, &mut store).await.unwrap();
        assert_eq!(record.total, 110);
        assert_eq!(record.addons[0].name, "Hot Stones");
    }

    #[tokio::test]
    async fn losing_the_slot_race_keeps_the_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir).await;
        let date = upcoming_date();
        let mut wizard = wizard_at_review(&store);

        // someone else takes the slot after the availability query
        let mut occupied = sample_draft("2025-06-10", "14:00");
        occupied.date = date;
        store.create(occupied).await.unwrap();

        let err = wizard.submit(true, &mut store).await.unwrap_err();
        assert!(matches!(err, WizardError::Store(StoreError::SlotTaken { .. })));
        assert!(wizard.draft().service.is_some());
        assert_eq!(wizard.step(), WizardStep::Review);
    }
}
