use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{Storage, StorageError};

const MESSAGES_KEY: &str = "contact_messages";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub preferred_service: Option<String>,
    pub message: String,
    #[serde(default)]
    pub newsletter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    New,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_service: Option<String>,
    pub message: String,
    #[serde(default)]
    pub newsletter: bool,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

/// Persisted log of contact-form submissions. Separate collection from the
/// bookings, same storage layer.
pub struct ContactLog {
    storage: Storage,
    messages: Vec<ContactMessage>,
}

impl ContactLog {
    pub async fn load(storage: Storage) -> Result<Self, ContactError> {
        storage.ensure_dir().await?;
        let messages = storage.load(MESSAGES_KEY).await?;
        Ok(Self { storage, messages })
    }

    pub async fn save(&mut self, form: ContactForm) -> Result<ContactMessage, ContactError> {
        let form = validate(form)?;
        let message = ContactMessage {
            id: Uuid::new_v4().to_string(),
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            phone: form.phone,
            subject: form.subject,
            preferred_service: form.preferred_service,
            message: form.message,
            newsletter: form.newsletter,
            status: MessageStatus::New,
            created_at: Utc::now(),
        };

        self.messages.push(message.clone());
        self.storage.persist(MESSAGES_KEY, &self.messages).await?;
        log::info!("contact message {} received from {}", message.id, message.email);
        Ok(message)
    }

    pub fn list_all(&self) -> &[ContactMessage] {
        &self.messages
    }
}

fn validate(form: ContactForm) -> Result<ContactForm, ContactError> {
    let first_name = form.first_name.trim().to_string();
    let last_name = form.last_name.trim().to_string();
    let email = form.email.trim().to_string();
    let subject = form.subject.trim().to_string();
    let message = form.message.trim().to_string();

    if first_name.len() < 2 {
        return Err(ContactError::Invalid(
            "first name must be at least 2 characters",
        ));
    }
    if last_name.len() < 2 {
        return Err(ContactError::Invalid(
            "last name must be at least 2 characters",
        ));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(ContactError::Invalid("please enter a valid email address"));
    }
    if subject.is_empty() {
        return Err(ContactError::Invalid("please select a subject"));
    }
    if message.len() < 10 {
        return Err(ContactError::Invalid(
            "message must be at least 10 characters",
        ));
    }

    Ok(ContactForm {
        first_name,
        last_name,
        email,
        phone: form.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        subject,
        preferred_service: form.preferred_service,
        message,
        newsletter: form.newsletter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ContactForm {
        ContactForm {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@example.com".into(),
            phone: None,
            subject: "booking".into(),
            preferred_service: Some("swedish".into()),
            message: "Do you offer gift vouchers for couples?".into(),
            newsletter: true,
        }
    }

    #[tokio::test]
    async fn saved_messages_are_listed_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = Storage::new(dir.path());
            let mut log = ContactLog::load(storage).await.unwrap();
            let message = log.save(valid_form()).await.unwrap();
            assert_eq!(message.status, MessageStatus::New);
            assert_eq!(log.list_all().len(), 1);
        }

        let reloaded = ContactLog::load(Storage::new(dir.path())).await.unwrap();
        assert_eq!(reloaded.list_all().len(), 1);
        assert_eq!(reloaded.list_all()[0].email, "jane@example.com");
    }

    #[tokio::test]
    async fn invalid_forms_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ContactLog::load(Storage::new(dir.path())).await.unwrap();

        let mut form = valid_form();
        form.first_name = "J".into();
        assert!(matches!(
            log.save(form).await,
            Err(ContactError::Invalid(_))
        ));

        let mut form = valid_form();
        form.email = "not-an-email".into();
        assert!(log.save(form).await.is_err());

        let mut form = valid_form();
        form.message = "too short".into();
        assert!(log.save(form).await.is_err());

        assert!(log.list_all().is_empty());
    }
}
