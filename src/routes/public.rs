use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::catalog;
use crate::contact::ContactForm;
use crate::models::{slot_time, BookingStatus, PaymentMethod};
use crate::routes::ApiError;
use crate::state::{AppState, ServerEvent};
use crate::wizard::{BookingSummary, BookingWizard, CustomerForm};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/api/services").route(web::get().to(list_services)))
        .service(web::resource("/api/availability").route(web::get().to(availability)))
        .service(web::resource("/api/wizard").route(web::post().to(open_wizard)))
        .service(web::resource("/api/wizard/{sid}").route(web::get().to(wizard_view)))
        .service(web::resource("/api/wizard/{sid}/service").route(web::post().to(wizard_service)))
        .service(web::resource("/api/wizard/{sid}/addons").route(web::post().to(wizard_addons)))
        .service(web::resource("/api/wizard/{sid}/date").route(web::post().to(wizard_date)))
        .service(web::resource("/api/wizard/{sid}/time").route(web::post().to(wizard_time)))
        .service(web::resource("/api/wizard/{sid}/customer").route(web::post().to(wizard_customer)))
        .service(web::resource("/api/wizard/{sid}/payment").route(web::post().to(wizard_payment)))
        .service(web::resource("/api/wizard/{sid}/next").route(web::post().to(wizard_next)))
        .service(web::resource("/api/wizard/{sid}/back").route(web::post().to(wizard_back)))
        .service(web::resource("/api/wizard/{sid}/submit").route(web::post().to(wizard_submit)))
        .service(web::resource("/api/bookings/{id}").route(web::get().to(booking_lookup)))
        .service(
            web::resource("/api/bookings/{id}/cancel").route(web::post().to(cancel_booking)),
        )
        .service(web::resource("/api/contact").route(web::post().to(submit_contact)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_services() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "services": catalog::services(),
        "addons": catalog::addons(),
        "therapists": catalog::therapists(),
    }))
}

#[derive(Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
}

#[derive(Serialize)]
struct AvailabilityResponse {
    date: NaiveDate,
    slots: Vec<String>,
}

async fn availability(
    state: web::Data<AppState>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let store = state.store.lock().await;
    let slots = store
        .available_slots(query.date)
        .into_iter()
        .map(format_slot)
        .collect();
    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        date: query.date,
        slots,
    }))
}

#[derive(Deserialize)]
struct OpenWizardQuery {
    service: Option<String>,
}

#[derive(Serialize)]
struct WizardView {
    session_id: String,
    step: u8,
    summary: BookingSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    offered_slots: Option<Vec<String>>,
}

fn wizard_response(session_id: &str, wizard: &BookingWizard) -> WizardView {
    WizardView {
        session_id: session_id.to_string(),
        step: wizard.step().number(),
        summary: wizard.summary(),
        offered_slots: wizard
            .offered_slots()
            .map(|slots| slots.iter().copied().map(format_slot).collect()),
    }
}

fn format_slot(time: NaiveTime) -> String {
    time.format(slot_time::FORMAT).to_string()
}

/// Opens a fresh wizard session. A `?service=` id pre-selects that service,
/// mirroring the booking page's URL parameter; an unknown id is ignored.
async fn open_wizard(
    state: web::Data<AppState>,
    query: web::Query<OpenWizardQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut wizard = BookingWizard::new();
    if let Some(service_id) = query.service.as_deref() {
        if wizard.select_service(service_id).is_err() {
            log::warn!("ignoring unknown pre-selected service '{service_id}'");
        }
    }

    let session_id = Uuid::new_v4().to_string();
    let view = wizard_response(&session_id, &wizard);
    state.wizards.lock().await.insert(session_id, wizard);
    Ok(HttpResponse::Created().json(view))
}

async fn wizard_view(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&session_id)
        .ok_or_else(|| ApiError::not_found("wizard session not found"))?;
    Ok(HttpResponse::Ok().json(wizard_response(&session_id, wizard)))
}

/// Runs `op` against the addressed wizard session and replies with the
/// refreshed view.
async fn with_wizard<F>(
    state: &AppState,
    session_id: String,
    op: F,
) -> Result<HttpResponse, ApiError>
where
    F: FnOnce(&mut BookingWizard) -> Result<(), ApiError>,
{
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&session_id)
        .ok_or_else(|| ApiError::not_found("wizard session not found"))?;
    op(wizard)?;
    Ok(HttpResponse::Ok().json(wizard_response(&session_id, wizard)))
}

#[derive(Deserialize)]
struct ServicePayload {
    service_id: String,
}

async fn wizard_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ServicePayload>,
) -> Result<HttpResponse, ApiError> {
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.select_service(&payload.service_id)?;
        Ok(())
    })
    .await
}

#[derive(Deserialize)]
struct AddonPayload {
    addon_id: String,
    selected: bool,
}

async fn wizard_addons(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AddonPayload>,
) -> Result<HttpResponse, ApiError> {
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.toggle_addon(&payload.addon_id, payload.selected)?;
        Ok(())
    })
    .await
}

#[derive(Deserialize)]
struct DatePayload {
    date: NaiveDate,
}

async fn wizard_date(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<DatePayload>,
) -> Result<HttpResponse, ApiError> {
    // store lock first, then sessions, everywhere
    let store = state.store.lock().await;
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.select_date(payload.date, &store)?;
        Ok(())
    })
    .await
}

#[derive(Deserialize)]
struct TimePayload {
    time: String,
}

async fn wizard_time(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<TimePayload>,
) -> Result<HttpResponse, ApiError> {
    let time = NaiveTime::parse_from_str(&payload.time, slot_time::FORMAT)
        .map_err(|_| ApiError::bad_request("time must look like HH:MM"))?;
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.select_time(time)?;
        Ok(())
    })
    .await
}

async fn wizard_customer(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CustomerForm>,
) -> Result<HttpResponse, ApiError> {
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.set_customer(payload.into_inner())?;
        Ok(())
    })
    .await
}

#[derive(Deserialize)]
struct PaymentPayload {
    method: PaymentMethod,
}

async fn wizard_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PaymentPayload>,
) -> Result<HttpResponse, ApiError> {
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.set_payment(payload.method);
        Ok(())
    })
    .await
}

async fn wizard_next(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.advance()?;
        Ok(())
    })
    .await
}

async fn wizard_back(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    with_wizard(&state, path.into_inner(), |wizard| {
        wizard.retreat();
        Ok(())
    })
    .await
}

#[derive(Deserialize)]
struct SubmitPayload {
    #[serde(default)]
    terms_accepted: bool,
}

async fn wizard_submit(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<SubmitPayload>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let mut store = state.store.lock().await;
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&session_id)
        .ok_or_else(|| ApiError::not_found("wizard session not found"))?;

    let record = wizard.submit(payload.terms_accepted, &mut store).await?;
    // the draft is consumed; a failed submit above keeps the session alive
    wizards.remove(&session_id);

    state.publish(ServerEvent::from_record("booking_created", &record));
    Ok(HttpResponse::Created().json(record))
}

async fn booking_lookup(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let store = state.store.lock().await;
    match store.find_by_id(&id) {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(ApiError::not_found(format!("booking {id} not found"))),
    }
}

/// Customer-facing cancellation, the same lifecycle move the admin surface
/// makes. The transition table already allows it from every status.
async fn cancel_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let mut store = state.store.lock().await;
    let record = store.update_status(&id, BookingStatus::Cancelled).await?;

    state.publish(ServerEvent::from_record("booking_updated", &record));
    Ok(HttpResponse::Ok().json(record))
}

async fn submit_contact(
    state: web::Data<AppState>,
    payload: web::Json<ContactForm>,
) -> Result<HttpResponse, ApiError> {
    let mut contact = state.contact.lock().await;
    let message = contact.save(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(message))
}
