use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::models::BookingStatus;
use crate::routes::ApiError;
use crate::state::{AppState, ServerEvent};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .service(web::resource("/bookings").route(web::get().to(list_bookings)))
            .service(web::resource("/stats").route(web::get().to(stats)))
            .service(
                web::resource("/bookings/{id}/status").route(web::post().to(update_status)),
            )
            .service(web::resource("/bookings/{id}").route(web::delete().to(delete_booking)))
            .service(web::resource("/messages").route(web::get().to(list_messages))),
    );
}

#[derive(Deserialize)]
struct BookingFilter {
    status: Option<BookingStatus>,
}

async fn list_bookings(
    state: web::Data<AppState>,
    query: web::Query<BookingFilter>,
) -> Result<HttpResponse, ApiError> {
    let store = state.store.lock().await;
    let bookings: Vec<_> = store
        .list_all()
        .iter()
        .filter(|booking| query.status.map_or(true, |status| booking.status == status))
        .collect();
    Ok(HttpResponse::Ok().json(bookings))
}

#[derive(Serialize)]
struct StatusCounts {
    total: usize,
    pending: usize,
    confirmed: usize,
    cancelled: usize,
    completed: usize,
}

async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let store = state.store.lock().await;
    let bookings = store.list_all();
    let by_status = |status: BookingStatus| {
        bookings
            .iter()
            .filter(|booking| booking.status == status)
            .count()
    };
    Ok(HttpResponse::Ok().json(StatusCounts {
        total: bookings.len(),
        pending: by_status(BookingStatus::Pending),
        confirmed: by_status(BookingStatus::Confirmed),
        cancelled: by_status(BookingStatus::Cancelled),
        completed: by_status(BookingStatus::Completed),
    }))
}

#[derive(Deserialize)]
struct StatusPayload {
    status: BookingStatus,
}

async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StatusPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let mut store = state.store.lock().await;
    let record = store.update_status(&id, payload.status).await?;

    state.publish(ServerEvent::from_record("booking_updated", &record));
    Ok(HttpResponse::Ok().json(record))
}

async fn delete_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let mut store = state.store.lock().await;
    store.delete(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_messages(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let contact = state.contact.lock().await;
    Ok(HttpResponse::Ok().json(contact.list_all()))
}
