/// REST API over the booking service.
///
/// Routes live under `/api`, take and return JSON, and authenticate with an
/// `Authorization: Bearer <token>` header. Every error body is
/// `{"detail": "<message>"}`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::appointments::Page;
use crate::calendar::SlotAvailability;
use crate::directory::DoctorQuery;
use crate::error::BookingError;
use crate::identity::SignedIn;
use crate::models::{
    Account, Appointment, Bill, BookingRequest, Doctor, DoctorDraft, LoginRequest, Principal,
    ProfileUpdate, RegisterRequest,
};
use crate::service::{AdminStats, Booking, Hospital};

type SharedState = Arc<Hospital>;
type ApiResult<T> = Result<T, ApiError>;

pub fn router(hospital: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me).put(update_me))
        .route("/api/doctors", get(list_doctors).post(create_doctor))
        .route("/api/doctors/:doctor_id", get(get_doctor).put(update_doctor))
        .route("/api/doctors/:doctor_id/slots", get(doctor_slots))
        .route("/api/appointments", post(book_appointment))
        .route("/api/appointments/my", get(my_appointments))
        .route("/api/appointments/:appointment_id", get(get_appointment))
        .route("/api/appointments/:appointment_id/cancel", put(cancel_appointment))
        .route("/api/appointments/:appointment_id/complete", put(complete_appointment))
        .route("/api/billing/my", get(my_bills))
        .route("/api/billing/:bill_id", get(get_bill))
        .route("/api/billing/:bill_id/pay", put(pay_bill))
        .route("/api/admin/appointments", get(all_appointments))
        .route("/api/admin/billing", get(all_bills))
        .route("/api/admin/stats", get(admin_stats))
        .with_state(hospital)
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    access_token: String,
    token_type: &'static str,
    expires_at: DateTime<Utc>,
    user: Account,
}

impl From<SignedIn> for AuthResponse {
    fn from(signed_in: SignedIn) -> Self {
        AuthResponse {
            access_token: signed_in.session.token,
            token_type: "bearer",
            expires_at: signed_in.session.expires_at,
            user: signed_in.account,
        }
    }
}

/// JSON body whose rejections render as `{"detail"}` validation errors.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
struct ApiPath<T>(T);

#[derive(Debug, Deserialize)]
struct SlotQuery {
    date: NaiveDate,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run password hashing work off the async executor.
async fn blocking<T, F>(state: &SharedState, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Hospital) -> Result<T, BookingError> + Send + 'static,
{
    let hospital = state.clone();
    tokio::task::spawn_blocking(move || work(hospital.as_ref()))
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn register(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let signed_in = blocking(&state, move |h| h.identity.register(request)).await?;
    Ok((StatusCode::CREATED, Json(signed_in.into())))
}

async fn login(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let signed_in = blocking(&state, move |h| h.identity.login(request)).await?;
    Ok(Json(signed_in.into()))
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let token = bearer_token(&headers)?;
    state.identity.logout(token)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<SharedState>, headers: HeaderMap) -> ApiResult<Json<Account>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.identity.account(&principal)?))
}

async fn update_me(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(changes): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Account>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.identity.update_profile(&principal, changes)?))
}

async fn list_doctors(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<DoctorQuery>,
) -> ApiResult<Json<Vec<Doctor>>> {
    Ok(Json(state.directory.list(&query)?))
}

async fn get_doctor(
    State(state): State<SharedState>,
    ApiPath(doctor_id): ApiPath<String>,
) -> ApiResult<Json<Doctor>> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    Ok(Json(state.directory.get(doctor_id)?))
}

async fn create_doctor(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(draft): ApiJson<DoctorDraft>,
) -> ApiResult<(StatusCode, Json<Doctor>)> {
    let principal = authorize(&state, &headers)?;
    let doctor = state.directory.create(&principal, draft)?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

async fn update_doctor(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiPath(doctor_id): ApiPath<String>,
    ApiJson(draft): ApiJson<DoctorDraft>,
) -> ApiResult<Json<Doctor>> {
    let principal = authorize(&state, &headers)?;
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    Ok(Json(state.directory.update(&principal, doctor_id, draft)?))
}

async fn doctor_slots(
    State(state): State<SharedState>,
    ApiPath(doctor_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<SlotQuery>,
) -> ApiResult<Json<Vec<SlotAvailability>>> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    Ok(Json(state.allocator.available_slots(doctor_id, query.date)?))
}

async fn book_appointment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<BookingRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let principal = authorize(&state, &headers)?;
    let booking = state.book(
        &principal,
        request.doctor_id,
        request.appointment_date,
        request.slot_time,
    )?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn my_appointments(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Appointment>>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.appointments.list_for_patient(&principal)?))
}

async fn get_appointment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiPath(appointment_id): ApiPath<String>,
) -> ApiResult<Json<Appointment>> {
    let principal = authorize(&state, &headers)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;
    Ok(Json(state.appointments.get(&principal, appointment_id)?))
}

async fn cancel_appointment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiPath(appointment_id): ApiPath<String>,
) -> ApiResult<Json<Appointment>> {
    let principal = authorize(&state, &headers)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;
    Ok(Json(state.appointments.cancel(&principal, appointment_id)?))
}

async fn complete_appointment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiPath(appointment_id): ApiPath<String>,
) -> ApiResult<Json<Appointment>> {
    let principal = authorize(&state, &headers)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;
    Ok(Json(state.appointments.complete(&principal, appointment_id)?))
}

async fn my_bills(State(state): State<SharedState>, headers: HeaderMap) -> ApiResult<Json<Vec<Bill>>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.billing.list_for_patient(&principal)?))
}

async fn get_bill(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiPath(bill_id): ApiPath<String>,
) -> ApiResult<Json<Bill>> {
    let principal = authorize(&state, &headers)?;
    let bill_id = parse_id(&bill_id, "bill")?;
    Ok(Json(state.billing.get(&principal, bill_id)?))
}

async fn pay_bill(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiPath(bill_id): ApiPath<String>,
) -> ApiResult<Json<Bill>> {
    let principal = authorize(&state, &headers)?;
    let bill_id = parse_id(&bill_id, "bill")?;
    Ok(Json(state.billing.pay(&principal, bill_id)?))
}

async fn all_appointments(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.appointments.list_all(&principal, page)?))
}

async fn all_bills(State(state): State<SharedState>, headers: HeaderMap) -> ApiResult<Json<Vec<Bill>>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.billing.list_all(&principal)?))
}

async fn admin_stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<AdminStats>> {
    let principal = authorize(&state, &headers)?;
    Ok(Json(state.stats(&principal)?))
}

fn authorize(state: &Hospital, headers: &HeaderMap) -> ApiResult<Principal> {
    let token = bearer_token(headers)?;
    Ok(state.identity.authenticate(token)?)
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::from(BookingError::unauthorized("Missing Authorization header")))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(BookingError::unauthorized("Authorization header must be 'Bearer <token>'").into()),
    }
}

fn parse_id(value: &str, kind: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| BookingError::validation(format!("Invalid {} id: '{}'", kind, value)).into())
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(message: String) -> Self {
        error!("{}", message);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Internal server error".to_string(),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        if err.is_internal() {
            return ApiError::internal(err.to_string());
        }

        let status = match &err {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SlotConflict { .. }
            | BookingError::InvalidTransition { .. }
            | BookingError::AlreadyPaid(_) => StatusCode::CONFLICT,
            BookingError::Credential(_) | BookingError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            warn!("Request rejected: {}", err);
        }

        ApiError {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        BookingError::validation(rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        BookingError::validation(rejection.body_text()).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        BookingError::validation(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}
