//! Trip endpoints: creation, reads, reactions, expenses and chat.
//!
//! Every mutation goes through `mutate_trip`, which loads the document,
//! checks membership, applies one aggregate method and saves with a version
//! check, re-running the whole cycle when another request won the race.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::Json;
use super::validation::{validate_date_range, validate_required_text, validate_uuid};
use crate::db::{
    trips, users, DbPool, Itinerary, NewTrip, ReactionKind, ReactionOutcome, StoreError, Trip,
    TripError, TripListResponse, TripResponse, TripSummary, TripView,
};
use crate::AppState;

/// Read-modify-write cycles attempted before answering 409
pub const MAX_SAVE_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub name: String,
    pub destination: String,
    pub number_of_persons: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub itinerary: Option<Itinerary>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    /// Display name of the payer
    #[serde(default)]
    pub paid_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

pub(crate) fn parse_id(id: &str, field_name: &str) -> Result<(), ApiError> {
    validate_uuid(id, field_name).map_err(|e| ApiError::validation_field(field_name, e))
}

/// Itinerary positions are zero-based; anything unparsable addresses nothing
fn parse_index(raw: &str, what: &str) -> Result<usize, ApiError> {
    raw.parse::<usize>()
        .map_err(|_| ApiError::not_found(format!("{} {} not found", what, raw)))
}

pub(crate) async fn load_trip(db: &DbPool, trip_id: &str) -> Result<Trip, ApiError> {
    trips::find_trip(db, trip_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))
}

/// Expand every user reference in `trip`
pub(crate) async fn hydrate(db: &DbPool, trip: &Trip) -> Result<TripView, ApiError> {
    let directory = users::find_summaries(db, &trip.referenced_user_ids()).await?;
    Ok(TripView::build(trip, &directory))
}

/// Apply `apply` to the current version of the trip as `user_id`
async fn mutate_trip<T, F>(
    db: &DbPool,
    trip_id: &str,
    user_id: &str,
    mut apply: F,
) -> Result<(Trip, T), ApiError>
where
    F: FnMut(&mut Trip) -> Result<T, TripError>,
{
    for attempt in 1..=MAX_SAVE_ATTEMPTS {
        let mut trip = load_trip(db, trip_id).await?;
        trip.ensure_member(user_id)?;
        let value = apply(&mut trip)?;

        match trips::save_trip(db, &mut trip).await {
            Ok(()) => return Ok((trip, value)),
            Err(StoreError::VersionConflict) => {
                tracing::debug!(trip_id = %trip_id, attempt, "Trip changed underneath, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::warn!(trip_id = %trip_id, "Giving up after repeated write conflicts");
    Err(StoreError::VersionConflict.into())
}

fn reaction_message(outcome: ReactionOutcome) -> &'static str {
    match outcome {
        ReactionOutcome::Added => "Reaction added",
        ReactionOutcome::Removed => "Reaction removed",
        ReactionOutcome::Switched => "Reaction updated",
    }
}

/// POST /api/trips
pub async fn create_trip(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_required_text(&req.name, "Name") {
        errors.add("name", e);
    }
    if let Err(e) = validate_required_text(&req.destination, "Destination") {
        errors.add("destination", e);
    }
    if req.number_of_persons < 1 || req.number_of_persons > u32::MAX as i64 {
        errors.add("number_of_persons", "Number of persons must be at least 1");
    }
    if let Err(e) = validate_date_range(req.start_date, req.end_date) {
        errors.add("end_date", e);
    }
    errors.finish()?;

    let preferences = req
        .preferences
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let trip = Trip::new(
        NewTrip {
            name: req.name.trim().to_string(),
            destination: req.destination.trim().to_string(),
            number_of_persons: req.number_of_persons as u32,
            start_date: req.start_date,
            end_date: req.end_date,
            preferences,
            itinerary: req.itinerary.unwrap_or_default(),
        },
        &auth.id,
    );
    trips::insert_trip(&state.db, &trip).await?;

    tracing::info!(trip_id = %trip.id, user_id = %auth.id, "Trip created");

    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            message: Some("Trip created".to_string()),
            trip: hydrate(&state.db, &trip).await?,
        }),
    ))
}

/// GET /api/trips/my
pub async fn my_trips(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<TripListResponse>, ApiError> {
    let trips = trips::find_trips_for_user(&state.db, &auth.id).await?;

    // Summaries only show organizer and members
    let ids: BTreeSet<String> = trips
        .iter()
        .flat_map(|t| {
            std::iter::once(t.organizer_id.clone())
                .chain(t.members.iter().map(|m| m.user_id.clone()))
        })
        .collect();
    let directory = users::find_summaries(&state.db, &ids).await?;

    Ok(Json(TripListResponse {
        trips: trips
            .iter()
            .map(|t| TripSummary::build(t, &directory))
            .collect(),
    }))
}

/// GET /api/trips/:id
pub async fn get_trip(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TripResponse>, ApiError> {
    parse_id(&id, "trip_id")?;
    let trip = load_trip(&state.db, &id).await?;
    trip.ensure_member(&auth.id)?;

    Ok(Json(TripResponse {
        message: None,
        trip: hydrate(&state.db, &trip).await?,
    }))
}

/// POST /api/trips/:id/day/:day_index/activity/:activity_index/react
pub async fn react_to_activity(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, day, activity)): Path<(String, String, String)>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<TripResponse>, ApiError> {
    let kind: ReactionKind = req.kind.parse()?;
    parse_id(&id, "trip_id")?;
    let day_index = parse_index(&day, "Day")?;
    let activity_index = parse_index(&activity, "Activity")?;

    let (trip, outcome) = mutate_trip(&state.db, &id, &auth.id, |trip| {
        trip.react_to_activity(day_index, activity_index, &auth.id, kind)
    })
    .await?;

    tracing::debug!(trip_id = %id, user_id = %auth.id, ?outcome, "Activity reaction");

    Ok(Json(TripResponse {
        message: Some(reaction_message(outcome).to_string()),
        trip: hydrate(&state.db, &trip).await?,
    }))
}

/// POST /api/trips/:id/day/:day_index/hotel/:hotel_index/react
pub async fn react_to_hotel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, day, hotel)): Path<(String, String, String)>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<TripResponse>, ApiError> {
    let kind: ReactionKind = req.kind.parse()?;
    parse_id(&id, "trip_id")?;
    let day_index = parse_index(&day, "Day")?;
    let hotel_index = parse_index(&hotel, "Hotel")?;

    let (trip, outcome) = mutate_trip(&state.db, &id, &auth.id, |trip| {
        trip.react_to_hotel(day_index, hotel_index, &auth.id, kind)
    })
    .await?;

    tracing::debug!(trip_id = %id, user_id = %auth.id, ?outcome, "Hotel reaction");

    Ok(Json(TripResponse {
        message: Some(reaction_message(outcome).to_string()),
        trip: hydrate(&state.db, &trip).await?,
    }))
}

/// POST /api/trips/:id/expenses
pub async fn add_expense(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ExpenseRequest>,
) -> Result<(StatusCode, Json<TripResponse>), ApiError> {
    parse_id(&id, "trip_id")?;

    // Outsiders are turned away before their input is looked at
    load_trip(&state.db, &id).await?.ensure_member(&auth.id)?;

    let paid_by = req.paid_by.trim();
    if paid_by.is_empty() {
        return Err(ApiError::bad_request("PaidBy must be a non-empty string"));
    }
    let payer_id = match users::find_by_name(&state.db, paid_by).await? {
        Some(user) => user.id,
        None => auth.id.clone(),
    };

    let (trip, expense_id) = mutate_trip(&state.db, &id, &auth.id, |trip| {
        trip.add_expense(&auth.id, &req.description, req.amount, &payer_id)
            .map(|e| e.id.clone())
    })
    .await?;

    tracing::info!(trip_id = %id, user_id = %auth.id, expense_id = %expense_id, "Expense added");

    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            message: Some("Expense added".to_string()),
            trip: hydrate(&state.db, &trip).await?,
        }),
    ))
}

/// POST /api/trips/:id/chat
pub async fn add_chat_message(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<TripResponse>), ApiError> {
    parse_id(&id, "trip_id")?;

    let (trip, _) = mutate_trip(&state.db, &id, &auth.id, |trip| {
        trip.add_chat_message(&auth.id, &req.message).map(|_| ())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            message: Some("Message sent".to_string()),
            trip: hydrate(&state.db, &trip).await?,
        }),
    ))
}
