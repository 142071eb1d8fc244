//! Trip invitations: pending, then accepted or declined.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::extract::Json;
use super::trips::{hydrate, load_trip, parse_id};
use super::validation::validate_email;
use crate::db::{
    invites, trips, users, Invite, InviteCreatedResponse, InviteListResponse, InviteRequest,
    InviteStatus, MessageResponse, StoreError, TripError, TripResponse,
};
use crate::notifications::render_trip_invite_html;
use crate::AppState;

/// Load an invite addressed to `user_id` that is still pending
async fn load_open_invite(
    state: &AppState,
    invite_id: &str,
    user_id: &str,
) -> Result<Invite, ApiError> {
    parse_id(invite_id, "invite_id")?;
    let invite = invites::find_by_id(&state.db, invite_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invite not found"))?;

    if invite.invited_user_id != user_id {
        return Err(ApiError::forbidden("Not authorized"));
    }
    if invite.status_enum().is_terminal() {
        return Err(ApiError::bad_request(format!(
            "Invite has already been {}",
            invite.status
        )));
    }
    Ok(invite)
}

/// POST /api/trips/:id/invite
pub async fn invite_to_trip(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteCreatedResponse>), ApiError> {
    parse_id(&id, "trip_id")?;
    let trip = load_trip(&state.db, &id).await?;
    trip.ensure_organizer(&auth.id)?;

    validate_email(&req.email).map_err(|e| ApiError::validation_field("email", e))?;
    let invitee = users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if trip.can_access(&invitee.id) {
        return Err(TripError::AlreadyMember.into());
    }
    if invites::find_pending(&state.db, &trip.id, &invitee.id)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request("Invite already sent"));
    }

    // The partial unique index catches a concurrent duplicate
    let invite = invites::insert_invite(&state.db, &trip.id, &invitee.id, &auth.id).await?;

    tracing::info!(
        trip_id = %trip.id,
        invite_id = %invite.id,
        user_id = %invitee.id,
        "Invite created"
    );

    let invites_url = format!("{}/invites", state.config.server.client_url.trim_end_matches('/'));
    let html = render_trip_invite_html(&auth.name, &trip.name, &trip.destination, &invites_url);
    let subject = format!("{} invited you to {}", auth.name, trip.name);

    if let Err(e) = state.mailer.send(&invitee.email, &subject, &html).await {
        tracing::error!(invite_id = %invite.id, "Failed to send invite email: {}", e);
        return Err(ApiError::upstream(
            "Invite was created but the email could not be sent",
        ));
    }

    Ok((
        StatusCode::CREATED,
        Json(InviteCreatedResponse {
            message: "Invite sent successfully".to_string(),
            invite,
        }),
    ))
}

/// GET /api/trips/invites/my
pub async fn my_invites(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<InviteListResponse>, ApiError> {
    let invites = invites::list_pending_for_user(&state.db, &auth.id).await?;
    Ok(Json(InviteListResponse { invites }))
}

/// POST /api/trips/invites/:invite_id/accept
///
/// Adds the caller to the trip and resolves the invite in one transaction.
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(invite_id): Path<String>,
) -> Result<Json<TripResponse>, ApiError> {
    let invite = load_open_invite(&state, &invite_id, &auth.id).await?;

    let mut attempts = 0;
    let trip = loop {
        attempts += 1;
        let mut tx = state.db.begin().await?;

        let mut trip = trips::find_trip(&mut *tx, &invite.trip_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Trip not found"))?;

        match trip.add_member(&auth.id) {
            Ok(()) | Err(TripError::AlreadyMember) => {}
            Err(e) => return Err(e.into()),
        }

        match trips::save_trip(&mut *tx, &mut trip).await {
            Ok(()) => {}
            Err(StoreError::VersionConflict) if attempts < super::trips::MAX_SAVE_ATTEMPTS => {
                tx.rollback().await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        if !invites::resolve(&mut *tx, &invite.id, InviteStatus::Accepted).await? {
            tx.rollback().await?;
            return Err(ApiError::bad_request("Invite has already been resolved"));
        }

        tx.commit().await?;
        break trip;
    };

    tracing::info!(
        trip_id = %trip.id,
        invite_id = %invite.id,
        user_id = %auth.id,
        "Invite accepted"
    );

    Ok(Json(TripResponse {
        message: Some("Invite accepted".to_string()),
        trip: hydrate(&state.db, &trip).await?,
    }))
}

/// POST /api/trips/invites/:invite_id/decline
pub async fn decline_invite(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(invite_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let invite = load_open_invite(&state, &invite_id, &auth.id).await?;

    if !invites::resolve(&state.db, &invite.id, InviteStatus::Declined).await? {
        return Err(ApiError::bad_request("Invite has already been resolved"));
    }

    tracing::info!(invite_id = %invite.id, user_id = %auth.id, "Invite declined");
    Ok(Json(MessageResponse::new("Invite declined")))
}
