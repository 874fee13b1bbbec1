//! Ticket API handlers.
//!
//! Every handler acts on the caller's own collection, resolved by the auth
//! middleware. Enum fields arrive as plain strings so an unknown priority or
//! status is reported as a validation error rather than a body rejection.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use ticketdesk_core::ticket::ParseEnumError;
use ticketdesk_core::{
    EngineError, NewTicket, Priority, Ticket, TicketId, TicketPatch, TicketQuery, TicketStats,
    TicketStatus,
};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: usize = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// "High", "Medium" or "Low"; defaults to Medium
    pub priority: Option<String>,
    /// "Open", "In Progress" or "Closed"; defaults to Open
    pub status: Option<String>,
}

/// Request body for a merge update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Search title and description
    pub q: Option<String>,
    /// Maximum number of tickets to return
    pub limit: Option<usize>,
    /// Pagination offset
    pub offset: Option<usize>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    /// Snapshot version the page was cut from
    pub version: u64,
    pub tickets: Vec<Ticket>,
    /// Matching tickets before pagination
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Response for ticket stats
#[derive(Debug, Serialize)]
pub struct TicketStatsResponse {
    pub version: u64,
    #[serde(flatten)]
    pub stats: TicketStats,
}

fn parse_field<T>(value: Option<String>) -> Result<Option<T>, EngineError>
where
    T: FromStr<Err = ParseEnumError>,
{
    Ok(value.map(|v| v.parse::<T>()).transpose()?)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

impl TryFrom<CreateTicketBody> for NewTicket {
    type Error = EngineError;

    fn try_from(body: CreateTicketBody) -> Result<Self, Self::Error> {
        Ok(NewTicket {
            title: body.title,
            description: body.description,
            priority: parse_field::<Priority>(body.priority)?,
            status: parse_field::<TicketStatus>(body.status)?,
        })
    }
}

impl TryFrom<UpdateTicketBody> for TicketPatch {
    type Error = EngineError;

    fn try_from(body: UpdateTicketBody) -> Result<Self, Self::Error> {
        Ok(TicketPatch {
            title: body.title,
            description: body.description,
            priority: parse_field::<Priority>(body.priority)?,
            status: parse_field::<TicketStatus>(body.status)?,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateTicketBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let new_ticket = NewTicket::try_from(body(payload)?)?;
    let ticket = state.engine().create(&user_id, new_ticket).await?;
    tracing::info!(user_id = %user_id, ticket_id = %ticket.id, "Ticket created");
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.engine().get(&user_id, &TicketId::new(id)).await?;
    Ok(Json(ticket))
}

/// Merge-update a ticket
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTicketBody>, JsonRejection>,
) -> Result<Json<Ticket>, ApiError> {
    let patch = TicketPatch::try_from(body(payload)?)?;
    let ticket = state
        .engine()
        .update(&user_id, &TicketId::new(id), patch)
        .await?;
    tracing::info!(user_id = %user_id, ticket_id = %ticket.id, "Ticket updated");
    Ok(Json(ticket))
}

/// Delete a ticket
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TicketId::new(id);
    state.engine().delete(&user_id, &id).await?;
    tracing::info!(user_id = %user_id, ticket_id = %id, "Ticket deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List tickets in snapshot order, with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let mut query = TicketQuery::new();
    if let Some(status) = parse_field::<TicketStatus>(params.status)? {
        query = query.with_status(status);
    }
    if let Some(search) = params.q {
        query = query.with_search(search);
    }

    let snapshot = state.engine().snapshot(&user_id).await?;
    let matching = query.apply(&snapshot.tickets);
    let total = matching.len();
    let tickets = matching.into_iter().skip(offset).take(limit).collect();

    Ok(Json(ListTicketsResponse {
        version: snapshot.version,
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Ticket counts per status
pub async fn ticket_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TicketStatsResponse>, ApiError> {
    let snapshot = state.engine().snapshot(&user_id).await?;
    Ok(Json(TicketStatsResponse {
        version: snapshot.version,
        stats: TicketStats::from_tickets(&snapshot.tickets),
    }))
}
