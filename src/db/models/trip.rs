//! Trip aggregate: itinerary, membership, expense ledger and chat.
//!
//! A trip is persisted as a single JSON document. All collaboration rules
//! (membership checks, reaction toggling, expense validation) live on the
//! aggregate so that handlers only load, apply and save.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Rule violations raised by the trip aggregate
#[derive(Debug, Error, PartialEq)]
pub enum TripError {
    #[error("You are not a member of this trip")]
    NotAMember,
    #[error("Only the organizer can invite members")]
    NotOrganizer,
    #[error("Day {0} not found")]
    DayNotFound(usize),
    #[error("Activity {0} not found")]
    ActivityNotFound(usize),
    #[error("Hotel {0} not found")]
    HotelNotFound(usize),
    #[error("User is already a member of this trip")]
    AlreadyMember,
    #[error("Invalid reaction type: {0}")]
    InvalidReaction(String),
    #[error("{0}")]
    InvalidExpense(&'static str),
    #[error("Message cannot be empty")]
    EmptyMessage,
}

/// Role of a user within a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Organizer,
    Member,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::Organizer => write!(f, "Organizer"),
            MemberRole::Member => write!(f, "Member"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
}

/// A like or dislike vote on an activity or hotel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReactionKind::Like => write!(f, "like"),
            ReactionKind::Dislike => write!(f, "dislike"),
        }
    }
}

impl std::str::FromStr for ReactionKind {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            _ => Err(TripError::InvalidReaction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}

/// What a reaction call did to the item's reaction set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionOutcome {
    Added,
    Removed,
    Switched,
}

/// Apply at-most-one-reaction-per-user semantics to a reaction list
pub fn toggle_reaction(
    reactions: &mut Vec<Reaction>,
    user_id: &str,
    kind: ReactionKind,
) -> ReactionOutcome {
    match reactions.iter().position(|r| r.user_id == user_id) {
        Some(pos) if reactions[pos].kind == kind => {
            reactions.retain(|r| r.user_id != user_id);
            ReactionOutcome::Removed
        }
        Some(pos) => {
            reactions[pos].kind = kind;
            ReactionOutcome::Switched
        }
        None => {
            reactions.push(Reaction {
                user_id: user_id.to_string(),
                kind,
            });
            ReactionOutcome::Added
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub time: String,
    pub activity: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub name: String,
    #[serde(default)]
    pub attractions: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub website_url: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub day: u32,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub hotels: Vec<Hotel>,
}

impl Day {
    pub fn activity_mut(&mut self, index: usize) -> Result<&mut Activity, TripError> {
        self.activities
            .get_mut(index)
            .ok_or(TripError::ActivityNotFound(index))
    }

    pub fn hotel_mut(&mut self, index: usize) -> Result<&mut Hotel, TripError> {
        self.hotels
            .get_mut(index)
            .ok_or(TripError::HotelNotFound(index))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default)]
    pub best_time_to_visit: String,
    #[serde(default)]
    pub days: Vec<Day>,
}

impl Itinerary {
    /// Day addressed by its zero-based position in the itinerary
    pub fn day_mut(&mut self, index: usize) -> Result<&mut Day, TripError> {
        self.days.get_mut(index).ok_or(TripError::DayNotFound(index))
    }

    /// Drop every reaction; used when a client submits a fresh itinerary
    fn clear_reactions(&mut self) {
        for day in &mut self.days {
            for activity in &mut day.activities {
                activity.reactions.clear();
            }
            for hotel in &mut day.hotels {
                hotel.reactions.clear();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub paid_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub timestamp: String,
}

/// The trip aggregate as stored in the `document` column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub name: String,
    pub destination: String,
    pub number_of_persons: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub preferences: Vec<String>,
    pub organizer_id: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub itinerary: Itinerary,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    pub created_at: String,
    pub updated_at: String,
    /// Optimistic concurrency token, kept in its own column
    #[serde(skip)]
    pub version: i64,
}

/// Validated input for a new trip
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub name: String,
    pub destination: String,
    pub number_of_persons: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preferences: Vec<String>,
    pub itinerary: Itinerary,
}

impl Trip {
    /// Create a trip owned by `organizer_id`, who becomes its only member
    pub fn new(input: NewTrip, organizer_id: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let mut itinerary = input.itinerary;
        itinerary.clear_reactions();

        Self {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            destination: input.destination,
            number_of_persons: input.number_of_persons,
            start_date: input.start_date,
            end_date: input.end_date,
            preferences: input.preferences,
            organizer_id: organizer_id.to_string(),
            members: vec![Member {
                user_id: organizer_id.to_string(),
                role: MemberRole::Organizer,
                status: MemberStatus::Accepted,
            }],
            itinerary,
            expenses: Vec::new(),
            chat_messages: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_organizer(&self, user_id: &str) -> bool {
        self.organizer_id == user_id
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    /// Organizer or listed member
    pub fn can_access(&self, user_id: &str) -> bool {
        self.is_organizer(user_id) || self.has_member(user_id)
    }

    pub fn ensure_member(&self, user_id: &str) -> Result<(), TripError> {
        if self.can_access(user_id) {
            Ok(())
        } else {
            Err(TripError::NotAMember)
        }
    }

    pub fn ensure_organizer(&self, user_id: &str) -> Result<(), TripError> {
        if self.is_organizer(user_id) {
            Ok(())
        } else {
            Err(TripError::NotOrganizer)
        }
    }

    /// Add an accepted member. Member user ids stay unique.
    pub fn add_member(&mut self, user_id: &str) -> Result<(), TripError> {
        if self.can_access(user_id) {
            return Err(TripError::AlreadyMember);
        }
        self.members.push(Member {
            user_id: user_id.to_string(),
            role: MemberRole::Member,
            status: MemberStatus::Accepted,
        });
        Ok(())
    }

    pub fn react_to_activity(
        &mut self,
        day_index: usize,
        activity_index: usize,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome, TripError> {
        self.ensure_member(user_id)?;
        let activity = self
            .itinerary
            .day_mut(day_index)?
            .activity_mut(activity_index)?;
        Ok(toggle_reaction(&mut activity.reactions, user_id, kind))
    }

    pub fn react_to_hotel(
        &mut self,
        day_index: usize,
        hotel_index: usize,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome, TripError> {
        self.ensure_member(user_id)?;
        let hotel = self.itinerary.day_mut(day_index)?.hotel_mut(hotel_index)?;
        Ok(toggle_reaction(&mut hotel.reactions, user_id, kind))
    }

    /// Append an expense paid by `paid_by`. The ledger is append-only.
    pub fn add_expense(
        &mut self,
        author_id: &str,
        description: &str,
        amount: f64,
        paid_by: &str,
    ) -> Result<&Expense, TripError> {
        self.ensure_member(author_id)?;

        let description = description.trim();
        if description.is_empty() {
            return Err(TripError::InvalidExpense("Description must be a non-empty string"));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(TripError::InvalidExpense("Amount must be a positive number"));
        }

        self.expenses.push(Expense {
            id: Uuid::new_v4().to_string(),
            description: description.to_string(),
            amount,
            paid_by: paid_by.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        Ok(&self.expenses[self.expenses.len() - 1])
    }

    pub fn add_chat_message(
        &mut self,
        user_id: &str,
        message: &str,
    ) -> Result<&ChatMessage, TripError> {
        self.ensure_member(user_id)?;

        let message = message.trim();
        if message.is_empty() {
            return Err(TripError::EmptyMessage);
        }

        self.chat_messages.push(ChatMessage {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        Ok(&self.chat_messages[self.chat_messages.len() - 1])
    }

    pub fn total_expenses(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }

    /// Every user id the document points at, for the read-side join
    pub fn referenced_user_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.insert(self.organizer_id.clone());
        ids.extend(self.members.iter().map(|m| m.user_id.clone()));
        ids.extend(self.expenses.iter().map(|e| e.paid_by.clone()));
        ids.extend(self.chat_messages.iter().map(|c| c.user_id.clone()));
        for day in &self.itinerary.days {
            for activity in &day.activities {
                ids.extend(activity.reactions.iter().map(|r| r.user_id.clone()));
            }
            for hotel in &day.hotels {
                ids.extend(hotel.reactions.iter().map(|r| r.user_id.clone()));
            }
        }
        ids
    }
}

/// Row of the `trips` table
#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub id: String,
    pub organizer_id: String,
    pub version: i64,
    pub document: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TripRow {
    pub fn into_trip(self) -> Result<Trip, serde_json::Error> {
        let mut trip: Trip = serde_json::from_str(&self.document)?;
        trip.version = self.version;
        Ok(trip)
    }
}
