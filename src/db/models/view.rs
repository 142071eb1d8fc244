//! Hydrated read models.
//!
//! Trip documents only store user ids. Responses replace each id with the
//! referenced user's public profile, looked up in one batch beforehand.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::trip::{
    Activity, ChatMessage, Day, Expense, Hotel, Member, MemberRole, MemberStatus, Reaction,
    ReactionKind, Trip,
};
use super::user::UserSummary;

/// Users loaded for a join, keyed by id
#[derive(Debug, Default, Clone)]
pub struct UserDirectory {
    users: HashMap<String, UserSummary>,
}

impl UserDirectory {
    pub fn new(users: Vec<UserSummary>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn resolve(&self, id: &str) -> UserSummary {
        self.users
            .get(id)
            .cloned()
            .unwrap_or_else(|| UserSummary::unknown(id))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    pub user: UserSummary,
    pub role: MemberRole,
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionView {
    pub user: UserSummary,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityView {
    pub time: String,
    pub activity: String,
    pub location: String,
    pub description: String,
    pub category: String,
    pub image: String,
    pub reactions: Vec<ReactionView>,
    /// Likes minus dislikes
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelView {
    pub name: String,
    pub attractions: String,
    pub address: String,
    pub rating: String,
    pub website_url: String,
    pub reactions: Vec<ReactionView>,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayView {
    pub day: u32,
    pub activities: Vec<ActivityView>,
    pub hotels: Vec<HotelView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryView {
    pub best_time_to_visit: String,
    pub days: Vec<DayView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseView {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub paid_by: UserSummary,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageView {
    pub id: String,
    pub user: UserSummary,
    pub message: String,
    pub timestamp: String,
}

/// Full trip with every user reference expanded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripView {
    pub id: String,
    pub name: String,
    pub destination: String,
    pub number_of_persons: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preferences: Vec<String>,
    pub organizer: UserSummary,
    pub members: Vec<MemberView>,
    pub itinerary: ItineraryView,
    pub expenses: Vec<ExpenseView>,
    pub total_expenses: f64,
    pub chat_messages: Vec<ChatMessageView>,
    pub created_at: String,
    pub updated_at: String,
}

/// Trip list entry: organizer and members expanded, no itinerary or ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSummary {
    pub id: String,
    pub name: String,
    pub destination: String,
    pub number_of_persons: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preferences: Vec<String>,
    pub organizer: UserSummary,
    pub members: Vec<MemberView>,
    pub created_at: String,
}

/// Envelope for endpoints that return a single trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub trip: TripView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripListResponse {
    pub trips: Vec<TripSummary>,
}

fn member_views(members: &[Member], users: &UserDirectory) -> Vec<MemberView> {
    members
        .iter()
        .map(|m| MemberView {
            user: users.resolve(&m.user_id),
            role: m.role,
            status: m.status,
        })
        .collect()
}

fn reaction_views(reactions: &[Reaction], users: &UserDirectory) -> (Vec<ReactionView>, i64) {
    let votes = reactions
        .iter()
        .map(|r| match r.kind {
            ReactionKind::Like => 1,
            ReactionKind::Dislike => -1,
        })
        .sum();
    let views = reactions
        .iter()
        .map(|r| ReactionView {
            user: users.resolve(&r.user_id),
            kind: r.kind,
        })
        .collect();
    (views, votes)
}

impl ActivityView {
    fn build(activity: &Activity, users: &UserDirectory) -> Self {
        let (reactions, votes) = reaction_views(&activity.reactions, users);
        Self {
            time: activity.time.clone(),
            activity: activity.activity.clone(),
            location: activity.location.clone(),
            description: activity.description.clone(),
            category: activity.category.clone(),
            image: activity.image.clone(),
            reactions,
            votes,
        }
    }
}

impl HotelView {
    fn build(hotel: &Hotel, users: &UserDirectory) -> Self {
        let (reactions, votes) = reaction_views(&hotel.reactions, users);
        Self {
            name: hotel.name.clone(),
            attractions: hotel.attractions.clone(),
            address: hotel.address.clone(),
            rating: hotel.rating.clone(),
            website_url: hotel.website_url.clone(),
            reactions,
            votes,
        }
    }
}

impl DayView {
    fn build(day: &Day, users: &UserDirectory) -> Self {
        Self {
            day: day.day,
            activities: day
                .activities
                .iter()
                .map(|a| ActivityView::build(a, users))
                .collect(),
            hotels: day.hotels.iter().map(|h| HotelView::build(h, users)).collect(),
        }
    }
}

impl ExpenseView {
    fn build(expense: &Expense, users: &UserDirectory) -> Self {
        Self {
            id: expense.id.clone(),
            description: expense.description.clone(),
            amount: expense.amount,
            paid_by: users.resolve(&expense.paid_by),
            created_at: expense.created_at.clone(),
        }
    }
}

impl ChatMessageView {
    fn build(message: &ChatMessage, users: &UserDirectory) -> Self {
        Self {
            id: message.id.clone(),
            user: users.resolve(&message.user_id),
            message: message.message.clone(),
            timestamp: message.timestamp.clone(),
        }
    }
}

impl TripView {
    pub fn build(trip: &Trip, users: &UserDirectory) -> Self {
        Self {
            id: trip.id.clone(),
            name: trip.name.clone(),
            destination: trip.destination.clone(),
            number_of_persons: trip.number_of_persons,
            start_date: trip.start_date,
            end_date: trip.end_date,
            preferences: trip.preferences.clone(),
            organizer: users.resolve(&trip.organizer_id),
            members: member_views(&trip.members, users),
            itinerary: ItineraryView {
                best_time_to_visit: trip.itinerary.best_time_to_visit.clone(),
                days: trip
                    .itinerary
                    .days
                    .iter()
                    .map(|d| DayView::build(d, users))
                    .collect(),
            },
            expenses: trip
                .expenses
                .iter()
                .map(|e| ExpenseView::build(e, users))
                .collect(),
            total_expenses: trip.total_expenses(),
            chat_messages: trip
                .chat_messages
                .iter()
                .map(|c| ChatMessageView::build(c, users))
                .collect(),
            created_at: trip.created_at.clone(),
            updated_at: trip.updated_at.clone(),
        }
    }
}

impl TripSummary {
    pub fn build(trip: &Trip, users: &UserDirectory) -> Self {
        Self {
            id: trip.id.clone(),
            name: trip.name.clone(),
            destination: trip.destination.clone(),
            number_of_persons: trip.number_of_persons,
            start_date: trip.start_date,
            end_date: trip.end_date,
            preferences: trip.preferences.clone(),
            organizer: users.resolve(&trip.organizer_id),
            members: member_views(&trip.members, users),
            created_at: trip.created_at.clone(),
        }
    }
}
