// View-model mapping: raw server records -> normalized, render-ready entities.
// Pure functions, no I/O.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::models::{
    RawBooking, RawBookingTrip, RawCategory, RawCategoryRef, RawRoomType, RawTrip,
};

pub const PLACEHOLDER_AR: &str = "غير محدد";
pub const PLACEHOLDER_EN: &str = "Not specified";
pub const NO_DESCRIPTION_AR: &str = "لا يوجد وصف";
pub const NO_DESCRIPTION_EN: &str = "No description";
pub const DEFAULT_TRIP_IMAGE: &str = "/images/default-trip.jpg";
pub const DEFAULT_COLOR_THEME: &str = "#007bff";
pub const DEFAULT_CATEGORY_ICON: &str = "fa-map-marker-alt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TripStatus {
    Active,
    FullyBooked,
    Cancelled,
    Completed,
}

impl TripStatus {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("fullybooked") | Some("fully_booked") | Some("full") => TripStatus::FullyBooked,
            Some("cancelled") | Some("canceled") => TripStatus::Cancelled,
            Some("completed") => TripStatus::Completed,
            _ => TripStatus::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "Active",
            TripStatus::FullyBooked => "FullyBooked",
            TripStatus::Cancelled => "Cancelled",
            TripStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoomKind {
    Single,
    Double,
    Triple,
}

impl RoomKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Some(RoomKind::Single),
            "double" => Some(RoomKind::Double),
            "triple" => Some(RoomKind::Triple),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Single => "Single",
            RoomKind::Double => "Double",
            RoomKind::Triple => "Triple",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomType {
    pub id: String,
    pub kind: RoomKind,
    pub extra_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: u64,
    pub name_ar: String,
    pub name_en: String,
    pub description_ar: Option<String>,
    pub description_en: Option<String>,
    pub color_theme: String,
    pub icon: String,
    pub image_url: Option<String>,
    pub trip_count: u32,
    pub is_active: bool,
}

impl Category {
    pub fn is_placeholder(&self) -> bool {
        self.id == 0 && self.name_ar == PLACEHOLDER_AR && self.name_en == PLACEHOLDER_EN
    }

    // Stand-in used when a trip arrives without its category
    pub fn placeholder() -> Self {
        Self {
            id: 0,
            name_ar: PLACEHOLDER_AR.to_string(),
            name_en: PLACEHOLDER_EN.to_string(),
            description_ar: None,
            description_en: None,
            color_theme: DEFAULT_COLOR_THEME.to_string(),
            icon: DEFAULT_CATEGORY_ICON.to_string(),
            image_url: None,
            trip_count: 0,
            is_active: true,
        }
    }

    pub fn to_raw(&self) -> RawCategory {
        RawCategory {
            id: self.id,
            name: Some(self.name_en.clone()),
            name_ar: Some(self.name_ar.clone()),
            description: self.description_en.clone(),
            description_ar: self.description_ar.clone(),
            image_url: self.image_url.clone(),
            color_theme: Some(self.color_theme.clone()),
            icon: Some(self.icon.clone()),
            is_active: Some(self.is_active),
            trip_count: Some(self.trip_count),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    pub id: u64,
    pub title_ar: String,
    pub title_en: String,
    pub description_ar: String,
    pub description_en: String,
    pub location_ar: String,
    pub location_en: String,
    pub main_image_url: String,
    pub gallery: Vec<String>,
    pub price_adult: f64,
    pub price_child_0_to_4: f64,
    pub price_child_4_to_6: f64,
    pub price_child_6_to_12: f64,
    pub duration_days: u32,
    pub required_count: u32,
    pub remaining_count: u32,
    pub meals_included: bool,
    pub is_featured: bool,
    pub is_active: bool,
    pub status: TripStatus,
    pub category_id: u64,
    pub category: Category,
    pub room_types: Vec<RoomType>,
    pub start_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Trip {
    /// No seats left. Status is not consulted: the server keeps trips
    /// `Active` long after the last seat is gone.
    pub fn is_fully_booked(&self) -> bool {
        self.remaining_count == 0
    }

    pub fn booked_count(&self) -> u32 {
        self.required_count.saturating_sub(self.remaining_count)
    }

    pub fn room_type(&self, kind: RoomKind) -> Option<&RoomType> {
        self.room_types.iter().find(|r| r.kind == kind)
    }

    pub fn to_raw(&self) -> RawTrip {
        RawTrip {
            id: self.id,
            title: Some(self.title_en.clone()),
            title_ar: Some(self.title_ar.clone()),
            description: Some(self.description_en.clone()),
            description_ar: Some(self.description_ar.clone()),
            location: Some(self.location_en.clone()),
            location_ar: Some(self.location_ar.clone()),
            price: Some(self.price_adult),
            price_child_0_to_4: Some(self.price_child_0_to_4),
            price_child_4_to_6: Some(self.price_child_4_to_6),
            price_child_6_to_12: Some(self.price_child_6_to_12),
            duration: Some(self.duration_days),
            max_participants: Some(self.required_count),
            remaining_count: Some(self.remaining_count),
            difficulty: None,
            difficulty_ar: None,
            image_url: Some(self.main_image_url.clone()),
            images: Some(self.gallery.clone()),
            room_types: Some(
                self.room_types
                    .iter()
                    .map(|r| RawRoomType {
                        id: Some(r.id.clone()),
                        kind: Some(r.kind.as_str().to_string()),
                        extra_cost: Some(r.extra_cost),
                    })
                    .collect(),
            ),
            meals_included: Some(self.meals_included),
            is_active: Some(self.is_active),
            is_featured: Some(self.is_featured),
            status: Some(self.status.as_str().to_string()),
            category_id: Some(self.category_id),
            category: (!self.category.is_placeholder()).then(|| RawCategoryRef {
                id: self.category.id,
                name: Some(self.category.name_en.clone()),
                name_ar: Some(self.category.name_ar.clone()),
            }),
            start_date: self.start_date.map(|d| d.to_rfc3339()),
            deadline: self.deadline.map(|d| d.to_rfc3339()),
            created_at: self.created_at.map(|d| d.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("confirmed") => BookingStatus::Confirmed,
            Some("cancelled") | Some("canceled") => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingTrip {
    pub id: u64,
    pub title_ar: String,
    pub title_en: String,
    pub price: f64,
    pub duration_days: u32,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: u64,
    pub booking_number: String,
    pub trip_id: u64,
    pub trip: Option<BookingTrip>,
    pub participants: u32,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub special_requests: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_cancellable(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

// Language-specific field, then the generic one, then the placeholder
fn bilingual(preferred: &Option<String>, other: &Option<String>, placeholder: &str) -> String {
    non_blank(preferred)
        .or_else(|| non_blank(other))
        .unwrap_or(placeholder)
        .to_string()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

pub fn parse_timestamp(raw: &Option<String>) -> Option<DateTime<Utc>> {
    let raw = non_blank(raw)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // ASP.NET serializes DateTime without an offset
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn default_room_types() -> Vec<RoomType> {
    [RoomKind::Single, RoomKind::Double, RoomKind::Triple]
        .into_iter()
        .map(|kind| RoomType {
            id: kind.as_str().to_ascii_lowercase(),
            kind,
            extra_cost: 0.0,
        })
        .collect()
}

fn map_room_types(raw: &Option<Vec<RawRoomType>>) -> Vec<RoomType> {
    let mapped: Vec<RoomType> = raw
        .iter()
        .flatten()
        .filter_map(|room| {
            let kind = RoomKind::parse(room.kind.as_deref()?)?;
            Some(RoomType {
                id: non_blank(&room.id)
                    .map(str::to_string)
                    .unwrap_or_else(|| kind.as_str().to_ascii_lowercase()),
                kind,
                extra_cost: non_negative(room.extra_cost),
            })
        })
        .collect();

    if mapped.is_empty() {
        default_room_types()
    } else {
        mapped
    }
}

fn map_category_ref(raw: &RawCategoryRef) -> Category {
    Category {
        id: raw.id,
        name_ar: bilingual(&raw.name_ar, &raw.name, PLACEHOLDER_AR),
        name_en: bilingual(&raw.name, &raw.name_ar, PLACEHOLDER_EN),
        ..Category::placeholder()
    }
}

pub fn map_category(raw: &RawCategory) -> Category {
    Category {
        id: raw.id,
        name_ar: bilingual(&raw.name_ar, &raw.name, PLACEHOLDER_AR),
        name_en: bilingual(&raw.name, &raw.name_ar, PLACEHOLDER_EN),
        description_ar: non_blank(&raw.description_ar)
            .or_else(|| non_blank(&raw.description))
            .map(str::to_string),
        description_en: non_blank(&raw.description)
            .or_else(|| non_blank(&raw.description_ar))
            .map(str::to_string),
        color_theme: non_blank(&raw.color_theme)
            .unwrap_or(DEFAULT_COLOR_THEME)
            .to_string(),
        icon: non_blank(&raw.icon).unwrap_or(DEFAULT_CATEGORY_ICON).to_string(),
        image_url: non_blank(&raw.image_url).map(str::to_string),
        trip_count: raw.trip_count.unwrap_or(0),
        is_active: raw.is_active.unwrap_or(true),
    }
}

pub fn map_categories(raw: &[RawCategory]) -> Vec<Category> {
    raw.iter().map(map_category).collect()
}

pub fn map_trip(raw: &RawTrip) -> Trip {
    let required_count = raw.max_participants.unwrap_or(0);
    // Without a live seat count every seat is assumed free
    let remaining_count = raw
        .remaining_count
        .unwrap_or(required_count)
        .min(required_count);

    let category = raw
        .category
        .as_ref()
        .map(map_category_ref)
        .unwrap_or_else(Category::placeholder);

    Trip {
        id: raw.id,
        title_ar: bilingual(&raw.title_ar, &raw.title, PLACEHOLDER_AR),
        title_en: bilingual(&raw.title, &raw.title_ar, PLACEHOLDER_EN),
        description_ar: bilingual(&raw.description_ar, &raw.description, NO_DESCRIPTION_AR),
        description_en: bilingual(&raw.description, &raw.description_ar, NO_DESCRIPTION_EN),
        location_ar: bilingual(&raw.location_ar, &raw.location, PLACEHOLDER_AR),
        location_en: bilingual(&raw.location, &raw.location_ar, PLACEHOLDER_EN),
        main_image_url: non_blank(&raw.image_url)
            .unwrap_or(DEFAULT_TRIP_IMAGE)
            .to_string(),
        gallery: raw
            .images
            .iter()
            .flatten()
            .filter(|url| !url.trim().is_empty())
            .cloned()
            .collect(),
        price_adult: non_negative(raw.price),
        price_child_0_to_4: non_negative(raw.price_child_0_to_4),
        price_child_4_to_6: non_negative(raw.price_child_4_to_6),
        price_child_6_to_12: non_negative(raw.price_child_6_to_12),
        duration_days: raw.duration.unwrap_or(0),
        required_count,
        remaining_count,
        meals_included: raw.meals_included.unwrap_or(false),
        is_featured: raw.is_featured.unwrap_or(false),
        is_active: raw.is_active.unwrap_or(true),
        status: TripStatus::parse(raw.status.as_deref()),
        category_id: if category.id != 0 {
            category.id
        } else {
            raw.category_id.unwrap_or(0)
        },
        category,
        room_types: map_room_types(&raw.room_types),
        start_date: parse_timestamp(&raw.start_date),
        deadline: parse_timestamp(&raw.deadline),
        created_at: parse_timestamp(&raw.created_at),
    }
}

pub fn map_trips(raw: &[RawTrip]) -> Vec<Trip> {
    raw.iter().map(map_trip).collect()
}

fn map_booking_trip(raw: &RawBookingTrip) -> BookingTrip {
    BookingTrip {
        id: raw.id,
        title_ar: bilingual(&raw.title_ar, &raw.title, PLACEHOLDER_AR),
        title_en: bilingual(&raw.title, &raw.title_ar, PLACEHOLDER_EN),
        price: non_negative(raw.price),
        duration_days: raw.duration.unwrap_or(0),
        image_url: non_blank(&raw.image_url)
            .unwrap_or(DEFAULT_TRIP_IMAGE)
            .to_string(),
    }
}

pub fn map_booking(raw: &RawBooking) -> Booking {
    let trip = raw.trip.as_ref().map(map_booking_trip);
    Booking {
        id: raw.id,
        booking_number: non_blank(&raw.booking_number)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", raw.id)),
        trip_id: raw
            .trip_id
            .or_else(|| trip.as_ref().map(|t| t.id))
            .unwrap_or(0),
        trip,
        participants: raw.participants.unwrap_or(0),
        total_amount: non_negative(raw.total_amount),
        status: BookingStatus::parse(raw.status.as_deref()),
        contact_name: non_blank(&raw.contact_name).unwrap_or_default().to_string(),
        contact_email: non_blank(&raw.contact_email).unwrap_or_default().to_string(),
        contact_phone: non_blank(&raw.contact_phone).unwrap_or_default().to_string(),
        special_requests: non_blank(&raw.special_requests).map(str::to_string),
        created_at: parse_timestamp(&raw.created_at),
    }
}

pub fn map_bookings(raw: &[RawBooking]) -> Vec<Booking> {
    raw.iter().map(map_booking).collect()
}

/// Head count for a booking, split by the price tiers trips are sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartySize {
    pub adults: u32,
    pub children_0_to_4: u32,
    pub children_4_to_6: u32,
    pub children_6_to_12: u32,
}

impl PartySize {
    pub fn adults(adults: u32) -> Self {
        Self {
            adults,
            ..Default::default()
        }
    }

    pub fn total(&self) -> u32 {
        self.adults + self.children_0_to_4 + self.children_4_to_6 + self.children_6_to_12
    }
}

pub fn calculate_trip_price(trip: &Trip, party: PartySize, room: RoomKind) -> f64 {
    let base = party.adults as f64 * trip.price_adult
        + party.children_0_to_4 as f64 * trip.price_child_0_to_4
        + party.children_4_to_6 as f64 * trip.price_child_4_to_6
        + party.children_6_to_12 as f64 * trip.price_child_6_to_12;

    base + trip.room_type(room).map(|r| r.extra_cost).unwrap_or(0.0)
}
