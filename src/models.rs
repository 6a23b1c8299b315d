// Wire-level records exactly as the storefront API sends them.
// Every field is optional: the server omits, renames and nulls fields freely,
// and the mappers decide the defaults.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ApiError;

// Envelope wrapping every API response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ApiResponse<T> {
    // Some endpoints leave the flag out; only an explicit `false` is a rejection
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default, deserialize_with = "lenient_errors")]
    pub errors: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: Some(true),
            message: None,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.success == Some(false)
    }

    /// Unwraps `data`, turning `success: false` into an error that keeps the
    /// server's message.
    pub fn into_data(self) -> Result<T, ApiError> {
        if self.is_rejected() {
            return Err(ApiError::Api {
                status: 200,
                message: self.message,
                errors: self.errors,
            });
        }
        self.data
            .ok_or_else(|| ApiError::Deserialization("envelope has no data".to_string()))
    }
}

// `errors` shows up as a list, null, or an ASP.NET-style field map
fn lenient_errors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn collect(value: Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s),
            Value::Array(items) => items.into_iter().for_each(|v| collect(v, out)),
            Value::Object(fields) => fields.into_iter().for_each(|(_, v)| collect(v, out)),
            Value::Null => {}
            other => out.push(other.to_string()),
        }
    }

    let value = Value::deserialize(deserializer)?;
    let mut out = Vec::new();
    collect(value, &mut out);
    Ok(out)
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageData<T> {
    pub items: Option<Vec<T>>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

// `data` of a list endpoint: either the documented page object or the bare array
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Bare(Vec<T>),
    Paged(PageData<T>),
}

/// A list endpoint body. Some deployments skip the envelope entirely and
/// answer with the array itself.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Bare(Vec<T>),
    Envelope(ApiResponse<ListPayload<T>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListParts<T> {
    pub items: Vec<T>,
    pub total_count: Option<u64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl<T> ListResponse<T> {
    pub fn into_parts(self) -> Result<ListParts<T>, ApiError> {
        let payload = match self {
            ListResponse::Bare(items) => ListPayload::Bare(items),
            ListResponse::Envelope(envelope) => {
                if envelope.is_rejected() {
                    return Err(ApiError::Api {
                        status: 200,
                        message: envelope.message,
                        errors: envelope.errors,
                    });
                }
                envelope.data.unwrap_or(ListPayload::Bare(Vec::new()))
            }
        };

        Ok(match payload {
            ListPayload::Bare(items) => ListParts {
                items,
                total_count: None,
                page: None,
                page_size: None,
            },
            ListPayload::Paged(page) => ListParts {
                items: page.items.unwrap_or_default(),
                total_count: page.total_count,
                page: page.page,
                page_size: page.page_size,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCategoryRef {
    pub id: u64,
    pub name: Option<String>,
    pub name_ar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRoomType {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub extra_cost: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTrip {
    pub id: u64,
    pub title: Option<String>,
    pub title_ar: Option<String>,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub location: Option<String>,
    pub location_ar: Option<String>,
    pub price: Option<f64>,
    #[serde(rename = "priceChild0to4")]
    pub price_child_0_to_4: Option<f64>,
    #[serde(rename = "priceChild4to6")]
    pub price_child_4_to_6: Option<f64>,
    #[serde(rename = "priceChild6to12")]
    pub price_child_6_to_12: Option<f64>,
    pub duration: Option<u32>,
    pub max_participants: Option<u32>,
    #[serde(alias = "availableSpots", alias = "remainingSpots")]
    pub remaining_count: Option<u32>,
    pub difficulty: Option<String>,
    pub difficulty_ar: Option<String>,
    pub image_url: Option<String>,
    pub images: Option<Vec<String>>,
    pub room_types: Option<Vec<RawRoomType>>,
    pub meals_included: Option<bool>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub status: Option<String>,
    pub category_id: Option<u64>,
    pub category: Option<RawCategoryRef>,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCategory {
    pub id: u64,
    pub name: Option<String>,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub image_url: Option<String>,
    pub color_theme: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
    pub trip_count: Option<u32>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBookingTrip {
    pub id: u64,
    pub title: Option<String>,
    pub title_ar: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<u32>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBooking {
    pub id: u64,
    pub booking_number: Option<String>,
    pub trip_id: Option<u64>,
    pub user_id: Option<u64>,
    pub participants: Option<u32>,
    pub total_amount: Option<f64>,
    pub status: Option<String>,
    pub status_ar: Option<String>,
    pub special_requests: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub trip: Option<RawBookingTrip>,
    pub created_at: Option<String>,
}

// Requests

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub trip_id: u64,
    pub participants: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
}
