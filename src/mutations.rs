// Form submissions. Nothing here returns an error: every outcome, good or
// bad, comes back as `{success, message}` ready to show next to the form.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::ApiError,
    hooks::{BOOKING, FEATURED_TRIPS, MY_BOOKINGS, TRIP, TRIPS},
    mappers::{self, Booking},
    models::{ApiResponse, BookingRequest, ContactRequest},
    query::QueryCache,
    resources::{BookingsApi, ContactApi},
};

pub const BOOKING_CREATED: &str = "تم إنشاء الحجز بنجاح";
pub const BOOKING_CREATE_FAILED: &str = "فشل في إنشاء الحجز";
pub const BOOKING_CANCELLED: &str = "تم إلغاء الحجز بنجاح";
pub const BOOKING_CANCEL_FAILED: &str = "فشل في إلغاء الحجز";
pub const CONTACT_SENT: &str = "تم إرسال الرسالة بنجاح";
pub const CONTACT_FAILED: &str = "فشل في إرسال الرسالة";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T = ()> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn succeeded(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Failure carrying the server's own words when it sent any, `fallback`
    /// otherwise.
    pub fn from_error(error: &ApiError, fallback: &str) -> Self {
        Self::failed(error.server_message().unwrap_or_else(|| fallback.to_string()))
    }
}

// `success: false` inside a 2xx envelope counts as a failure too
pub(crate) fn envelope_outcome<D, T>(
    response: Result<ApiResponse<D>, ApiError>,
    success_message: &str,
    failure_message: &str,
    convert: impl FnOnce(D) -> T,
) -> Outcome<T> {
    match response {
        Ok(envelope) if !envelope.is_rejected() => {
            Outcome::succeeded(success_message, envelope.data.map(convert))
        }
        Ok(envelope) => Outcome::failed(
            envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| failure_message.to_string()),
        ),
        Err(e) => {
            warn!(error = %e, "request failed");
            Outcome::from_error(&e, failure_message)
        }
    }
}

#[derive(Clone)]
pub struct BookingMutations {
    api: BookingsApi,
    cache: QueryCache,
}

impl BookingMutations {
    pub fn new(api: BookingsApi, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// Seat limits are the server's call; its rejection message is passed
    /// through as is.
    pub async fn create(&self, request: &BookingRequest) -> Outcome<Booking> {
        let outcome = envelope_outcome(
            self.api.create(request).await,
            BOOKING_CREATED,
            BOOKING_CREATE_FAILED,
            |raw| mappers::map_booking(&raw),
        );
        if outcome.success {
            info!(trip_id = request.trip_id, "booking created");
            // Seat counts moved
            self.cache.invalidate(TRIPS);
            self.cache.invalidate(TRIP);
            self.cache.invalidate(FEATURED_TRIPS);
            self.cache.invalidate(MY_BOOKINGS);
        }
        outcome
    }

    pub async fn cancel(&self, id: u64) -> Outcome {
        let outcome = envelope_outcome(
            self.api.cancel(id).await,
            BOOKING_CANCELLED,
            BOOKING_CANCEL_FAILED,
            |_| (),
        );
        if outcome.success {
            info!(booking_id = id, "booking cancelled");
            self.cache.invalidate(MY_BOOKINGS);
            self.cache.invalidate(BOOKING);
            self.cache.invalidate(TRIPS);
            self.cache.invalidate(TRIP);
        }
        Outcome {
            data: None,
            ..outcome
        }
    }
}

#[derive(Clone)]
pub struct ContactMutations {
    api: ContactApi,
}

impl ContactMutations {
    pub fn new(api: ContactApi) -> Self {
        Self { api }
    }

    pub async fn send(&self, message: &ContactRequest) -> Outcome {
        let outcome = envelope_outcome(
            self.api.send_message(message).await,
            CONTACT_SENT,
            CONTACT_FAILED,
            |_| (),
        );
        Outcome {
            data: None,
            ..outcome
        }
    }
}
