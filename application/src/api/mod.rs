//! REST API of the application.

pub mod booking;

use axum::{body::Bytes, extract::Path, Extension, Json};
use common::operations::By;
use hmac::{Hmac, Mac as _};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use service::{
    command::{apply_payment_event, ApplyPaymentEvent, SubmitReturn},
    domain::{booking::return_flow, payment::Event, Booking},
    query::{ByReturnToken, DatabaseQuery},
    Command as _, Query as _,
};
use sha2::Sha256;

use crate::{error::AsError as _, Error, Service};

pub use self::booking::BookingView;

/// Header carrying the payment-processor webhook signature: a hex-encoded
/// HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Shared secret the payment-processor webhook signatures are keyed by.
#[derive(Clone, Debug)]
pub struct WebhookSecret(pub SecretString);

/// Acknowledgement of a processed webhook [`Event`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct WebhookAck {
    /// Application outcome of the [`Event`].
    pub outcome: &'static str,
}

/// `POST /webhooks/payments` handler applying an inbound payment-processor
/// [`Event`].
///
/// The signature is verified over the raw body before anything is parsed.
/// Unresolvable events acknowledge with `200` still, so the processor
/// doesn't redeliver what will never apply.
pub async fn payments_webhook(
    Extension(service): Extension<Service>,
    Extension(WebhookSecret(secret)): Extension<WebhookSecret>,
    headers: http::HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, Error> {
    if !signature_matches(&secret, &headers, &body) {
        return Err(Error::new(
            "INVALID_SIGNATURE",
            http::StatusCode::BAD_REQUEST,
            "webhook signature verification failed",
        ));
    }

    let event = serde_json::from_slice::<Event>(&body).map_err(|e| {
        Error::new(
            "MALFORMED_EVENT",
            http::StatusCode::BAD_REQUEST,
            format!("cannot parse webhook payload: {e}"),
        )
    })?;

    let outcome = service
        .execute(ApplyPaymentEvent(event))
        .await
        .map_err(|e| e.as_error())?;

    Ok(Json(WebhookAck {
        outcome: match outcome {
            apply_payment_event::Outcome::Applied => "APPLIED",
            apply_payment_event::Outcome::AlreadyApplied => "ALREADY_APPLIED",
            apply_payment_event::Outcome::Dropped => "DROPPED",
        },
    }))
}

/// `GET /bookings/{id}` handler resolving a [`Booking`] by its ID.
pub async fn get_booking(
    Extension(service): Extension<Service>,
    Path(id): Path<service::domain::booking::Id>,
) -> Result<Json<BookingView>, Error> {
    let booking = service
        .execute(DatabaseQuery::<By<Option<Booking>, _>>::by(id))
        .await
        .map_err(|e| e.as_error())?
        .ok_or_else(|| {
            Error::new(
                "BOOKING_NOT_FOUND",
                http::StatusCode::NOT_FOUND,
                format!("no booking `{id}` exists"),
            )
        })?;

    Ok(Json(BookingView::from(&booking)))
}

/// `GET /returns/{token}` handler resolving a [`Booking`] by its live
/// return token, for rendering the return page.
pub async fn get_return(
    Extension(service): Extension<Service>,
    Path(token): Path<return_flow::Token>,
) -> Result<Json<BookingView>, Error> {
    let booking = service
        .execute(ByReturnToken(token))
        .await
        .map_err(|e| e.as_error())?;

    Ok(Json(BookingView::from(&booking)))
}

/// Body of a [`post_return`] request.
#[derive(Clone, Debug, Deserialize)]
pub struct SubmitReturnRequest {
    /// [`return_flow::Method`] the item is returned by.
    pub method: return_flow::Method,

    /// Carrier tracking number, required for
    /// [`return_flow::Method::ExpressShipping`].
    #[serde(default)]
    pub tracking_number: Option<return_flow::TrackingNumber>,
}

/// `POST /returns/{token}` handler submitting a return by its single-use
/// token.
pub async fn post_return(
    Extension(service): Extension<Service>,
    Path(token): Path<return_flow::Token>,
    Json(request): Json<SubmitReturnRequest>,
) -> Result<Json<BookingView>, Error> {
    let booking = service
        .execute(SubmitReturn {
            token,
            method: request.method,
            tracking_number: request.tracking_number,
        })
        .await
        .map_err(|e| e.as_error())?;

    Ok(Json(BookingView::from(&booking)))
}

/// `GET /healthz` handler.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match signature"
)]
pub async fn healthz() -> &'static str {
    "ok"
}

/// Verifies the [`SIGNATURE_HEADER`] of the provided raw body against the
/// configured secret.
fn signature_matches(
    secret: &SecretString,
    headers: &http::HeaderMap,
    body: &[u8],
) -> bool {
    let Some(provided) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| hex::decode(h).ok())
    else {
        return false;
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(
        secret.expose_secret().as_bytes(),
    )
    .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod spec {
    use hmac::{Hmac, Mac as _};
    use secrecy::SecretString;
    use sha2::Sha256;

    use super::{signature_matches, SIGNATURE_HEADER};

    fn signed(secret: &str, body: &[u8]) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn headers_with(signature: &str) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        _ = headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        headers
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let body = br#"{"id":"evt_1","type":"checkout_expired"}"#;
        let headers = headers_with(&signed("s3cret", body));

        assert!(signature_matches(
            &SecretString::from("s3cret"),
            &headers,
            body,
        ));
    }

    #[test]
    fn rejects_tampered_body() {
        let headers = headers_with(&signed("s3cret", b"original"));

        assert!(!signature_matches(
            &SecretString::from("s3cret"),
            &headers,
            b"tampered",
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = b"payload";
        let headers = headers_with(&signed("other", body));

        assert!(!signature_matches(
            &SecretString::from("s3cret"),
            &headers,
            body,
        ));
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        let secret = SecretString::from("s3cret");

        assert!(!signature_matches(
            &secret,
            &http::HeaderMap::new(),
            b"payload",
        ));
        assert!(!signature_matches(
            &secret,
            &headers_with("not-hex-at-all"),
            b"payload",
        ));
    }
}
