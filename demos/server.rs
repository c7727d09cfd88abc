// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! REST API server for ticket sales.
//!
//! Run with: `cargo run --example server`
//!
//! The payment gateway is simulated in-process: `/checkout` records a payment
//! that succeeds immediately, and either `/webhook` or `/confirm` (or both,
//! any number of times) turns it into exactly one order. Both routes only
//! name a payment; its status and metadata always come from the gateway.
//!
//! # Example Requests
//!
//! ```bash
//! # Tickets left
//! curl http://localhost:3000/availability
//!
//! # Start a checkout
//! curl -X POST http://localhost:3000/checkout \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Ada Lovelace", "email": "ada@example.com", "quantity": 2}'
//!
//! # Gateway push delivery (the payment is looked up, never taken from the body)
//! curl -X POST http://localhost:3000/webhook \
//!   -H "Content-Type: application/json" \
//!   -d '{"payment_id": "pay_1"}'
//!
//! # Client confirmation after the redirect
//! curl -X POST http://localhost:3000/confirm \
//!   -H "Content-Type: application/json" \
//!   -d '{"payment_id": "pay_1"}'
//!
//! # Roster
//! curl http://localhost:3000/orders
//! ```

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use ticket_ledger_rs::{
    Availability, Event, EventId, FulfillmentProcessor, LedgerConfig, LogNotifier, MemoryStore,
    NotificationDispatcher, Notifier, Order, PaymentId, PaymentVerifier, ReservationCoordinator,
    TicketError, TicketStore, VerifiedPayment,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CAPACITY: u32 = 35;
const EVENT_TITLE: &str = "Midlife High Five Deep Dive";

// === Request/Response DTOs ===

/// Request body for starting a checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub name: String,
    pub email: String,
    pub quantity: u32,
}

/// Response body for a started checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_id: PaymentId,
    pub quantity: u32,
    pub available: u32,
    pub amount: Decimal,
}

/// Request body for client-side confirmation.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub payment_id: PaymentId,
}

/// Push notification from the gateway. Any other fields in the body are
/// ignored: the payment is re-read through the gateway before fulfillment.
#[derive(Debug, Deserialize)]
pub struct WebhookNotification {
    pub payment_id: PaymentId,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Simulated Gateway ===

/// Records payments at checkout and reports them back on verification.
#[derive(Default)]
pub struct DemoGateway {
    payments: DashMap<PaymentId, VerifiedPayment>,
    next_id: AtomicU64,
}

impl DemoGateway {
    fn create(&self, request: &CheckoutRequest) -> PaymentId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let payment = VerifiedPayment::succeeded(
            format!("pay_{n}"),
            &request.name,
            &request.email,
            request.quantity,
        );
        let payment_id = payment.payment_id.clone();
        self.payments.insert(payment_id.clone(), payment);
        payment_id
    }
}

impl PaymentVerifier for DemoGateway {
    fn verify(&self, payment_id: &PaymentId) -> Result<VerifiedPayment, TicketError> {
        self.payments
            .get(payment_id)
            .map(|payment| payment.value().clone())
            .ok_or(TicketError::PaymentNotSucceeded)
    }
}

// === Application State ===

type Store = Arc<MemoryStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<FulfillmentProcessor<Store>>,
    pub reservations: Arc<ReservationCoordinator<Store>>,
    pub gateway: Arc<DemoGateway>,
}

impl AppState {
    fn event_id(&self) -> EventId {
        self.processor.config().event_id
    }
}

// === Error Handling ===

/// Wrapper for converting `TicketError` into HTTP responses.
pub struct AppError(TicketError);

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            TicketError::InvalidQuantity => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            TicketError::QuantityAboveLimit { .. } => {
                (StatusCode::BAD_REQUEST, "QUANTITY_ABOVE_LIMIT")
            }
            TicketError::InvalidName => (StatusCode::BAD_REQUEST, "INVALID_NAME"),
            TicketError::InvalidEmail => (StatusCode::BAD_REQUEST, "INVALID_EMAIL"),
            TicketError::InvalidPaymentId => (StatusCode::BAD_REQUEST, "INVALID_PAYMENT_ID"),
            TicketError::MissingMetadata(_) => (StatusCode::BAD_REQUEST, "MISSING_METADATA"),
            TicketError::PaymentNotSucceeded => {
                (StatusCode::PAYMENT_REQUIRED, "PAYMENT_NOT_SUCCEEDED")
            }
            TicketError::SalesNotOpen => (StatusCode::FORBIDDEN, "SALES_NOT_OPEN"),
            TicketError::EventNotFound => (StatusCode::NOT_FOUND, "EVENT_NOT_FOUND"),
            TicketError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "SOLD_OUT"),
            TicketError::TicketCodeExhausted => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TICKET_CODE_EXHAUSTED")
            }
            // Transient store failures ask the sender to redeliver.
            TicketError::Store(err) if err.is_transient() => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
            TicketError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Runs a fulfillment off the async runtime; it may wait on the ledger lock.
async fn blocking<F>(state: AppState, f: F) -> Result<Json<Order>, AppError>
where
    F: FnOnce(&FulfillmentProcessor<Store>, &DemoGateway) -> Result<Order, TicketError>
        + Send
        + 'static,
{
    tokio::task::spawn_blocking(move || f(&state.processor, &state.gateway))
        .await
        .map_err(|err| {
            AppError(TicketError::Store(ticket_ledger_rs::StoreError::Unavailable(
                err.to_string(),
            )))
        })?
        .map(Json)
        .map_err(AppError)
}

// === Handlers ===

/// GET /availability - Tickets left for the event.
async fn availability(State(state): State<AppState>) -> Result<Json<Availability>, AppError> {
    Ok(Json(state.reservations.availability(state.event_id())?))
}

/// POST /checkout - Pre-check availability and start a payment.
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let check = state
        .reservations
        .check_availability(state.event_id(), request.quantity)?;
    let payment_id = state.gateway.create(&request);
    let amount = state.processor.config().unit_price * Decimal::from(check.quantity);

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment_id,
            quantity: check.quantity,
            available: check.available,
            amount,
        }),
    ))
}

/// POST /webhook - Gateway push delivery of a payment id.
async fn webhook(
    State(state): State<AppState>,
    Json(notification): Json<WebhookNotification>,
) -> Result<Json<Order>, AppError> {
    blocking(state, move |processor, gateway| {
        processor.confirm_payment(gateway, &notification.payment_id)
    })
    .await
}

/// POST /confirm - Client-side confirmation after the checkout redirect.
async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<Order>, AppError> {
    blocking(state, move |processor, gateway| {
        processor.confirm_payment(gateway, &request.payment_id)
    })
    .await
}

/// GET /orders - Every committed order for the event.
async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .processor
        .store()
        .orders(state.event_id())
        .map_err(TicketError::from)?;
    Ok(Json(orders))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/availability", get(availability))
        .route("/checkout", post(checkout))
        .route("/webhook", post(webhook))
        .route("/confirm", post(confirm))
        .route("/orders", get(list_orders))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LedgerConfig::default();
    let store = Arc::new(MemoryStore::with_timeout(config.store_timeout()));
    let mut event = Event::new(config.event_id, Some(CAPACITY));
    event.details.title = Some(EVENT_TITLE.to_string());
    store.provision_event(event).unwrap();

    let sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier::new(EVENT_TITLE))];
    let notifications = NotificationDispatcher::spawn(sinks, config.notification_workers);
    let state = AppState {
        reservations: Arc::new(ReservationCoordinator::new(
            Arc::clone(&store),
            config.max_per_order,
        )),
        processor: Arc::new(
            FulfillmentProcessor::new(Arc::clone(&store), config).with_notifications(notifications),
        ),
        gateway: Arc::new(DemoGateway::default()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Ticket API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  GET  /availability  - Tickets left");
    println!("  POST /checkout      - Check availability and start a payment");
    println!("  POST /webhook       - Gateway payment delivery");
    println!("  POST /confirm       - Client payment confirmation");
    println!("  GET  /orders        - Committed orders");

    axum::serve(listener, app).await.unwrap();
}
