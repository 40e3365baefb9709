//! [`Command`] for applying an inbound payment-processor [`Event`].

use common::operations::{
    By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking::{
            self, history::Actor, DeliveryStatus, PaymentStatus, SideEffect,
            Template,
        },
        chat,
        payment::{self, event, Event},
        refund, Booking, Payment,
    },
    infra::{database, outbound, Database, Outbound},
    Service,
};

use super::Command;

/// [`Command`] for applying an inbound payment-processor [`Event`].
///
/// Events are delivered at-least-once and unordered, so application is
/// idempotent: replays and stale deliveries are absorbed, never errors.
#[derive(Clone, Debug)]
pub struct ApplyPaymentEvent(pub Event);

/// Outcome of an [`ApplyPaymentEvent`] [`Command`] execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// [`Event`] was applied.
    Applied,

    /// [`Event`] had been applied before, nothing changed.
    AlreadyApplied,

    /// [`Event`] doesn't resolve to known entities (or arrived stale) and
    /// was discarded.
    Dropped,
}

impl<Db, Out> Command<ApplyPaymentEvent> for Service<Db, Out>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::IntentId>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<chat::Room>, booking::Id>>,
            Ok = Option<chat::Room>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Insert<chat::Room>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Out: Outbound<
        Perform<outbound::Notify>,
        Ok = (),
        Err = Traced<outbound::Error>,
    >,
{
    type Ok = Outcome;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        ApplyPaymentEvent(ev): ApplyPaymentEvent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Event { id: event_id, kind } = ev;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        match kind {
            event::Kind::CheckoutCompleted {
                payment_id,
                booking_id,
                intent_id,
            }
            | event::Kind::PaymentSucceeded {
                payment_id,
                booking_id,
                intent_id,
            } => {
                // Avoid concurrent actions upon the same `Booking`.
                tx.execute(Lock(By::new(booking_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                let Some(mut payment) = tx
                    .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `Payment(id: {payment_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };
                let Some(mut booking) = tx
                    .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `Booking(id: {booking_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };

                if payment.status == payment::Status::Paid {
                    return Ok(Outcome::AlreadyApplied);
                }

                payment.status = payment::Status::Paid;
                payment.intent_id = Some(intent_id);
                payment.booking_id = Some(booking_id);

                let effects = booking.record_payment(
                    PaymentStatus::Paid,
                    Actor::PaymentProcessor,
                    "charge confirmed",
                );

                // The chat room connects the two parties exactly once.
                let room = tx
                    .execute(Select(By::<Option<chat::Room>, _>::new(
                        booking_id,
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                if room.is_none() {
                    tx.execute(Insert(chat::Room::new(&booking)))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                }

                tx.execute(Insert(payment))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                tx.execute(Insert(booking.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                tx.execute(Commit)
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                self.dispatch(&booking, effects).await;
                Ok(Outcome::Applied)
            }

            event::Kind::PaymentFailed {
                payment_id,
                booking_id,
                reason,
            } => {
                tx.execute(Lock(By::new(booking_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                let Some(mut payment) = tx
                    .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `Payment(id: {payment_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };
                let Some(mut booking) = tx
                    .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `Booking(id: {booking_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };

                match payment.status {
                    // A stale failure never regresses a settled charge.
                    payment::Status::Paid | payment::Status::Refunded => {
                        log::info!(
                            "dropping stale `Event(id: {event_id})`: \
                             `Payment(id: {payment_id})` is settled already",
                        );
                        return Ok(Outcome::Dropped);
                    }
                    payment::Status::Failed => {
                        return Ok(Outcome::AlreadyApplied);
                    }
                    payment::Status::Pending | payment::Status::Expired => {}
                }

                payment.status = payment::Status::Failed;

                let mut effects = booking.record_payment(
                    PaymentStatus::Failed,
                    Actor::PaymentProcessor,
                    format!("charge failed: {reason}"),
                );
                // A failure on a cancelled booking changes nothing else.
                if let Ok(more) = booking.transition(
                    DeliveryStatus::PaymentRetryScheduled,
                    Actor::PaymentProcessor,
                    reason,
                ) {
                    effects.extend(more);
                }

                tx.execute(Insert(payment))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                tx.execute(Insert(booking.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                tx.execute(Commit)
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                self.dispatch(&booking, effects).await;
                Ok(Outcome::Applied)
            }

            event::Kind::CheckoutExpired { payment_id } => {
                let Some(mut payment) = tx
                    .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `Payment(id: {payment_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };

                match payment.status {
                    payment::Status::Expired => {
                        return Ok(Outcome::AlreadyApplied);
                    }
                    // Expiration applies to pending checkouts only.
                    payment::Status::Paid
                    | payment::Status::Failed
                    | payment::Status::Refunded => {
                        log::info!(
                            "dropping stale `Event(id: {event_id})`: \
                             `Payment(id: {payment_id})` is not pending",
                        );
                        return Ok(Outcome::Dropped);
                    }
                    payment::Status::Pending => {}
                }

                payment.status = payment::Status::Expired;

                if let Some(booking_id) = payment.booking_id {
                    tx.execute(Lock(By::new(booking_id)))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                    if let Some(mut booking) = tx
                        .execute(Select(By::<Option<Booking>, _>::new(
                            booking_id,
                        )))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?
                    {
                        let _ = booking.record_payment(
                            PaymentStatus::NotCharged,
                            Actor::PaymentProcessor,
                            "checkout expired",
                        );
                        tx.execute(Insert(booking))
                            .await
                            .map_err(tracerr::map_from_and_wrap!(=> E))
                            .map(drop)?;
                    }
                }

                tx.execute(Insert(payment))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                tx.execute(Commit)
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                Ok(Outcome::Applied)
            }

            event::Kind::Refund {
                refund_id,
                intent_id,
                amount,
                reason,
            } => {
                // Refund events carry no booking metadata: resolve via the
                // payment-intent linkage.
                let Some(mut payment) = tx
                    .execute(Select(By::<Option<Payment>, _>::new(
                        intent_id.clone(),
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `PaymentIntent(id: {intent_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };
                let Some(booking_id) = payment.booking_id else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         `Payment(id: {})` pays for no booking",
                        payment.id,
                    );
                    return Ok(Outcome::Dropped);
                };

                tx.execute(Lock(By::new(booking_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                let Some(mut booking) = tx
                    .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                else {
                    log::warn!(
                        "dropping `Event(id: {event_id})`: \
                         unknown `Booking(id: {booking_id})`",
                    );
                    return Ok(Outcome::Dropped);
                };

                // A refund violating the ledger's invariants can never
                // apply, so redelivering it is pointless: acknowledge and
                // discard.
                let applied =
                    match booking.apply_refund(refund_id, amount, reason) {
                        Ok(applied) => applied,
                        Err(e) => {
                            log::warn!(
                                "dropping `Event(id: {event_id})`: refund \
                                 cannot be applied to \
                                 `Booking(id: {booking_id})`: {e}",
                            );
                            return Ok(Outcome::Dropped);
                        }
                    };
                if applied == refund::Application::AlreadyApplied {
                    return Ok(Outcome::AlreadyApplied);
                }

                if booking.payment_status() == PaymentStatus::Refunded {
                    payment.status = payment::Status::Refunded;
                    tx.execute(Insert(payment))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                }
                tx.execute(Insert(booking.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
                tx.execute(Commit)
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                self.dispatch(
                    &booking,
                    vec![SideEffect::NotifyCustomer(Template::RefundIssued)],
                )
                .await;
                Ok(Outcome::Applied)
            }
        }
    }
}

/// Error of [`ApplyPaymentEvent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::{
        command::{
            tests::{
                reload, reload_payment, seed_booking, seed_item, service,
                usd, Recorder, DAY,
            },
            AcceptBooking, Command as _, CreateBooking,
        },
        domain::{
            allocation,
            booking::{DeliveryStatus, PaymentStatus, Template},
            payment::{self, event, Event, IntentId},
            refund, user, Booking,
        },
        infra::InMemory,
        Service,
    };

    use super::{ApplyPaymentEvent, Outcome};

    fn completed(n: u32, booking: &Booking) -> Event {
        Event {
            id: event::Id::from(format!("evt_{n}")),
            kind: event::Kind::CheckoutCompleted {
                payment_id: booking.payment_id.expect("payment linked"),
                booking_id: booking.id,
                intent_id: IntentId::from("pi_1".to_owned()),
            },
        }
    }

    fn failed(n: u32, booking: &Booking) -> Event {
        Event {
            id: event::Id::from(format!("evt_{n}")),
            kind: event::Kind::PaymentFailed {
                payment_id: booking.payment_id.expect("payment linked"),
                booking_id: booking.id,
                reason: "card declined".into(),
            },
        }
    }

    fn refunded(n: u32, refund_id: &str, amount: i64) -> Event {
        Event {
            id: event::Id::from(format!("evt_{n}")),
            kind: event::Kind::Refund {
                refund_id: refund::Id::from(refund_id.to_owned()),
                intent_id: IntentId::from("pi_1".to_owned()),
                amount: usd(amount),
                reason: None,
            },
        }
    }

    /// Seeds a booking and settles its checkout.
    async fn seed_paid(svc: &Service<InMemory, Recorder>) -> Booking {
        let booking = seed_booking(svc, 0).await;
        let outcome = svc
            .execute(ApplyPaymentEvent(completed(1, &booking)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        reload(svc, booking.id).await
    }

    #[tokio::test]
    async fn checkout_completion_settles_payment_and_opens_chat() {
        let svc = service();
        let (item_id, lender_id) = seed_item(&svc, 80).await;
        let now = DateTime::now();
        let booking = svc
            .execute(CreateBooking {
                customer_id: user::Id::new(),
                item_id,
                method: allocation::Method::Shipping,
                rental_starts_at: now.coerce(),
                rental_ends_at: (now + 4 * DAY).coerce(),
                insurance_fee: usd(10),
                shipping_fee: usd(10),
                discount: None,
            })
            .await
            .unwrap();
        let booking = svc
            .execute(AcceptBooking {
                booking_id: booking.id,
                lender_id,
            })
            .await
            .unwrap();

        let outcome = svc
            .execute(ApplyPaymentEvent(completed(1, &booking)))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Applied);
        let booking = reload(&svc, booking.id).await;
        assert_eq!(booking.payment_status(), PaymentStatus::Paid);
        assert_eq!(
            booking.delivery_status(),
            DeliveryStatus::AcceptedByLender,
        );
        let payment = reload_payment(&svc, &booking).await;
        assert_eq!(payment.status, payment::Status::Paid);
        assert_eq!(svc.database().chat_room_count(booking.id).await, 1);
    }

    #[tokio::test]
    async fn duplicate_checkout_completion_is_absorbed() {
        let svc = service();
        let booking = seed_paid(&svc).await;
        let history_len = booking.history().len();

        let outcome = svc
            .execute(ApplyPaymentEvent(completed(2, &booking)))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::AlreadyApplied);
        let booking = reload(&svc, booking.id).await;
        assert_eq!(booking.history().len(), history_len);
        assert_eq!(svc.database().chat_room_count(booking.id).await, 1);
    }

    #[tokio::test]
    async fn failure_then_success_converges_to_paid() {
        let svc = service();
        let booking = seed_booking(&svc, 0).await;

        let outcome = svc
            .execute(ApplyPaymentEvent(failed(1, &booking)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        let outcome = svc
            .execute(ApplyPaymentEvent(completed(2, &booking)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);

        let booking = reload(&svc, booking.id).await;
        assert_eq!(booking.payment_status(), PaymentStatus::Paid);
        assert_eq!(
            reload_payment(&svc, &booking).await.status,
            payment::Status::Paid,
        );
    }

    #[tokio::test]
    async fn stale_failure_never_regresses_paid() {
        let svc = service();
        let booking = seed_paid(&svc).await;

        let outcome = svc
            .execute(ApplyPaymentEvent(failed(2, &booking)))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Dropped);
        let booking = reload(&svc, booking.id).await;
        assert_eq!(booking.payment_status(), PaymentStatus::Paid);
        assert_eq!(
            reload_payment(&svc, &booking).await.status,
            payment::Status::Paid,
        );
    }

    #[tokio::test]
    async fn failure_notification_carries_the_processor_reason() {
        let svc = service();
        let booking = seed_booking(&svc, 0).await;

        let outcome = svc
            .execute(ApplyPaymentEvent(failed(1, &booking)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);

        let notifications = svc.outbound().notifications.lock().unwrap();
        assert!(notifications.iter().any(|n| {
            n.recipient == booking.customer_id
                && n.template
                    == Template::PaymentFailed {
                        reason: "card declined".to_owned(),
                    }
        }));
    }

    #[tokio::test]
    async fn expiration_applies_to_pending_checkouts_only() {
        let svc = service();
        let booking = seed_booking(&svc, 0).await;
        let expired = Event {
            id: event::Id::from("evt_1".to_owned()),
            kind: event::Kind::CheckoutExpired {
                payment_id: booking.payment_id.unwrap(),
            },
        };

        let outcome = svc
            .execute(ApplyPaymentEvent(expired.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        let reloaded = reload(&svc, booking.id).await;
        assert_eq!(reloaded.payment_status(), PaymentStatus::NotCharged);
        assert_eq!(
            reload_payment(&svc, &reloaded).await.status,
            payment::Status::Expired,
        );

        // Replay is absorbed.
        let outcome = svc
            .execute(ApplyPaymentEvent(expired))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn expiration_of_settled_checkout_is_dropped() {
        let svc = service();
        let booking = seed_paid(&svc).await;

        let outcome = svc
            .execute(ApplyPaymentEvent(Event {
                id: event::Id::from("evt_2".to_owned()),
                kind: event::Kind::CheckoutExpired {
                    payment_id: booking.payment_id.unwrap(),
                },
            }))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Dropped);
        assert_eq!(
            reload(&svc, booking.id).await.payment_status(),
            PaymentStatus::Paid,
        );
    }

    #[tokio::test]
    async fn refunds_accumulate_up_to_the_total() {
        let svc = service();
        let booking = seed_paid(&svc).await;

        // 40 of the 100 USD total.
        let outcome = svc
            .execute(ApplyPaymentEvent(refunded(2, "re_1", 40)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        let reloaded = reload(&svc, booking.id).await;
        assert_eq!(
            reloaded.payment_status(),
            PaymentStatus::PartiallyRefunded,
        );
        assert_eq!(reloaded.lender_payable(), usd(40));

        // Same processor refund redelivered.
        let outcome = svc
            .execute(ApplyPaymentEvent(refunded(3, "re_1", 40)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::AlreadyApplied);

        // The remaining 60 completes the refund.
        let outcome = svc
            .execute(ApplyPaymentEvent(refunded(4, "re_2", 60)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        let reloaded = reload(&svc, booking.id).await;
        assert_eq!(reloaded.payment_status(), PaymentStatus::Refunded);
        assert_eq!(
            reload_payment(&svc, &reloaded).await.status,
            payment::Status::Refunded,
        );

        // Anything further exceeds the total: acknowledged and discarded,
        // so the processor stops redelivering it.
        let outcome = svc
            .execute(ApplyPaymentEvent(refunded(5, "re_3", 10)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Dropped);
        let reloaded = reload(&svc, booking.id).await;
        assert_eq!(reloaded.payment_status(), PaymentStatus::Refunded);
        assert_eq!(reloaded.refunds().len(), 2);
    }

    #[tokio::test]
    async fn refund_with_unknown_intent_is_dropped() {
        let svc = service();
        _ = seed_booking(&svc, 0).await;

        let outcome = svc
            .execute(ApplyPaymentEvent(refunded(1, "re_1", 10)))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Dropped);
    }
}
