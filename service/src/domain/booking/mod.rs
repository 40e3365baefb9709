//! [`Booking`] definitions.

pub mod history;
pub mod return_flow;
mod status;

use common::{unit, DateTime, DateTimeOf, Money, Percent};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{item, lender::AllocatedLender, payment, refund, user};

use self::history::Actor;

pub use self::status::{DeliveryStatus, PaymentStatus};

/// Rental of a catalog [`item::Item`] by a customer from an allocated
/// lender.
///
/// The [`DeliveryStatus`], the status [`history::Ledger`], the
/// [`refund::Ledger`] and the [`return_flow::State`] are private and mutated
/// through [`Booking`] methods only, so every status change lands in the
/// history and every refund stays within the booking total.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// ID of the customer who requested this [`Booking`].
    pub customer_id: user::Id,

    /// ID of the rented [`item::Item`].
    pub item_id: item::Id,

    /// Lender allocated to this [`Booking`].
    pub lender: AllocatedLender,

    /// [`DateTime`] when the rental window starts.
    ///
    /// [`DateTime`]: common::DateTime
    pub rental_starts_at: RentalStartDateTime,

    /// [`DateTime`] when the rental window ends.
    ///
    /// [`DateTime`]: common::DateTime
    pub rental_ends_at: RentalEndDateTime,

    /// [`Fees`] of this [`Booking`].
    pub fees: Fees,

    /// ID of the [`payment::Payment`] charging this [`Booking`], once the
    /// checkout is created.
    pub payment_id: Option<payment::Id>,

    /// [`DateTime`] when this [`Booking`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DeliveryStatus`] of this [`Booking`].
    delivery_status: DeliveryStatus,

    /// [`PaymentStatus`] of this [`Booking`].
    payment_status: PaymentStatus,

    /// Append-only status history of this [`Booking`].
    history: history::Ledger,

    /// Refunds applied against this [`Booking`].
    refunds: refund::Ledger,

    /// Return flow state of this [`Booking`].
    return_flow: return_flow::State,
}

impl Booking {
    /// Creates a new [`Booking`] in the [`DeliveryStatus::Pending`] status.
    #[must_use]
    pub fn new(
        customer_id: user::Id,
        item_id: item::Id,
        lender: AllocatedLender,
        rental_starts_at: RentalStartDateTime,
        rental_ends_at: RentalEndDateTime,
        fees: Fees,
    ) -> Self {
        Self {
            id: Id::new(),
            customer_id,
            item_id,
            lender,
            rental_starts_at,
            rental_ends_at,
            fees,
            payment_id: None,
            created_at: DateTime::now().coerce(),
            delivery_status: DeliveryStatus::Pending,
            payment_status: PaymentStatus::Pending,
            history: history::Ledger::opened_with(
                DeliveryStatus::Pending,
                Actor::Customer,
                "booking requested",
            ),
            refunds: refund::Ledger::new(),
            return_flow: return_flow::State::default(),
        }
    }

    /// Returns the current [`DeliveryStatus`] of this [`Booking`].
    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        self.delivery_status
    }

    /// Returns the current [`PaymentStatus`] of this [`Booking`].
    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Returns the status history of this [`Booking`].
    #[must_use]
    pub fn history(&self) -> &history::Ledger {
        &self.history
    }

    /// Returns the refunds applied against this [`Booking`].
    #[must_use]
    pub fn refunds(&self) -> &refund::Ledger {
        &self.refunds
    }

    /// Returns the return flow state of this [`Booking`].
    #[must_use]
    pub fn return_flow(&self) -> &return_flow::State {
        &self.return_flow
    }

    /// Transitions this [`Booking`] into the provided [`DeliveryStatus`],
    /// appending a new [`history::Entry`].
    ///
    /// Returns the [`SideEffect`]s to dispatch once the change is persisted.
    ///
    /// # Errors
    ///
    /// [`TransitionError`] in case the transition is illegal; the
    /// [`Booking`] is left untouched then.
    pub fn transition(
        &mut self,
        to: DeliveryStatus,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Result<Vec<SideEffect>, TransitionError> {
        let from = self.delivery_status;
        if !from.may_transition_to(to) {
            return Err(TransitionError { from, to });
        }

        let reason = reason.into();
        self.delivery_status = to;
        let effects = Self::side_effects(to, &reason);
        self.history.append(to, actor, reason);

        Ok(effects)
    }

    /// Records the provided [`PaymentStatus`] on this [`Booking`],
    /// appending a new [`history::Entry`] for the audit trail.
    ///
    /// Returns the [`SideEffect`]s to dispatch once the change is persisted.
    pub fn record_payment(
        &mut self,
        status: PaymentStatus,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Vec<SideEffect> {
        self.payment_status = status;
        self.history.append(self.delivery_status, actor, reason);

        match status {
            PaymentStatus::Paid => vec![
                SideEffect::NotifyCustomer(Template::PaymentReceived),
                SideEffect::NotifyLender(Template::PaymentReceived),
            ],
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
                vec![SideEffect::NotifyCustomer(Template::RefundIssued)]
            }
            PaymentStatus::Pending
            | PaymentStatus::RetryPending
            | PaymentStatus::RefundPending
            | PaymentStatus::Failed
            | PaymentStatus::NotCharged => vec![],
        }
    }

    /// Opens a new [`refund::Status::Pending`] refund on this [`Booking`],
    /// awaiting the processor confirmation.
    ///
    /// # Errors
    ///
    /// [`RefundError`] in case the refund is a duplicate, exceeds the
    /// booking total, or the [`Booking`] is not refundable at all.
    pub fn begin_refund(
        &mut self,
        id: refund::Id,
        amount: Money,
        kind: refund::Kind,
        reason: Option<String>,
        actor: Actor,
    ) -> Result<(), RefundError> {
        if self.refunds.contains(&id) {
            return Err(RefundError::AlreadyRequested(id));
        }
        self.check_refundable(amount)?;

        self.refunds.push(refund::Record {
            id,
            amount,
            reason,
            kind,
            status: refund::Status::Pending,
            actor,
            created_at: DateTime::now().coerce(),
        });
        self.payment_status = PaymentStatus::RefundPending;
        self.history.append(
            self.delivery_status,
            actor,
            format!("refund of {amount} requested"),
        );

        Ok(())
    }

    /// Applies a processor refund confirmation to this [`Booking`].
    ///
    /// A confirmation of a previously [opened] refund finalizes its
    /// [`refund::Record`]; an unseen refund (initiated on the processor
    /// side) lands as a new [`refund::Record`] directly. Repeated
    /// confirmations are absorbed as [`refund::Application::AlreadyApplied`].
    ///
    /// # Errors
    ///
    /// [`RefundError`] in case an unseen refund exceeds the booking total
    /// or the [`Booking`] is not refundable at all.
    ///
    /// [opened]: Booking::begin_refund
    pub fn apply_refund(
        &mut self,
        id: refund::Id,
        amount: Money,
        reason: Option<String>,
    ) -> Result<refund::Application, RefundError> {
        if let Some(record) = self.refunds.get(&id) {
            if record.status != refund::Status::Pending {
                return Ok(refund::Application::AlreadyApplied);
            }
            self.refunds.finalize(&id, refund::Status::Succeeded);
        } else {
            self.check_refundable(amount)?;

            let kind = if Some(amount) == self.remaining_refundable() {
                refund::Kind::Full
            } else {
                refund::Kind::Partial
            };
            self.refunds.push(refund::Record {
                id,
                amount,
                reason,
                kind,
                status: refund::Status::Succeeded,
                actor: Actor::PaymentProcessor,
                created_at: DateTime::now().coerce(),
            });
        }

        self.payment_status = if self.refunds.total() == Some(self.fees.total)
        {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.history.append(
            self.delivery_status,
            Actor::PaymentProcessor,
            format!("refund of {amount} confirmed"),
        );

        Ok(refund::Application::Applied)
    }

    /// Returns the amount still payable to the lender of this [`Booking`],
    /// floored at zero.
    #[must_use]
    pub fn lender_payable(&self) -> Money {
        let currency = self.lender.price.currency;
        self.refunds
            .total()
            .and_then(|refunded| self.lender.price.saturating_sub(refunded))
            .unwrap_or_else(|| {
                if self.refunds.is_empty() {
                    self.lender.price
                } else {
                    Money::zero(currency)
                }
            })
    }

    /// Mints a new single-use return [`return_flow::Token`] for this
    /// [`Booking`], valid for [`return_flow::TOKEN_VALIDITY`] after the
    /// rental window ends.
    ///
    /// Replaces the previously minted token, if any.
    pub fn mint_return_token(&mut self) -> return_flow::Token {
        let token = return_flow::Token::generate();
        self.return_flow.token = Some(token.clone());
        self.return_flow.token_expires_at =
            Some((self.rental_ends_at + return_flow::TOKEN_VALIDITY).coerce());
        token
    }

    /// Submits the return of this [`Booking`] by the customer, consuming
    /// the minted return [`return_flow::Token`].
    ///
    /// # Errors
    ///
    /// [`TransitionError`] in case this [`Booking`] doesn't await a return.
    pub fn submit_return(
        &mut self,
        method: return_flow::Method,
        tracking_number: Option<return_flow::TrackingNumber>,
    ) -> Result<Vec<SideEffect>, TransitionError> {
        let to = match method {
            return_flow::Method::ExpressShipping => DeliveryStatus::InTransit,
            return_flow::Method::LocalDropOff => DeliveryStatus::DroppedOff,
        };
        let effects =
            self.transition(to, Actor::Customer, "return submitted")?;

        self.return_flow.method = Some(method);
        self.return_flow.tracking_number = tracking_number;
        self.return_flow.submitted_at = Some(DateTime::now().coerce());
        self.return_flow.token = None;
        self.return_flow.reminders_stopped = true;

        Ok(effects)
    }

    /// Confirms the lender received the item of this [`Booking`] back,
    /// completing the [`Booking`].
    ///
    /// # Errors
    ///
    /// [`TransitionError`] in case no return may be received in the current
    /// [`DeliveryStatus`].
    pub fn confirm_return_receipt(
        &mut self,
    ) -> Result<Vec<SideEffect>, TransitionError> {
        let mut effects = self.transition(
            DeliveryStatus::ReceivedByLender,
            Actor::Lender,
            "return received",
        )?;
        self.return_flow.received_at = Some(DateTime::now().coerce());
        self.return_flow.reminders_stopped = true;

        effects.extend(self.transition(
            DeliveryStatus::Completed,
            Actor::Lender,
            "booking completed",
        )?);
        Ok(effects)
    }

    /// Reports an [`return_flow::Issue`] with the returned item of this
    /// [`Booking`].
    ///
    /// # Errors
    ///
    /// [`TransitionError`] in case no issue may be reported in the current
    /// [`DeliveryStatus`].
    pub fn report_return_issue(
        &mut self,
        issue: return_flow::Issue,
    ) -> Result<Vec<SideEffect>, TransitionError> {
        let effects = self.transition(
            DeliveryStatus::IssueReported,
            Actor::Lender,
            "return issue reported",
        )?;
        self.return_flow.issue = Some(issue);
        Ok(effects)
    }

    /// Escalates this overdue [`Booking`] to the [`DeliveryStatus`]
    /// matching the days its return is late by, suggesting a late fee of
    /// the provided [`Percent`] of the booking total per day.
    ///
    /// [`None`] is returned (and nothing changes) in case this [`Booking`]
    /// doesn't await a return, is not late, or already sits at (or above)
    /// the matching escalation status.
    pub fn escalate(
        &mut self,
        now: DateTime,
        late_fee_percent: Percent,
    ) -> Option<Vec<SideEffect>> {
        if !self.delivery_status.is_awaiting_return() {
            return None;
        }

        let days_late = now.whole_days_since(self.rental_ends_at)?;
        let to = return_flow::escalation_status(days_late)?;
        let effects = self
            .transition(
                to,
                Actor::Scheduler,
                format!("return {days_late} days late"),
            )
            .ok()?;

        let total = self.fees.total;
        self.return_flow.suggested_late_fee = Some(Money {
            amount: late_fee_percent.of(total.amount)
                * Decimal::from(days_late),
            currency: total.currency,
        });
        if to.escalation_tier().unwrap_or(0) >= 4 {
            self.return_flow.suggested_replacement_fee = Some(total);
        }

        Some(effects)
    }

    /// Indicates whether return reminders must no longer be sent for this
    /// [`Booking`].
    #[must_use]
    pub fn reminders_stopped(&self) -> bool {
        self.return_flow.reminders_stopped
            || self.return_flow.submitted_at.is_some()
            || self.return_flow.tracking_number.is_some()
            || self.return_flow.received_at.is_some()
            || self.delivery_status.is_return_settled()
    }

    /// Records a return reminder sent for this [`Booking`].
    pub fn record_reminder_sent(&mut self) {
        self.return_flow.reminder_count += 1;
    }

    /// Returns the number of whole days the return of this [`Booking`] is
    /// late by, zero if the rental window hasn't ended yet.
    #[must_use]
    pub fn days_overdue(&self, now: DateTime) -> u64 {
        now.whole_days_since(self.rental_ends_at).unwrap_or(0)
    }

    /// Ensures a refund of the provided amount may be applied to this
    /// [`Booking`].
    fn check_refundable(&self, amount: Money) -> Result<(), RefundError> {
        if !self.payment_status.is_settled() {
            return Err(RefundError::NotRefundable(self.payment_status));
        }

        let remaining = self
            .remaining_refundable()
            .ok_or(RefundError::CurrencyMismatch)?;
        let left = remaining
            .checked_sub(amount)
            .ok_or(RefundError::CurrencyMismatch)?;
        if left.amount.is_sign_negative() {
            return Err(RefundError::ExceedsTotal {
                requested: amount,
                remaining,
            });
        }
        Ok(())
    }

    /// Returns the amount still refundable on this [`Booking`].
    ///
    /// [`None`] is returned in case of a currency mismatch in the refund
    /// ledger.
    #[must_use]
    pub fn remaining_refundable(&self) -> Option<Money> {
        match self.refunds.total() {
            Some(refunded) => self.fees.total.saturating_sub(refunded),
            None if self.refunds.is_empty() => Some(self.fees.total),
            None => None,
        }
    }

    /// Returns the [`SideEffect`]s of entering the provided
    /// [`DeliveryStatus`] for the provided `reason`.
    fn side_effects(to: DeliveryStatus, reason: &str) -> Vec<SideEffect> {
        use {SideEffect as E, Template as T};

        match to {
            DeliveryStatus::AcceptedByLender => {
                vec![E::NotifyCustomer(T::BookingAccepted)]
            }
            DeliveryStatus::RejectedByLender => {
                vec![E::NotifyCustomer(T::BookingRejected)]
            }
            DeliveryStatus::PaymentRetryScheduled => {
                // The customer is told why the charge failed.
                vec![E::NotifyCustomer(T::PaymentFailed {
                    reason: reason.to_owned(),
                })]
            }
            DeliveryStatus::ShippedToCustomer => {
                vec![E::NotifyCustomer(T::ItemShipped)]
            }
            DeliveryStatus::Delivered => {
                vec![E::NotifyCustomer(T::ItemDelivered)]
            }
            DeliveryStatus::ReturnLinkSent => {
                vec![E::NotifyCustomer(T::ReturnLink)]
            }
            DeliveryStatus::InTransit | DeliveryStatus::DroppedOff => {
                vec![E::NotifyLender(T::ReturnSubmitted)]
            }
            DeliveryStatus::ReceivedByLender => {
                vec![E::NotifyCustomer(T::ReturnReceived)]
            }
            DeliveryStatus::Completed => {
                vec![E::NotifyCustomer(T::BookingCompleted)]
            }
            DeliveryStatus::LateReturn | DeliveryStatus::Overdue => {
                vec![E::NotifyCustomer(T::OverdueNotice)]
            }
            DeliveryStatus::Escalated
            | DeliveryStatus::HighRisk
            | DeliveryStatus::NonReturned => vec![
                E::NotifyCustomer(T::OverdueNotice),
                E::NotifyLender(T::EscalationNotice),
            ],
            DeliveryStatus::CancelledByCustomer => {
                vec![E::NotifyLender(T::BookingCancelled)]
            }
            DeliveryStatus::CancelledByLender => {
                vec![E::NotifyCustomer(T::BookingCancelled)]
            }
            DeliveryStatus::CancelledByAdmin => vec![
                E::NotifyCustomer(T::BookingCancelled),
                E::NotifyLender(T::BookingCancelled),
            ],
            DeliveryStatus::IssueReported => {
                vec![E::NotifyCustomer(T::IssueReported)]
            }
            DeliveryStatus::Pending
            | DeliveryStatus::PreparingShipment
            | DeliveryStatus::LabelReady
            | DeliveryStatus::ReturnDue
            | DeliveryStatus::Disputed => vec![],
        }
    }
}

/// ID of a [`Booking`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Fees of a [`Booking`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Fees {
    /// Rental price quoted by the allocated lender.
    pub base_price: Money,

    /// Insurance fee.
    pub insurance_fee: Money,

    /// Shipping fee, zero for local pickups.
    pub shipping_fee: Money,

    /// Promo discount, zero if none applies.
    pub discount: Money,

    /// Charged total: base price plus fees minus the discount, floored at
    /// zero.
    pub total: Money,
}

impl Fees {
    /// Creates new [`Fees`] computing their total.
    ///
    /// [`None`] is returned in case of a currency mismatch or an arithmetic
    /// overflow.
    #[must_use]
    pub fn new(
        base_price: Money,
        insurance_fee: Money,
        shipping_fee: Money,
        discount: Option<Money>,
    ) -> Option<Self> {
        let discount =
            discount.unwrap_or_else(|| Money::zero(base_price.currency));
        let total = base_price
            .checked_add(insurance_fee)?
            .checked_add(shipping_fee)?
            .saturating_sub(discount)?;
        Some(Self {
            base_price,
            insurance_fee,
            shipping_fee,
            discount,
            total,
        })
    }
}

/// Side effect of a [`Booking`] change, dispatched only after the change is
/// persisted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SideEffect {
    /// Notify the customer of the [`Booking`].
    NotifyCustomer(Template),

    /// Notify the lender of the [`Booking`].
    NotifyLender(Template),
}

/// Notification template of a [`SideEffect`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Template {
    /// New booking was requested for the lender's item.
    BookingRequested,

    /// Booking was accepted by the lender.
    BookingAccepted,

    /// Booking was rejected by the lender.
    BookingRejected,

    /// Booking was cancelled.
    BookingCancelled,

    /// Booking completed.
    BookingCompleted,

    /// Payment was received.
    PaymentReceived,

    /// Payment failed, a retry is scheduled.
    PaymentFailed {
        /// Processor-supplied reason of the failure.
        reason: String,
    },

    /// Item was shipped to the customer.
    ItemShipped,

    /// Item was delivered to the customer.
    ItemDelivered,

    /// Return link for submitting the return.
    ReturnLink,

    /// Reminder of the approaching return.
    ReturnReminder,

    /// Return was submitted by the customer.
    ReturnSubmitted,

    /// Return was received by the lender.
    ReturnReceived,

    /// Return is overdue.
    OverdueNotice,

    /// Overdue return was escalated.
    EscalationNotice,

    /// Refund was issued.
    RefundIssued,

    /// Issue with the returned item was reported.
    IssueReported,
}

/// Error of an illegal [`DeliveryStatus`] transition.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("illegal transition from `{from}` to `{to}`")]
pub struct TransitionError {
    /// [`DeliveryStatus`] the transition was attempted from.
    pub from: DeliveryStatus,

    /// [`DeliveryStatus`] the transition was attempted into.
    pub to: DeliveryStatus,
}

/// Error of refunding a [`Booking`].
#[derive(Clone, Debug, Display, Error)]
pub enum RefundError {
    /// Refund with the same ID was requested already.
    #[display("refund `{_0}` requested already")]
    AlreadyRequested(#[error(not(source))] refund::Id),

    /// Refund exceeds the remaining refundable amount.
    #[display("refund of {requested} exceeds remaining refundable {remaining}")]
    ExceedsTotal {
        /// Requested refund amount.
        requested: Money,

        /// Remaining refundable amount.
        remaining: Money,
    },

    /// Refund currency differs from the booking's one.
    #[display("refund currency differs from the booking's one")]
    CurrencyMismatch,

    /// Booking is not refundable in its current [`PaymentStatus`].
    #[display("booking is not refundable in `{_0}` payment status")]
    NotRefundable(#[error(not(source))] PaymentStatus),
}

/// Persisted representation of a [`Booking`].
///
/// Bridges the private [`Booking`] fields for storage backends; not
/// intended for any use beyond (de)hydration.
#[derive(Clone, Debug)]
pub struct Record {
    /// ID of the [`Booking`].
    pub id: Id,

    /// ID of the customer.
    pub customer_id: user::Id,

    /// ID of the rented [`item::Item`].
    pub item_id: item::Id,

    /// Allocated lender.
    pub lender: AllocatedLender,

    /// Start of the rental window.
    pub rental_starts_at: RentalStartDateTime,

    /// End of the rental window.
    pub rental_ends_at: RentalEndDateTime,

    /// [`Fees`] of the [`Booking`].
    pub fees: Fees,

    /// ID of the charging [`payment::Payment`], if any.
    pub payment_id: Option<payment::Id>,

    /// Creation [`DateTime`] of the [`Booking`].
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DeliveryStatus`] of the [`Booking`].
    pub delivery_status: DeliveryStatus,

    /// [`PaymentStatus`] of the [`Booking`].
    pub payment_status: PaymentStatus,

    /// Status history of the [`Booking`].
    pub history: history::Ledger,

    /// Refunds of the [`Booking`].
    pub refunds: refund::Ledger,

    /// Return flow state of the [`Booking`].
    pub return_flow: return_flow::State,
}

impl From<Record> for Booking {
    fn from(r: Record) -> Self {
        Self {
            id: r.id,
            customer_id: r.customer_id,
            item_id: r.item_id,
            lender: r.lender,
            rental_starts_at: r.rental_starts_at,
            rental_ends_at: r.rental_ends_at,
            fees: r.fees,
            payment_id: r.payment_id,
            created_at: r.created_at,
            delivery_status: r.delivery_status,
            payment_status: r.payment_status,
            history: r.history,
            refunds: r.refunds,
            return_flow: r.return_flow,
        }
    }
}

impl From<Booking> for Record {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            customer_id: b.customer_id,
            item_id: b.item_id,
            lender: b.lender,
            rental_starts_at: b.rental_starts_at,
            rental_ends_at: b.rental_ends_at,
            fees: b.fees,
            payment_id: b.payment_id,
            created_at: b.created_at,
            delivery_status: b.delivery_status,
            payment_status: b.payment_status,
            history: b.history,
            refunds: b.refunds,
            return_flow: b.return_flow,
        }
    }
}

/// [`DateTime`] when a [`Booking`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when the rental window of a [`Booking`] starts.
///
/// [`DateTime`]: common::DateTime
pub type RentalStartDateTime = DateTimeOf<(Booking, unit::Start)>;

/// [`DateTime`] when the rental window of a [`Booking`] ends.
///
/// [`DateTime`]: common::DateTime
pub type RentalEndDateTime = DateTimeOf<(Booking, unit::End)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{money::Currency, DateTime, Money, Percent};
    use rust_decimal::Decimal;

    use crate::domain::{
        item,
        lender::{self, AllocatedLender},
        refund, user,
    };

    use super::{
        history::Actor, return_flow, Booking, DeliveryStatus, Fees,
        PaymentStatus, RefundError, SideEffect, Template,
    };

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn usd(amount: i64) -> Money {
        Money {
            amount: Decimal::new(amount, 0),
            currency: Currency::Usd,
        }
    }

    fn booking(ends_in_days_ago: u32) -> Booking {
        let now = DateTime::now();
        Booking::new(
            user::Id::new(),
            item::Id::new(),
            AllocatedLender {
                lender_id: user::Id::new(),
                price: usd(80),
                kind: lender::Kind::Shipping,
                point: None,
                allocated_at: now.coerce(),
            },
            (now - (ends_in_days_ago + 4) * DAY).coerce(),
            (now - ends_in_days_ago * DAY).coerce(),
            Fees::new(usd(80), usd(10), usd(10), None).unwrap(),
        )
    }

    fn paid_booking(ends_in_days_ago: u32) -> Booking {
        let mut b = booking(ends_in_days_ago);
        let _ = b.record_payment(
            PaymentStatus::Paid,
            Actor::PaymentProcessor,
            "charge confirmed",
        );
        b
    }

    /// Walks the provided [`Booking`] into an awaiting-return status.
    fn awaiting_return(b: &mut Booking) {
        for to in [
            DeliveryStatus::AcceptedByLender,
            DeliveryStatus::Delivered,
            DeliveryStatus::ReturnDue,
            DeliveryStatus::ReturnLinkSent,
        ] {
            let _ = b.transition(to, Actor::Lender, "test").unwrap();
        }
    }

    #[test]
    fn transition_appends_history_and_yields_effects() {
        let mut b = booking(0);
        assert_eq!(b.history().len(), 1);

        let effects = b
            .transition(
                DeliveryStatus::AcceptedByLender,
                Actor::Lender,
                "accepted",
            )
            .unwrap();

        assert_eq!(b.delivery_status(), DeliveryStatus::AcceptedByLender);
        assert_eq!(b.history().len(), 2);
        assert_eq!(b.history().last().unwrap().reason, "accepted");
        assert_eq!(
            effects,
            vec![SideEffect::NotifyCustomer(Template::BookingAccepted)],
        );
    }

    #[test]
    fn illegal_transition_leaves_booking_untouched() {
        let mut b = booking(0);

        let result = b.transition(
            DeliveryStatus::Completed,
            Actor::Admin,
            "short-circuit",
        );

        assert!(result.is_err());
        assert_eq!(b.delivery_status(), DeliveryStatus::Pending);
        assert_eq!(b.history().len(), 1);
    }

    #[test]
    fn customer_cancel_allowed_while_pending_only() {
        let mut b = booking(0);
        let _ = b
            .transition(
                DeliveryStatus::AcceptedByLender,
                Actor::Lender,
                "accepted",
            )
            .unwrap();

        let result = b.transition(
            DeliveryStatus::CancelledByCustomer,
            Actor::Customer,
            "changed my mind",
        );

        assert!(result.is_err());
    }

    #[test]
    fn refund_applications_are_deduplicated() {
        let mut b = paid_booking(0);
        let id = refund::Id::from("re_1".to_owned());

        let first = b.apply_refund(id.clone(), usd(30), None).unwrap();
        let second = b.apply_refund(id, usd(30), None).unwrap();

        assert_eq!(first, refund::Application::Applied);
        assert_eq!(second, refund::Application::AlreadyApplied);
        assert_eq!(b.refunds().len(), 1);
        assert_eq!(b.refunds().total(), Some(usd(30)));
    }

    #[test]
    fn refunds_never_exceed_booking_total() {
        let mut b = paid_booking(0);

        let _ = b
            .apply_refund(refund::Id::from("re_1".to_owned()), usd(90), None)
            .unwrap();
        let result =
            b.apply_refund(refund::Id::from("re_2".to_owned()), usd(20), None);

        assert!(matches!(result, Err(RefundError::ExceedsTotal { .. })));
        assert_eq!(b.refunds().len(), 1);
    }

    #[test]
    fn full_refund_settles_as_refunded() {
        let mut b = paid_booking(0);

        let _ = b
            .apply_refund(refund::Id::from("re_1".to_owned()), usd(40), None)
            .unwrap();
        assert_eq!(b.payment_status(), PaymentStatus::PartiallyRefunded);

        let _ = b
            .apply_refund(refund::Id::from("re_2".to_owned()), usd(60), None)
            .unwrap();
        assert_eq!(b.payment_status(), PaymentStatus::Refunded);
    }

    #[test]
    fn begun_refund_is_finalized_by_confirmation() {
        let mut b = paid_booking(0);
        let id = refund::Id::from("re_1".to_owned());

        b.begin_refund(
            id.clone(),
            usd(25),
            refund::Kind::Partial,
            Some("broken strap".to_owned()),
            Actor::Admin,
        )
        .unwrap();
        assert_eq!(b.payment_status(), PaymentStatus::RefundPending);
        assert_eq!(
            b.refunds().get(&id).unwrap().status,
            refund::Status::Pending,
        );

        let applied = b.apply_refund(id.clone(), usd(25), None).unwrap();

        assert_eq!(applied, refund::Application::Applied);
        assert_eq!(b.refunds().len(), 1);
        assert_eq!(
            b.refunds().get(&id).unwrap().status,
            refund::Status::Succeeded,
        );
        assert_eq!(b.payment_status(), PaymentStatus::PartiallyRefunded);
    }

    #[test]
    fn unpaid_booking_is_not_refundable() {
        let mut b = booking(0);

        let result =
            b.apply_refund(refund::Id::from("re_1".to_owned()), usd(10), None);

        assert!(matches!(result, Err(RefundError::NotRefundable(_))));
    }

    #[test]
    fn lender_payable_floors_at_zero() {
        let mut b = paid_booking(0);
        assert_eq!(b.lender_payable(), usd(80));

        let _ = b
            .apply_refund(refund::Id::from("re_1".to_owned()), usd(100), None)
            .unwrap();

        assert_eq!(b.lender_payable(), Money::zero(Currency::Usd));
    }

    #[test]
    fn return_token_expires_30_days_past_rental_end() {
        let mut b = paid_booking(0);

        let token = b.mint_return_token();

        assert_eq!(b.return_flow().token.as_ref(), Some(&token));
        assert_eq!(
            b.return_flow().token_expires_at.unwrap(),
            (b.rental_ends_at + return_flow::TOKEN_VALIDITY).coerce(),
        );
    }

    #[test]
    fn submitting_return_consumes_token() {
        let mut b = paid_booking(0);
        awaiting_return(&mut b);
        let _ = b.mint_return_token();

        let effects = b
            .submit_return(
                return_flow::Method::ExpressShipping,
                Some(return_flow::TrackingNumber::from("TRACK123".to_owned())),
            )
            .unwrap();

        assert_eq!(b.delivery_status(), DeliveryStatus::InTransit);
        assert!(b.return_flow().token.is_none());
        assert!(b.return_flow().submitted_at.is_some());
        assert_eq!(
            effects,
            vec![SideEffect::NotifyLender(Template::ReturnSubmitted)],
        );
    }

    #[test]
    fn receipt_confirmation_completes_booking() {
        let mut b = paid_booking(0);
        awaiting_return(&mut b);
        let _ = b
            .submit_return(return_flow::Method::LocalDropOff, None)
            .unwrap();

        let effects = b.confirm_return_receipt().unwrap();

        assert_eq!(b.delivery_status(), DeliveryStatus::Completed);
        assert!(b.return_flow().received_at.is_some());
        assert_eq!(
            effects,
            vec![
                SideEffect::NotifyCustomer(Template::ReturnReceived),
                SideEffect::NotifyCustomer(Template::BookingCompleted),
            ],
        );
    }

    #[test]
    fn escalation_is_monotonic_and_suggests_fees() {
        let pct = Percent::new(Decimal::new(5, 0)).unwrap();
        let mut b = paid_booking(3);
        awaiting_return(&mut b);

        let effects = b.escalate(DateTime::now(), pct).unwrap();
        assert_eq!(b.delivery_status(), DeliveryStatus::LateReturn);
        assert_eq!(
            effects,
            vec![SideEffect::NotifyCustomer(Template::OverdueNotice)],
        );
        // 5% of 100USD per day, 3 days late.
        assert_eq!(b.return_flow().suggested_late_fee, Some(usd(15)));
        assert!(b.return_flow().suggested_replacement_fee.is_none());

        // Same day: nothing to escalate further.
        assert!(b.escalate(DateTime::now(), pct).is_none());
    }

    #[test]
    fn deep_escalation_may_jump_tiers() {
        let pct = Percent::new(Decimal::new(5, 0)).unwrap();
        let mut b = paid_booking(16);
        awaiting_return(&mut b);

        let _ = b.escalate(DateTime::now(), pct).unwrap();

        assert_eq!(b.delivery_status(), DeliveryStatus::HighRisk);
        assert_eq!(b.return_flow().suggested_replacement_fee, Some(usd(100)));
    }

    #[test]
    fn reminders_stop_once_return_is_submitted() {
        let mut b = paid_booking(0);
        awaiting_return(&mut b);
        assert!(!b.reminders_stopped());

        let _ = b
            .submit_return(return_flow::Method::LocalDropOff, None)
            .unwrap();

        assert!(b.reminders_stopped());
    }

    #[test]
    fn fees_total_floors_at_zero() {
        let fees =
            Fees::new(usd(10), usd(2), usd(3), Some(usd(100))).unwrap();
        assert_eq!(fees.total, Money::zero(Currency::Usd));

        let fees = Fees::new(usd(80), usd(10), usd(10), Some(usd(5))).unwrap();
        assert_eq!(fees.total, usd(95));
    }
}
