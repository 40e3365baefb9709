//! Background [`Task`]s definitions.

mod background;
pub mod escalate_overdue_returns;
pub mod send_return_reminders;

pub use common::Handler as Task;

pub use self::{
    background::Background, escalate_overdue_returns::EscalateOverdueReturns,
    send_return_reminders::SendReturnReminders,
};
