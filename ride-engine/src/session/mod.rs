//! Search sessions: the orchestration layer tying the matcher, the polling
//! loop, and push notifications together around one trip request.

mod event;
mod poll;
mod reconciler;
#[allow(clippy::module_inception)]
mod session;

pub use event::{AssignmentEvent, AssignmentSource, SessionId};
pub use reconciler::{AssignmentReconciler, Resolution};
pub use session::{SearchSession, SessionError, SessionOutcome, SessionStatus};
