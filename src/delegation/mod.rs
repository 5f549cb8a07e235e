// Reviewer delegation: backups, vacation windows and reassignment

pub mod availability;
pub mod resolver;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub use availability::MockReviewerAvailability;
pub use availability::{Availability, ReviewerAvailability, StaticAvailability};
pub use resolver::DelegationResolver;
pub use types::{DelegationError, DelegationWindow, OverdueReview, VacationDelegation};
