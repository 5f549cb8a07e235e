// Concurrent editing lock tests
// Exercises acquisition, denial, timeouts and the background sweep through the public API

use chrono::Duration;
use product_workflow::{
    AcquireOutcome, AcquireRequest, DenialReason, LockManager, LockType, ManualClock,
    SessionInvalidReason, SessionValidation, UserRole, WorkflowConfig, WorkflowState,
};
use std::sync::Arc;

fn manager_with(config: WorkflowConfig) -> (LockManager, ManualClock) {
    let clock = ManualClock::default();
    (
        LockManager::new(config.locking, Arc::new(clock.clone())),
        clock,
    )
}

fn manager() -> (LockManager, ManualClock) {
    manager_with(WorkflowConfig::default())
}

fn granted_id(outcome: &AcquireOutcome) -> String {
    outcome
        .session_id()
        .map(str::to_string)
        .expect("acquisition should be granted")
}

#[tokio::test]
async fn conflicting_editor_is_denied_naming_holder_and_admin_bypasses() {
    let (locks, _clock) = manager();

    let a = locks
        .acquire(AcquireRequest::new("p1", "alice", UserRole::Editor, WorkflowState::Draft))
        .await;
    assert!(a.is_granted());

    let b = locks
        .acquire(AcquireRequest::new("p1", "bob", UserRole::Editor, WorkflowState::Draft))
        .await;
    let denial = b.denial().expect("bob must be denied");
    assert_eq!(denial.reason, DenialReason::SessionConflict);
    assert_eq!(denial.conflicting_user(), Some("alice"));
    assert!(denial.message.contains("alice"));

    let admin = locks
        .acquire(AcquireRequest::new("p1", "root", UserRole::Admin, WorkflowState::Draft))
        .await;
    assert!(matches!(
        admin,
        AcquireOutcome::Granted {
            lock_type: LockType::Admin,
            renewed: false,
            ..
        }
    ));
    assert_eq!(locks.stats().denied, 1);
}

#[tokio::test]
async fn review_lock_holds_for_two_hours_without_release() {
    let (locks, clock) = manager();

    let r1 = locks
        .acquire(AcquireRequest::new("p1", "r1", UserRole::Reviewer, WorkflowState::Review))
        .await;
    assert!(matches!(
        r1,
        AcquireOutcome::Granted {
            lock_type: LockType::Review,
            ..
        }
    ));

    // r1 goes idle; the hard lock still keeps r2 out
    clock.advance(Duration::minutes(45));
    let r2 = locks
        .acquire(AcquireRequest::new("p1", "r2", UserRole::Reviewer, WorkflowState::Review))
        .await;
    let denial = r2.denial().expect("r2 must be denied while the lock is live");
    assert_eq!(denial.reason, DenialReason::LockedByOther);
    assert_eq!(denial.conflicting_user(), Some("r1"));
    assert!(denial.conflicting_lock.is_some());

    clock.advance(Duration::minutes(75));
    let r2 = locks
        .acquire(AcquireRequest::new("p1", "r2", UserRole::Reviewer, WorkflowState::Review))
        .await;
    assert!(r2.is_granted());
    assert_eq!(
        locks.lock_for_product("p1").await.map(|lock| lock.locked_by),
        Some("r2".to_string())
    );
}

#[tokio::test]
async fn renewal_resets_idle_clock() {
    let (locks, clock) = manager();
    let session_id = granted_id(
        &locks
            .acquire(AcquireRequest::new("p1", "alice", UserRole::Editor, WorkflowState::Draft))
            .await,
    );

    clock.advance(Duration::minutes(29));
    assert!(locks.renew(&session_id).await);
    clock.advance(Duration::minutes(29));

    assert_eq!(
        locks.validate(&session_id, "alice").await,
        SessionValidation::Valid { should_renew: true }
    );

    clock.advance(Duration::minutes(2));
    assert_eq!(
        locks.validate(&session_id, "alice").await,
        SessionValidation::Invalid {
            reason: SessionInvalidReason::IdleTimeout
        }
    );
}

#[tokio::test]
async fn idle_holder_no_longer_blocks_other_editors() {
    let (locks, clock) = manager();
    locks
        .acquire(AcquireRequest::new("p1", "alice", UserRole::Editor, WorkflowState::Draft))
        .await;

    clock.advance(Duration::minutes(31));

    let bob = locks
        .acquire(AcquireRequest::new("p1", "bob", UserRole::Editor, WorkflowState::Draft))
        .await;
    assert!(bob.is_granted());
    assert_eq!(locks.sessions_for_product("p1").await.len(), 1);
}

#[tokio::test]
async fn release_is_refused_for_other_users() {
    let (locks, _clock) = manager();
    let session_id = granted_id(
        &locks
            .acquire(AcquireRequest::new("p1", "alice", UserRole::Editor, WorkflowState::Draft))
            .await,
    );

    assert!(!locks.release(&session_id, "bob").await);
    assert!(locks.release(&session_id, "alice").await);
    assert_eq!(
        locks.validate(&session_id, "alice").await,
        SessionValidation::Invalid {
            reason: SessionInvalidReason::Inactive
        }
    );
}

#[tokio::test(start_paused = true)]
async fn background_sweep_removes_idle_sessions() {
    let mut config = WorkflowConfig::default();
    config.locking.cleanup_interval_seconds = 60;
    let (locks, clock) = manager_with(config);

    let session_id = granted_id(
        &locks
            .acquire(AcquireRequest::new("p1", "alice", UserRole::Editor, WorkflowState::Draft))
            .await,
    );
    clock.advance(Duration::minutes(31));

    locks.start().await;
    locks.start().await;
    assert!(locks.is_running().await);

    for _ in 0..10 {
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        if locks.session(&session_id).await.is_none() {
            break;
        }
    }

    assert!(locks.session(&session_id).await.is_none());
    assert_eq!(locks.stats().sessions_expired, 1);

    locks.stop().await;
    assert!(!locks.is_running().await);
}

#[tokio::test]
async fn stop_without_start_is_harmless() {
    let (locks, _clock) = manager();
    locks.stop().await;

    assert!(!locks.is_running().await);
    assert!(locks.sweep().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquisitions_grant_exactly_one_editor() {
    let (locks, _clock) = manager();
    let locks = Arc::new(locks);

    let attempts = (0..16).map(|n| {
        let locks = Arc::clone(&locks);
        tokio::spawn(async move {
            locks
                .acquire(AcquireRequest::new(
                    "p1",
                    format!("user{n}"),
                    UserRole::Editor,
                    WorkflowState::Draft,
                ))
                .await
        })
    });
    let outcomes = futures::future::join_all(attempts).await;

    let granted = outcomes
        .into_iter()
        .map(|joined| joined.expect("acquire task panicked"))
        .filter(AcquireOutcome::is_granted)
        .count();
    assert_eq!(granted, 1);
    assert_eq!(locks.stats().denied, 15);
}
