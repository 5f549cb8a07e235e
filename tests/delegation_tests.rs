// Reviewer delegation tests: windows, backups, bulk reassignment and vacation cover

mod fixtures;

use chrono::Duration;
use fixtures::world;
use product_workflow::{
    bulk_trail_key, Actor, AuditAction, Availability, BulkSummary, Clock, DelegationWindow,
    UserRole, VacationDelegation, WorkflowState,
};

#[tokio::test]
async fn window_boundaries_are_half_open_and_fall_back_to_backup() {
    let world = world();
    let delegation = world.coordinator.delegation();
    let start = world.clock.now();
    let end = start + Duration::days(7);

    delegation.set_backup("r1", "b1").await.unwrap();
    delegation
        .set_window("r1", DelegationWindow::new("d1", start, end).with_note("holiday"))
        .await
        .unwrap();

    assert_eq!(
        delegation
            .active_delegate("r1", start - Duration::seconds(1))
            .await
            .as_deref(),
        Some("b1")
    );
    assert_eq!(delegation.active_delegate("r1", start).await.as_deref(), Some("d1"));
    assert_eq!(
        delegation
            .active_delegate("r1", end - Duration::seconds(1))
            .await
            .as_deref(),
        Some("d1")
    );
    assert_eq!(delegation.active_delegate("r1", end).await.as_deref(), Some("b1"));
    assert_eq!(delegation.active_delegate("r2", start).await, None);
}

#[tokio::test]
async fn bulk_reassign_with_one_save_failure() {
    let world = world();
    for id in ["p1", "p2", "p3"] {
        world.seed(id, WorkflowState::Review, Some("r1")).await;
    }
    world.seed("p4", WorkflowState::Review, Some("r9")).await;
    world.store.fail_saves_for("p2").await;

    let result = world
        .coordinator
        .delegation()
        .bulk_reassign("r1", "r2", &Actor::new("lead", UserRole::Admin), None)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.updated_count, 2);
    assert_eq!(result.failed_ids(), vec!["p2"]);

    let audit = world.coordinator.engine().audit();
    let mut assignments = 0;
    for id in ["p1", "p2", "p3", "p4"] {
        assignments += audit
            .get_by_action(id, AuditAction::ReviewerAssignment)
            .await
            .unwrap()
            .len();
    }
    assert_eq!(assignments, 2);

    let summary = audit.get(&bulk_trail_key(&result.batch_id)).await.unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].action, AuditAction::BulkOperation);
    let parsed = BulkSummary::from_entry(&summary[0]).unwrap();
    assert_eq!(parsed.operation, "bulk_reassign");
    assert_eq!(parsed.target, "r2");
    assert_eq!(parsed.succeeded, vec!["p1", "p3"]);
    assert_eq!(parsed.failed, vec!["p2"]);

    let engine = world.coordinator.engine();
    assert_eq!(
        engine.load("p1").await.unwrap().assigned_reviewer.as_deref(),
        Some("r2")
    );
    assert_eq!(
        engine.load("p2").await.unwrap().assigned_reviewer.as_deref(),
        Some("r1")
    );
    assert_eq!(
        engine.load("p4").await.unwrap().assigned_reviewer.as_deref(),
        Some("r9")
    );
}

#[tokio::test]
async fn reassigning_to_self_is_rejected() {
    let world = world();

    let err = world
        .coordinator
        .delegation()
        .bulk_reassign("r1", "r1", &Actor::new("lead", UserRole::Admin), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_BACKUP_REVIEWER");
}

#[tokio::test]
async fn vacation_hands_work_to_window_delegate() {
    let world = world();
    world.seed("p1", WorkflowState::Review, Some("r1")).await;
    world.seed("p2", WorkflowState::Review, Some("r1")).await;
    world.availability.set("r1", Availability::OnVacation).await;
    let now = world.clock.now();
    let delegation = world.coordinator.delegation();
    delegation.set_backup("r1", "b1").await.unwrap();
    delegation
        .set_window("r1", DelegationWindow::new("d1", now, now + Duration::days(3)))
        .await
        .unwrap();

    let outcome = delegation
        .delegate_during_vacation("r1", &Actor::new("lead", UserRole::Admin), now, None)
        .await
        .unwrap();

    match &outcome {
        VacationDelegation::Reassigned {
            delegate_id,
            availability,
            result,
        } => {
            assert_eq!(delegate_id, "d1");
            assert_eq!(*availability, Availability::OnVacation);
            assert!(result.success);
        }
        other => panic!("expected reassignment, got {other:?}"),
    }
    assert_eq!(outcome.reassigned_count(), 2);

    let trail = world
        .coordinator
        .engine()
        .audit()
        .get_by_action("p1", AuditAction::ReviewerAssignment)
        .await
        .unwrap();
    assert_eq!(
        trail[0].reason.as_ref().map(|reason| reason.kind),
        Some(product_workflow::ChangeReasonKind::VacationDelegation)
    );
}

#[tokio::test]
async fn overdue_reviews_use_configured_threshold() {
    let mut config = product_workflow::WorkflowConfig::default();
    config.delegation.overdue_review_threshold_hours = 24;
    let world = fixtures::world_with_config(config);
    world.seed("p1", WorkflowState::Review, Some("r1")).await;
    world.seed("p2", WorkflowState::Draft, Some("r1")).await;

    world.clock.advance(Duration::hours(25));
    let overdue = world
        .coordinator
        .delegation()
        .overdue_reviews(world.clock.now())
        .await
        .unwrap();

    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].product_id, "p1");
    assert_eq!(overdue[0].acting_reviewer.as_deref(), Some("r1"));
}
