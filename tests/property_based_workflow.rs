// Property-Based Testing for workflow invariants
// History and bulk accounting must hold for arbitrary transition sequences

mod fixtures;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use product_workflow::WorkflowState;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Target {
    Draft,
    Review,
    Approved,
    Published,
    Rejected,
    Synced,
}

impl From<Target> for WorkflowState {
    fn from(target: Target) -> Self {
        match target {
            Target::Draft => WorkflowState::Draft,
            Target::Review => WorkflowState::Review,
            Target::Approved => WorkflowState::Approved,
            Target::Published => WorkflowState::Published,
            Target::Rejected => WorkflowState::Rejected,
            Target::Synced => WorkflowState::Synced,
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct BulkRequest {
    #[proptest(strategy = "prop::collection::vec(any::<bool>(), 0..12)")]
    present: Vec<bool>,
}

#[cfg(test)]
mod property_tests {
    use super::*;

    #[test]
    fn prop_history_grows_by_one_per_transition() {
        let mut runner = proptest::test_runner::TestRunner::default();

        runner
            .run(
                &prop::collection::vec(any::<Target>(), 1..15),
                |targets| {
                    let rt = tokio::runtime::Runtime::new().unwrap();
                    rt.block_on(async {
                        let world = fixtures::world();
                        world.seed("p1", WorkflowState::Draft, None).await;
                        let engine = world.coordinator.engine();

                        for (n, target) in targets.into_iter().enumerate() {
                            world.clock.advance(chrono::Duration::seconds(1));
                            let state = WorkflowState::from(target);
                            let outcome = engine
                                .transition("p1", state, "alice", None)
                                .await
                                .map_err(|e| {
                                    proptest::test_runner::TestCaseError::fail(e.to_string())
                                })?;

                            let product = engine.load("p1").await.unwrap();
                            prop_assert_eq!(outcome.history_len, n + 2);
                            prop_assert_eq!(product.history.len(), n + 2);
                            prop_assert_eq!(product.current_state, state);
                            prop_assert!(product.history_is_consistent());
                        }
                        Ok(())
                    })
                },
            )
            .unwrap();
    }

    #[test]
    fn prop_bulk_counts_match_input() {
        let mut runner = proptest::test_runner::TestRunner::default();

        runner
            .run(&any::<BulkRequest>(), |request| {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let world = fixtures::world();
                    let mut ids = Vec::new();
                    let mut missing = 0;
                    for (n, present) in request.present.iter().enumerate() {
                        let id = format!("p{n}");
                        if *present {
                            world.seed(&id, WorkflowState::Review, None).await;
                        } else {
                            missing += 1;
                        }
                        ids.push(id);
                    }

                    let result = world
                        .coordinator
                        .bulk()
                        .bulk_transition(&ids, WorkflowState::Approved, "lead", None)
                        .await;

                    prop_assert_eq!(result.updated_count, ids.len() - missing);
                    prop_assert_eq!(result.failed_updates.len(), missing);
                    prop_assert_eq!(result.success, missing == 0);
                    Ok(())
                })
            })
            .unwrap();
    }
}
