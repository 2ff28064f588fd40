//! Engine-wide invariants over randomly generated scripts.
//!
//! After every instruction:
//! - the wait-for graph is acyclic
//! - every tentative value belongs to a registered exclusive holder
//! - a transaction that just committed left all UP copies of its writes equal
//! - a transaction that just aborted left no lock, edge or parked instruction

use crate::common::*;
use proptest::prelude::*;
use repcrec::{Operation, OperationKind};

fn instruction() -> impl Strategy<Value = OperationKind> {
    let txn = (1u32..5).prop_map(TxnId);
    let var = (1u32..9).prop_map(VarId);
    let site = (1u32..5).prop_map(SiteId);
    prop_oneof![
        4 => (txn.clone(), var.clone()).prop_map(|(txn, var)| OperationKind::Read { txn, var }),
        4 => (txn.clone(), var, 0i64..100)
            .prop_map(|(txn, var, value)| OperationKind::Write { txn, var, value }),
        1 => txn.prop_map(|txn| OperationKind::End { txn }),
        1 => site.clone().prop_map(|site| OperationKind::Fail { site }),
        1 => site.prop_map(|site| OperationKind::Recover { site }),
    ]
}

fn script(body: Vec<OperationKind>, read_only: bool) -> Vec<Operation> {
    let mut kinds = vec![
        OperationKind::Begin { txn: T1 },
        OperationKind::Begin { txn: T2 },
        OperationKind::Begin { txn: T3 },
        if read_only {
            OperationKind::BeginReadOnly { txn: T4 }
        } else {
            OperationKind::Begin { txn: T4 }
        },
    ];
    kinds.extend(body);
    kinds.extend([T1, T2, T3, T4].map(|txn| OperationKind::End { txn }));
    kinds.extend((1..5).map(|s| OperationKind::Recover { site: SiteId(s) }));
    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Operation::new(kind, i as u64 + 1))
        .collect()
}

fn check_step(c: &Coordinator, events: &[EngineEvent]) {
    assert!(c.wait_for().find_cycle().is_none());
    assert_tentative_values_owned(c);
    for event in events {
        match event {
            EngineEvent::Committed { txn } => {
                let record = c.transactions().get(*txn).expect("committed record kept");
                for var in &record.affected_variables {
                    assert_converged(c, *var);
                }
            }
            EngineEvent::Aborted { txn, .. } => assert_no_trace(c, *txn),
            _ => {}
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn invariants_hold_after_every_instruction(
        body in prop::collection::vec(instruction(), 0..40),
        read_only in any::<bool>(),
    ) {
        let mut c = Coordinator::default();
        c.enqueue(script(body, read_only));
        // Every step either consumes an instruction or requeues parked ones;
        // the bound guards against livelock
        for _ in 0..10_000 {
            let mut events = Vec::new();
            if !c.step(&mut events) {
                break;
            }
            check_step(&c, &events);
        }
        prop_assert_eq!(c.queued(), 0);
    }

    #[test]
    fn abort_and_commit_are_final(body in prop::collection::vec(instruction(), 0..40)) {
        let mut c = Coordinator::default();
        let events = c.execute(script(body, false));
        for txn in [T1, T2, T3, T4] {
            let status = c.status(txn);
            prop_assert!(status.is_some());
            if commits(&events).contains(&txn) {
                prop_assert_eq!(status, Some(TransactionStatus::Committed));
                prop_assert!(!aborts(&events).contains(&txn));
            }
        }
    }
}
