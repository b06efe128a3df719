//! Property and concurrency tests for the conversation store
//!
//! Whatever order conversations are opened and closed in, a customer never
//! has more than one open conversation.

use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use proptest::prelude::*;

use wagate::store::{ConversationStore, Sender, TurnType};
use wagate::GatewayError;

#[derive(Debug, Clone, Copy)]
enum Op {
    Create,
    GetOrCreate,
    End,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Create), Just(Op::GetOrCreate), Just(Op::End)]
}

const CUSTOMERS: [&str; 3] = ["601", "602", "603"];

fn open_count(store: &ConversationStore, customer: &str) -> usize {
    store
        .list_conversations(customer)
        .unwrap()
        .iter()
        .filter(|c| c.is_open())
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn at_most_one_open_conversation(ops in prop::collection::vec((0usize..3, op()), 1..40)) {
        let store = ConversationStore::in_memory().unwrap();
        // customer -> (open id, last closed id)
        let mut model: HashMap<&str, (Option<i64>, Option<i64>)> = HashMap::new();

        for (step, (who, op)) in ops.into_iter().enumerate() {
            let customer = CUSTOMERS[who];
            let now = step as i64;
            let entry = model.entry(customer).or_default();

            match op {
                Op::Create => match store.create_conversation(customer, now) {
                    Ok(conv) => {
                        prop_assert!(entry.0.is_none());
                        entry.0 = Some(conv.id);
                    }
                    Err(GatewayError::ConstraintViolation(_)) => prop_assert!(entry.0.is_some()),
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                },
                Op::GetOrCreate => {
                    let (conv, created) = store.get_or_create_conversation(customer, now).unwrap();
                    prop_assert_eq!(created, entry.0.is_none());
                    if let Some(open) = entry.0 {
                        prop_assert_eq!(conv.id, open);
                    }
                    entry.0 = Some(conv.id);
                }
                Op::End => match (entry.0.take(), entry.1) {
                    (Some(open), _) => {
                        store.end_conversation(open, now, None).unwrap();
                        entry.1 = Some(open);
                    }
                    (None, Some(closed)) => {
                        let err = store.end_conversation(closed, now, None).unwrap_err();
                        prop_assert!(matches!(err, GatewayError::NotFound(_)));
                    }
                    (None, None) => {}
                },
            }

            for customer in CUSTOMERS {
                prop_assert!(open_count(&store, customer) <= 1);
            }
            let active = store.get_active_conversation(customer).unwrap().map(|c| c.id);
            prop_assert_eq!(active, model[customer].0);
        }
    }
}

#[test]
fn concurrent_get_or_create_yields_one_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::open(dir.path().join("wagate.db")).unwrap();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let (conv, created) = store.get_or_create_conversation("601", i as i64).unwrap();
                store
                    .append_agent_turn(conv.id, Sender::Customer, TurnType::Text, &format!("msg {i}"))
                    .unwrap();
                (conv.id, created)
            })
        })
        .collect();

    let results: Vec<(i64, bool)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = results[0].0;
    assert!(results.iter().all(|(id, _)| *id == first));
    assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);

    assert_eq!(open_count(&store, "601"), 1);
    assert_eq!(store.list_agent_turns(first).unwrap().len(), threads);
}

#[test]
fn reopened_store_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("wagate.db");

    let id = {
        let store = ConversationStore::open(&path).unwrap();
        let conv = store.create_conversation("601", 10).unwrap();
        store
            .append_chat_turn(conv.id, Sender::Customer, 10, "hello")
            .unwrap();
        store.end_conversation(conv.id, 20, Some("greeting")).unwrap();
        conv.id
    };

    let store = ConversationStore::open(&path).unwrap();
    let conv = store.get_conversation(id).unwrap().unwrap();
    assert_eq!(conv.end_time, Some(20));
    assert_eq!(conv.intent.as_deref(), Some("greeting"));
    assert_eq!(store.list_chat_turns(id).unwrap()[0].message, "hello");
    assert!(store.get_active_conversation("601").unwrap().is_none());
}
