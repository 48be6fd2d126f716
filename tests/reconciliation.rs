//! Write-through reset and sibling reconciliation tests.

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use subset_collections::{
    CollectionError, CollectionEvent, Document, Model, ModelId, ModelKey, MutationOptions,
    ObservableCollection, Origin, SubsetCollection, Validator,
};

fn item(id: u64, group: &str) -> Document {
    Document::from_value(json!({"id": id, "group": group})).unwrap()
}

fn key(id: u64) -> ModelKey {
    ModelKey::Id(ModelId::from(id))
}

fn numeric_id(d: &Document) -> u64 {
    d.id().and_then(|id| id.as_str().parse().ok()).unwrap_or(0)
}

fn in_group(group: &'static str) -> impl Fn(&Document) -> bool + Send + Sync + 'static {
    move |d: &Document| d.get("group") == Some(json!(group))
}

fn sorted_ids(models: &[Document]) -> Vec<u64> {
    let mut ids: Vec<u64> = models.iter().map(numeric_id).collect();
    ids.sort();
    ids
}

/// Count the resets a subset announces.
fn reset_counter(subset: &SubsetCollection<Document>) -> Arc<Mutex<usize>> {
    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    subset.subscribe(move |event: &CollectionEvent<Document>| {
        if let CollectionEvent::Reset { .. } = event {
            *sink.lock() += 1;
        }
    });
    count
}

struct Board {
    parent: ObservableCollection<Document>,
    alpha: SubsetCollection<Document>,
    beta: SubsetCollection<Document>,
    tail: SubsetCollection<Document>,
}

/// Parent holding group "a" {1, 3}, group "b" {10}, group "c" {11}.
/// `tail` overlaps with `alpha`: it holds every id >= 3.
fn board() -> Board {
    let parent = ObservableCollection::from_models(vec![
        item(1, "a"),
        item(3, "a"),
        item(10, "b"),
        item(11, "c"),
    ])
    .unwrap();

    let alpha = SubsetCollection::builder(&parent, in_group("a")).build().unwrap();
    let beta = SubsetCollection::builder(&parent, in_group("b")).build().unwrap();
    let tail = SubsetCollection::builder(&parent, |d: &Document| numeric_id(d) >= 3)
        .build()
        .unwrap();

    Board {
        parent,
        alpha,
        beta,
        tail,
    }
}

#[test]
fn test_reset_replaces_only_the_subset_band() {
    let Board {
        parent,
        alpha,
        beta,
        tail,
    } = board();
    assert_eq!(sorted_ids(&tail.models()), vec![3, 10, 11]);

    let parent_events = parent.subscribe_channel(16);
    let alpha_resets = reset_counter(&alpha);
    let beta_resets = reset_counter(&beta);
    let tail_resets = reset_counter(&tail);

    let m1 = item(1, "a");
    let m2 = item(2, "a");
    alpha
        .reset(vec![m1.clone(), m2.clone()], MutationOptions::default())
        .unwrap();

    // Parent: untouched non-alpha models plus the new band
    assert_eq!(sorted_ids(&parent.models()), vec![1, 2, 10, 11]);
    assert!(parent.models().contains(&m1));
    assert_eq!(sorted_ids(&alpha.models()), vec![1, 2]);

    // One notification on the parent, naming alpha, the xor of the bands and
    // the key now backed by a new instance
    let events = parent_events.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        CollectionEvent::Reset {
            origin,
            model_ids,
            proxied,
            silent,
        } => {
            assert_eq!(*origin, Origin::Collection(alpha.id()));
            assert_eq!(model_ids.as_deref(), Some(&[key(3), key(2), key(1)][..]));
            assert!(!*proxied);
            assert!(!*silent);
        }
        other => panic!("Expected Reset event, got {:?}", other),
    }

    // Alpha always resyncs; beta was not concerned; tail held 3 and resynced
    assert_eq!(*alpha_resets.lock(), 1);
    assert_eq!(*beta_resets.lock(), 0);
    assert_eq!(*tail_resets.lock(), 1);
    assert_eq!(sorted_ids(&tail.models()), vec![10, 11]);
    assert_eq!(sorted_ids(&beta.models()), vec![10]);
}

#[test]
fn test_sibling_picks_up_new_models_it_accepts() {
    let Board { alpha, tail, .. } = board();

    alpha
        .reset(vec![item(3, "a"), item(7, "a")], MutationOptions::default())
        .unwrap();

    assert_eq!(sorted_ids(&alpha.models()), vec![3, 7]);
    assert_eq!(sorted_ids(&tail.models()), vec![3, 7, 10, 11]);
}

#[test]
fn test_swapped_instances_reach_siblings() {
    let Board { parent, alpha, tail, .. } = board();
    let parent_events = parent.subscribe_channel(16);

    let fresh = item(3, "a");
    fresh.set("note", json!("replacement")).unwrap();
    let original_one = alpha.get(&key(1)).unwrap();
    alpha
        .reset(vec![original_one, fresh.clone()], MutationOptions::default())
        .unwrap();

    // Only 3 changed instance; 1 was handed back as-is
    match parent_events.drain().as_slice() {
        [CollectionEvent::Reset { model_ids, .. }] => {
            assert_eq!(model_ids.as_deref(), Some(&[key(3)][..]))
        }
        other => panic!("Expected one Reset event, got {:?}", other),
    }

    assert_eq!(alpha.get(&key(3)), Some(fresh.clone()));
    assert_eq!(tail.get(&key(3)), Some(fresh));
    assert_eq!(
        tail.get(&key(3)).unwrap().get("note"),
        Some(json!("replacement"))
    );
}

#[test]
fn test_reset_takes_over_keys_held_elsewhere() {
    let Board {
        parent,
        alpha,
        beta,
        tail,
    } = board();

    // 10 belongs to beta and 11 to no sibling sieve but tail's
    alpha
        .reset(vec![item(10, "a"), item(11, "a")], MutationOptions::default())
        .unwrap();

    assert_eq!(sorted_ids(&parent.models()), vec![10, 11]);
    assert_eq!(parent.get(&key(10)).unwrap().get("group"), Some(json!("a")));
    assert_eq!(parent.get(&key(11)).unwrap().get("group"), Some(json!("a")));
    assert_eq!(sorted_ids(&alpha.models()), vec![10, 11]);
    assert!(beta.is_empty());

    // Tail re-read both keys and holds the new instances
    let tail_groups: Vec<_> = tail.models().iter().map(|m| m.get("group")).collect();
    assert_eq!(tail_groups, vec![Some(json!("a")), Some(json!("a"))]);
}

#[test]
fn test_reset_replaces_model_its_sieve_rejected() {
    let parent = ObservableCollection::from_models(vec![item(2, "c")]).unwrap();
    let alpha = SubsetCollection::builder(&parent, in_group("a"))
        .build()
        .unwrap();
    assert!(alpha.is_empty());

    alpha
        .reset(vec![item(2, "a")], MutationOptions::default())
        .unwrap();

    assert_eq!(parent.len(), 1);
    assert_eq!(parent.get(&key(2)).unwrap().get("group"), Some(json!("a")));
    assert!(alpha.contains_key(&key(2)));
}

#[test]
fn test_silent_reset() {
    let Board {
        parent,
        alpha,
        tail,
        ..
    } = board();
    let parent_events = parent.subscribe_channel(16);
    let alpha_events = alpha.subscribe_channel(16);
    let tail_events = tail.subscribe_channel(16);

    alpha
        .reset(vec![item(5, "a")], MutationOptions::silent())
        .unwrap();

    assert_eq!(sorted_ids(&alpha.models()), vec![5]);
    assert_eq!(sorted_ids(&tail.models()), vec![5, 10, 11]);
    assert!(alpha_events.drain().is_empty());
    assert!(tail_events.drain().is_empty());

    // The parent still carries the protocol notification, flagged silent
    match parent_events.drain().as_slice() {
        [CollectionEvent::Reset { silent, .. }] => assert!(*silent),
        other => panic!("Expected one Reset event, got {:?}", other),
    }
}

#[test]
fn test_reset_to_empty() {
    let Board { parent, alpha, .. } = board();

    alpha.reset(vec![], MutationOptions::default()).unwrap();

    assert!(alpha.is_empty());
    assert_eq!(sorted_ids(&parent.models()), vec![10, 11]);
}

#[test]
fn test_unproxied_parent_reset_is_ignored() {
    let Board { parent, alpha, .. } = board();
    let alpha_resets = reset_counter(&alpha);

    parent
        .reset(vec![item(20, "a")], MutationOptions::unproxied())
        .unwrap();

    assert_eq!(*alpha_resets.lock(), 0);
    assert_eq!(sorted_ids(&alpha.models()), vec![1, 3]);
}

#[test]
fn test_full_parent_reset_resyncs_every_subset() {
    let Board {
        parent,
        alpha,
        beta,
        tail,
    } = board();
    let counters = [
        reset_counter(&alpha),
        reset_counter(&beta),
        reset_counter(&tail),
    ];

    parent
        .reset(vec![item(4, "b")], MutationOptions::default())
        .unwrap();

    for counter in &counters {
        assert_eq!(*counter.lock(), 1);
    }
    assert!(alpha.is_empty());
    assert_eq!(sorted_ids(&beta.models()), vec![4]);
    assert_eq!(sorted_ids(&tail.models()), vec![4]);
}

#[test]
fn test_targeted_reset_with_no_relevant_ids() {
    let Board { parent, beta, .. } = board();
    let beta_resets = reset_counter(&beta);

    // A hand-made notification naming ids beta neither holds nor accepts
    parent.trigger(CollectionEvent::Reset {
        origin: Origin::Direct,
        model_ids: Some(vec![key(1), key(99)]),
        proxied: false,
        silent: false,
    });
    assert_eq!(*beta_resets.lock(), 0);

    // Empty id lists are the same
    parent.trigger(CollectionEvent::Reset {
        origin: Origin::Direct,
        model_ids: Some(vec![]),
        proxied: false,
        silent: false,
    });
    assert_eq!(*beta_resets.lock(), 0);
}

#[test]
fn test_failed_reset_changes_nothing() {
    let Board {
        parent,
        alpha,
        tail,
        ..
    } = board();
    let parent_events = parent.subscribe_channel(16);

    let valid = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&valid);
    let validator: Validator = Arc::new(move |_: &Map<String, Value>| {
        if flag.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("rejected".to_string())
        }
    });
    let mut attrs = Map::new();
    attrs.insert("id".into(), json!(8));
    attrs.insert("group".into(), json!("a"));
    let strict = Document::with_validator(attrs, validator).unwrap();
    valid.store(false, Ordering::SeqCst);

    let result = alpha.reset(vec![item(2, "a"), strict], MutationOptions::default());
    assert!(matches!(result, Err(CollectionError::InvalidModel { .. })));

    assert_eq!(sorted_ids(&parent.models()), vec![1, 3, 10, 11]);
    assert_eq!(sorted_ids(&alpha.models()), vec![1, 3]);
    assert_eq!(sorted_ids(&tail.models()), vec![3, 10, 11]);
    assert!(parent_events.drain().is_empty());
}
