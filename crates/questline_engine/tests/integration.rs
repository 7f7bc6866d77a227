//! Integration tests for the quest engine.

use futures::FutureExt;
use questline_core::{MemoryStore, QuestFailure, RecordStore};
use questline_engine::{
    BindConfig, Binding, EngineConfig, Fetch, QuestEngine, QuestState, Resolver, Step,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Posts = Vec<String>;

fn posts_engine() -> (Arc<MemoryStore<Posts>>, QuestEngine<Posts, MemoryStore<Posts>>) {
    let store = Arc::new(MemoryStore::new());
    let engine = QuestEngine::with_store(EngineConfig::default(), Arc::clone(&store));
    (store, engine)
}

fn posts_resolver() -> Resolver<Posts> {
    Resolver::builder("posts")
        .get(|_| {
            Fetch::Single(
                async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(vec!["a".to_string(), "b".to_string()])
                }
                .boxed(),
            )
        })
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn fetch_lifecycle_end_to_end() {
    let (_, engine) = posts_engine();
    let resolver = posts_resolver();

    let handle = engine.start(&resolver, json!({}));

    // Immediately after the start: loading, no data yet.
    let record = engine.record("posts");
    assert!(record.loading);
    assert!(!record.completed);
    assert!(record.data.is_none());

    handle.await;

    let record = engine.record("posts");
    assert!(!record.loading);
    assert!(record.completed);
    assert!(record.error.is_none());
    assert_eq!(record.data, Some(vec!["a".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn failure_then_recovery_end_to_end() {
    let (_, engine) = posts_engine();

    engine
        .start_quest("posts", || {
            Fetch::Single(async { Err("network down".to_string()) }.boxed())
        })
        .await;

    let record = engine.record("posts");
    assert!(!record.loading);
    assert_eq!(record.error, Some(QuestFailure::fetch("network down")));
    assert!(record.data.is_none());

    // A subsequent successful fetch clears the error and sets data.
    engine
        .start_quest("posts", || {
            Fetch::Single(async { Ok(vec!["a".to_string()]) }.boxed())
        })
        .await;

    let record = engine.record("posts");
    assert!(record.error.is_none());
    assert!(record.completed);
    assert_eq!(record.data, Some(vec!["a".to_string()]));
}

#[tokio::test]
async fn concurrent_mounts_share_one_fetch() {
    let (_, engine) = posts_engine();
    let fetches = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let counted = Arc::clone(&fetches);
    let first = engine.start_quest("posts", move || {
        counted.fetch_add(1, Ordering::SeqCst);
        Fetch::Single(
            async move {
                let _ = rx.await;
                Ok(vec!["a".to_string()])
            }
            .boxed(),
        )
    });

    let counted = Arc::clone(&fetches);
    let second = engine.start_quest("posts", move || {
        counted.fetch_add(1, Ordering::SeqCst);
        Fetch::Single(async { Ok(vec!["b".to_string()]) }.boxed())
    });

    tx.send(()).unwrap();
    first.await;
    second.await;

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(engine.record("posts").data, Some(vec!["a".to_string()]));
}

#[tokio::test(start_paused = true)]
async fn server_render_pass_awaits_pending_quests() {
    let (_, engine) = posts_engine();
    let resolver = posts_resolver();

    engine.start(&resolver, json!({}));

    // The render pass peeks instead of starting anything new, then
    // awaits the pending settlement before producing final output.
    let pending = engine.pending("posts").expect("fetch in flight");
    pending.await;

    assert!(engine.pending("posts").is_none());
    assert_eq!(
        engine.record("posts").data,
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[tokio::test]
async fn optimistic_mutation_confirmed_end_to_end() {
    let (_, engine) = posts_engine();
    engine.resolve_quest("posts", vec!["a".to_string()]);

    let confirm = Arc::new(tokio::sync::Notify::new());
    let confirm_gate = Arc::clone(&confirm);
    let resolver = Resolver::<Posts>::builder("posts")
        .get(|_| Fetch::Single(async { Ok(vec![]) }.boxed()))
        .mutation("append", move |query| {
            let gate = Arc::clone(&confirm_gate);
            let item = query["item"].as_str().unwrap_or_default().to_string();
            let optimistic = vec!["a".to_string(), item];
            let confirmed = optimistic.clone();
            Fetch::Sequence(vec![
                async move { Ok(optimistic) }.boxed(),
                async move {
                    gate.notified().await;
                    Ok(confirmed)
                }
                .boxed(),
            ])
        })
        .build()
        .unwrap();

    let handle = engine
        .call(&resolver, "append", json!({ "item": "b" }))
        .unwrap();

    // The optimistic step lands while the confirmation is still gated.
    let expected = vec!["a".to_string(), "b".to_string()];
    for _ in 0..100 {
        if engine.record("posts").data.as_ref() == Some(&expected) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.record("posts").data, Some(expected.clone()));

    confirm.notify_one();
    handle.await;
    let record = engine.record("posts");
    assert_eq!(record.data, Some(expected));
    assert!(record.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn optimistic_mutation_rolls_back_end_to_end() {
    let (_, engine) = posts_engine();
    engine.resolve_quest("posts", vec!["a".to_string()]);

    engine
        .start_quest("posts", || {
            Fetch::Sequence(vec![
                async { Ok(vec!["a".to_string(), "b".to_string()]) }.boxed(),
                async {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    Err("rejected by server".to_string())
                }
                .boxed(),
            ])
        })
        .await;

    // Atomic rollback: the optimistic append is gone, the rejection
    // reason is the record's error.
    let record = engine.record("posts");
    assert_eq!(record.data, Some(vec!["a".to_string()]));
    assert_eq!(
        record.error,
        Some(QuestFailure::sequence(1, "rejected by server"))
    );
}

#[tokio::test]
async fn thunk_increments_are_atomic_per_turn() {
    let store = Arc::new(MemoryStore::<u32>::new());
    let engine = QuestEngine::with_store(EngineConfig::default(), Arc::clone(&store));
    engine.resolve_quest("counter", 10);

    engine
        .start_quest("counter", || {
            Fetch::Thunk(Box::new(|ctx| {
                let next = ctx.current().unwrap_or(0) + 1;
                ctx.commit(next);
                Step::Single(async move { Ok(next) }.boxed())
            }))
        })
        .await;

    assert_eq!(store.data("counter"), Some(11));
}

#[tokio::test]
async fn direct_resolution_beats_stale_fetch() {
    let (_, engine) = posts_engine();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = engine.start_quest("posts", move || {
        Fetch::Single(
            async move {
                let _ = rx.await;
                Ok(vec!["stale".to_string()])
            }
            .boxed(),
        )
    });

    engine.resolve_quest("posts", vec!["fresh".to_string()]);
    tx.send(()).unwrap();
    handle.await;

    assert_eq!(engine.record("posts").data, Some(vec!["fresh".to_string()]));
    assert_eq!(engine.stats().stale_dropped, 1);
}

#[tokio::test]
async fn bound_component_lifecycle() {
    let (store, engine) = posts_engine();
    let engine = Arc::new(engine);
    let rx = store.subscribe();

    let binding = Binding::new(
        Arc::clone(&engine),
        Resolver::builder("posts")
            .get(|query| {
                let page = query["page"].as_u64().unwrap_or(1);
                Fetch::Single(async move { Ok(vec![format!("page-{page}")]) }.boxed())
            })
            .build()
            .unwrap(),
        BindConfig::new().with_refetch_when(|prev, next| prev["page"] != next["page"]),
    );

    // Mount fetches eagerly; the subscriber sees start then success.
    binding.mount(json!({ "page": 1 })).unwrap().await;
    assert!(rx.recv().unwrap().record.loading);
    assert_eq!(
        rx.recv().unwrap().record.data,
        Some(vec!["page-1".to_string()])
    );

    // An irrelevant prop change does not refetch.
    assert!(binding
        .on_update(&json!({ "page": 1 }), &json!({ "page": 1, "theme": "dark" }))
        .is_none());

    // A page change does.
    binding
        .on_update(&json!({ "page": 1 }), &json!({ "page": 2 }))
        .unwrap()
        .await;
    assert_eq!(
        binding.props().record.data,
        Some(vec!["page-2".to_string()])
    );
    assert_eq!(engine.quest_state("posts"), QuestState::SettledSuccess);
}
