use herald::{EventType, Key, Listener, Priority, testing::OrderRecorder};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

mod common;
use common::{Chat, HIGH, LOW, Message, Ping, key, service};

#[test]
fn subscribe_returns_an_independent_record_each_time() {
    let service = service();
    let recorder = OrderRecorder::new();
    let listener = recorder.listener::<Ping>("dup");

    let first = service
        .subscribe_listener(key("dup"), listener.clone(), None)
        .unwrap();
    let second = service.subscribe_listener(key("dup"), listener, None).unwrap();

    assert!(!first.same_as(&second));
    assert_ne!(first, second);
    assert!(first.sequence() < second.sequence());
    assert_eq!(first.event_type(), EventType::of::<Ping>());
    assert_eq!(first.order(), &Priority::NORMAL);

    service.post(Ping { seq: 0 }).unwrap();
    assert_eq!(recorder.take(), vec!["dup", "dup"]);

    assert!(service.unsubscribe(&first));
    service.post(Ping { seq: 1 }).unwrap();
    assert_eq!(recorder.take(), vec!["dup"]);
}

#[test]
fn unsubscribe_is_idempotent() {
    let service = service();
    let record = service.subscribe(key("once"), |_: &Ping| Ok(())).unwrap();

    assert!(service.unsubscribe(&record));
    assert!(!service.unsubscribe(&record));
    assert!(service.all_listeners().is_empty());
    assert!(service.subscribers().is_empty());
}

#[test]
fn unsubscribe_by_key_spans_event_types() {
    let service = service();
    let recorder = OrderRecorder::new();
    let plugin = Key::namespaced("plugin", "audit").unwrap();
    service
        .subscribe_listener(plugin.clone(), recorder.listener::<Ping>("ping"), None)
        .unwrap();
    service
        .subscribe_listener(plugin.clone(), recorder.listener::<Message>("message"), None)
        .unwrap();
    service
        .subscribe_listener(key("core"), recorder.listener::<Ping>("core"), None)
        .unwrap();

    let removed = service.unsubscribe_by_key(&plugin);

    assert_eq!(removed.len(), 2);
    assert!(removed.iter().all(|record| record.key() == &plugin));
    assert!(service.unsubscribe_by_key(&plugin).is_empty());

    service.post(Ping { seq: 0 }).unwrap();
    service.post(Message::default()).unwrap();
    assert_eq!(recorder.order(), vec!["core"]);
}

#[test]
fn unsubscribe_if_removes_matching_records() {
    let service = service();
    let recorder = OrderRecorder::new();
    service
        .subscribe_listener(key("high"), recorder.listener::<Ping>("high"), HIGH)
        .unwrap();
    service
        .subscribe_listener(key("low-1"), recorder.listener::<Ping>("low-1"), LOW)
        .unwrap();
    service
        .subscribe_listener(key("low-2"), recorder.listener::<Chat>("low-2"), LOW)
        .unwrap();

    let removed = service.unsubscribe_if(|record| *record.order() < Priority::NORMAL);

    assert_eq!(removed.len(), 2);
    assert_eq!(service.all_listeners().len(), 1);
    service.post(Ping { seq: 0 }).unwrap();
    assert_eq!(recorder.order(), vec!["high"]);
}

#[test]
fn bulk_subscribe_then_unsubscribe_all_restores_the_registry() {
    let service = service();
    let recorder = OrderRecorder::new();
    let existing = service
        .subscribe_listener(key("existing"), recorder.listener::<Ping>("existing"), None)
        .unwrap();

    let bulk = service
        .bulk()
        .add_listener(key("a"), recorder.listener::<Ping>("a"), HIGH)
        .add_listener(key("b"), recorder.listener::<Message>("b"), None)
        .add_with(key("c"), Priority::LOW, |_: &Ping| Ok(()))
        .add(key("d"), |_: &Chat| Ok(()));
    assert_eq!(bulk.len(), 4);
    let records = bulk.subscribe().unwrap();

    assert_eq!(records.len(), 4);
    let keys: Vec<&str> = records.iter().map(|r| r.key().name()).collect();
    assert_eq!(keys, vec!["a", "b", "c", "d"]);
    assert_eq!(service.all_listeners().len(), 5);

    assert_eq!(service.unsubscribe_all(&records), 4);
    assert_eq!(service.unsubscribe_all(&records), 0);

    let remaining = service.all_listeners();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].same_as(&existing));
}

#[test]
fn typed_subscriber_works_on_one_channel() {
    let service = service();
    let chats = service.subscriber::<Chat>();
    assert_eq!(chats.event_type(), EventType::of::<Chat>());

    let recorder = OrderRecorder::new();
    chats
        .subscribe_listener(key("shared"), recorder.listener::<Chat>("chat"), None)
        .unwrap();
    service
        .subscribe_listener(key("shared"), recorder.listener::<Message>("message"), HIGH)
        .unwrap();

    assert_eq!(chats.listeners().len(), 2);
    chats.post(Chat::default()).unwrap();
    assert_eq!(recorder.take(), vec!["message", "chat"]);

    let removed = chats.unsubscribe_by_key(&key("shared"));
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].event_type(), EventType::of::<Chat>());
    assert_eq!(service.all_listeners().len(), 1);
}

#[test]
fn subscriptions_made_during_a_post_apply_to_the_next_one() {
    let service = service();
    let recorder = OrderRecorder::new();
    let added = Arc::new(Mutex::new(false));

    let inner = service.clone();
    let late = recorder.clone();
    let flag = added.clone();
    service
        .subscribe_listener(
            key("spawner"),
            Listener::new(move |_: &Ping| {
                let mut added = flag.lock().unwrap();
                if !*added {
                    *added = true;
                    inner.subscribe_listener(key("late"), late.listener::<Ping>("late"), LOW)?;
                }
                Ok(())
            }),
            HIGH,
        )
        .unwrap();

    service.post(Ping { seq: 0 }).unwrap();
    assert!(recorder.take().is_empty());

    service.post(Ping { seq: 1 }).unwrap();
    assert_eq!(recorder.take(), vec!["late"]);

    // The spawner holds a clone of the service.
    service.close();
}

#[test]
fn a_listener_removed_during_a_post_still_runs_in_that_post() {
    let service = service();
    let recorder = OrderRecorder::new();
    let victim = service
        .subscribe_listener(key("victim"), recorder.listener::<Ping>("victim"), LOW)
        .unwrap();

    let inner = service.clone();
    let log = recorder.clone();
    service
        .subscribe_listener(
            key("remover"),
            Listener::new(move |_: &Ping| {
                log.record("remover");
                inner.unsubscribe(&victim);
                Ok(())
            }),
            HIGH,
        )
        .unwrap();

    let result = service.post(Ping { seq: 0 }).unwrap();
    assert!(result.is_success());
    assert_eq!(recorder.take(), vec!["remover", "victim"]);
    assert_eq!(service.all_listeners().len(), 1);

    service.post(Ping { seq: 1 }).unwrap();
    assert_eq!(recorder.take(), vec!["remover"]);

    // The remover holds a clone of the service.
    service.close();
}

#[test]
fn concurrent_subscribe_post_and_unsubscribe_stay_consistent() {
    const WORKERS: u32 = 4;
    const ROUNDS: usize = 300;

    let service = service();
    let hits: Vec<Arc<AtomicUsize>> = (0..WORKERS).map(|_| Arc::default()).collect();

    thread::scope(|scope| {
        for worker in 0..WORKERS {
            let service = &service;
            let counter = hits[worker as usize].clone();
            scope.spawn(move || {
                let worker_key = key(&format!("worker-{worker}"));
                for round in 0..ROUNDS {
                    let own = counter.clone();
                    let record = service
                        .subscribe(worker_key.clone(), move |ping: &Ping| {
                            if ping.seq == worker {
                                own.fetch_add(1, Ordering::SeqCst);
                            }
                            Ok(())
                        })
                        .unwrap();

                    let result = service.post(Ping { seq: worker }).unwrap();
                    assert!(result.is_success());

                    if round % 2 == 0 {
                        assert!(service.unsubscribe(&record));
                    } else {
                        let removed = service.unsubscribe_by_key(&worker_key);
                        assert_eq!(removed.len(), 1);
                        assert!(removed[0].same_as(&record));
                    }
                }
            });
        }
    });

    for counter in &hits {
        assert_eq!(counter.load(Ordering::SeqCst), ROUNDS);
    }
    assert!(service.all_listeners().is_empty());
    assert!(service.subscribers().is_empty());
}
