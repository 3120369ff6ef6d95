use herald::{
    DeferredPost, DispatchError, DispatchState, HeraldError, Key, Listener, PostReport, Priority,
    executor::ThreadExecutor,
    testing::{CountingObserver, OrderRecorder},
};
use std::{
    sync::{Arc, Mutex, mpsc},
    time::Duration,
};

mod common;
use common::{HIGH, LOW, Ping, key, service};

#[test]
fn close_releases_everything_and_rejects_new_work() {
    let service = service();
    let recorder = OrderRecorder::new();
    service
        .subscribe_listener(key("a"), recorder.listener::<Ping>("a"), None)
        .unwrap();
    service
        .subscribe_listener(key("b"), recorder.listener::<Ping>("b"), None)
        .unwrap();
    service.add_observer(CountingObserver::new()).unwrap();

    assert_eq!(service.close(), 2);
    assert!(service.is_closed());
    assert!(service.all_listeners().is_empty());
    assert!(service.observers().is_empty());

    let refused = service.subscribe_listener(key("late"), recorder.listener::<Ping>("late"), None);
    assert!(matches!(refused, Err(HeraldError::Closed)));
    let refused = service.bulk().add(key("bulk"), |_: &Ping| Ok(())).subscribe();
    assert!(matches!(refused, Err(HeraldError::Closed)));
    assert!(service.all_listeners().is_empty());

    assert!(matches!(service.post(Ping { seq: 0 }), Err(HeraldError::Closed)));
    assert!(matches!(service.post_ref(&Ping { seq: 0 }), Err(HeraldError::Closed)));
    assert!(matches!(service.post_async(Ping { seq: 0 }), Err(HeraldError::Closed)));
    assert!(recorder.order().is_empty());

    let refused = service.add_observer(CountingObserver::new());
    assert!(matches!(refused, Err(HeraldError::Closed)));
    let refused = service.add_result_observer(|_: &PostReport<'_, Key, Priority>| {});
    assert!(matches!(refused, Err(HeraldError::Closed)));
    assert!(service.observers().is_empty());

    assert_eq!(service.close(), 0);
}

#[test]
fn clones_share_the_closed_state() {
    let service = service();
    let clone = service.clone();
    clone.close();
    assert!(service.is_closed());
}

#[test]
fn a_started_post_finishes_after_close() {
    let service = service();
    let recorder = OrderRecorder::new();
    let inner = service.clone();
    let log = recorder.clone();
    service
        .subscribe_listener(
            key("closer"),
            Listener::infallible(move |_: &Ping| {
                log.record("closer");
                inner.close();
            }),
            HIGH,
        )
        .unwrap();
    service
        .subscribe_listener(key("after"), recorder.listener::<Ping>("after"), LOW)
        .unwrap();

    let result = service.post(Ping { seq: 0 }).unwrap();

    assert_eq!(recorder.order(), vec!["closer", "after"]);
    assert!(result.is_success());
    assert!(matches!(service.post(Ping { seq: 1 }), Err(HeraldError::Closed)));
}

#[test]
fn a_deferred_post_run_after_close_resolves_to_closed() {
    let service = service();
    let recorder = OrderRecorder::new();
    service
        .subscribe_listener(key("a"), recorder.listener::<Ping>("a"), None)
        .unwrap();

    let slot: Arc<Mutex<Option<DeferredPost<Ping, Key, Priority>>>> = Arc::default();
    let parked = slot.clone();
    let handle = service
        .post_with(Ping { seq: 0 }, move |post| {
            *parked.lock().unwrap() = Some(post);
            Ok(())
        })
        .unwrap();
    assert_eq!(handle.state(), DispatchState::Pending);

    service.close();
    let post = slot.lock().unwrap().take().unwrap();
    post.run();

    assert!(matches!(handle.wait(), Err(DispatchError::Closed)));
    assert!(recorder.order().is_empty());
}

#[test]
fn drain_waits_for_posts_in_flight() {
    let service = service();
    assert!(service.drain(Duration::ZERO));

    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let (started_tx, started) = mpsc::channel();
    let started_tx = Mutex::new(started_tx);
    service
        .subscribe(key("slow"), move |_: &Ping| {
            started_tx.lock().unwrap().send(())?;
            gate.lock().unwrap().recv()?;
            Ok(())
        })
        .unwrap();

    let handle = service
        .post_async_on(Ping { seq: 0 }, &ThreadExecutor::new())
        .unwrap();
    started.recv().unwrap();

    assert!(!service.drain(Duration::from_millis(20)));
    assert!(!handle.is_finished());

    release.send(()).unwrap();
    assert!(service.drain(Duration::from_secs(5)));
    assert!(handle.is_finished());
    assert!(handle.wait().unwrap().is_success());
}

#[test]
fn a_dropped_deferred_post_is_abandoned() {
    let service = service();
    let handle = service.post_with(Ping { seq: 0 }, |post| {
        drop(post);
        Ok(())
    });

    let handle = handle.unwrap();
    assert!(service.drain(Duration::ZERO));
    assert!(matches!(handle.wait(), Err(DispatchError::Abandoned)));
}
