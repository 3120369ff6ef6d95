use herald::{
    EventService, EventType, Key, LoggingObserver, PostReport, Priority,
    testing::{CountingObserver, OrderRecorder},
};
use std::sync::{Arc, Mutex};

mod common;
use common::{Chat, Message, Ping, key, service};

#[test]
fn observers_see_every_post_until_removed() {
    let service = service();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = service
        .add_result_observer(move |report: &PostReport<'_, Key, Priority>| {
            let ping = report.downcast_event::<Ping>().map(|p| p.seq);
            sink.lock().unwrap().push(ping);
        })
        .unwrap();

    service.post(Ping { seq: 1 }).unwrap();
    service.post_ref(&Ping { seq: 2 }).unwrap();
    service.post(Message::default()).unwrap();

    assert!(service.remove_result_observer(id));
    assert!(!service.remove_result_observer(id));
    service.post(Ping { seq: 3 }).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), None]);
}

#[test]
fn reports_carry_the_posted_event_and_its_outcome() {
    let service = service();
    let recorder = OrderRecorder::new();
    service
        .subscribe_listener(key("fails"), recorder.failing::<Message>("fails", "bad"), None)
        .unwrap();

    let captured = Arc::new(Mutex::new(None));
    let sink = captured.clone();
    service
        .add_result_observer(move |report: &PostReport<'_, Key, Priority>| {
            let room = report.downcast_event::<Chat>().map(|chat| chat.room.clone());
            let event_type = report.event().event_type();
            *sink.lock().unwrap() = Some((room, event_type, report.outcome().failures().len()));
        })
        .unwrap();

    service
        .post(Chat {
            room: "lobby".into(),
            ..Chat::default()
        })
        .unwrap();

    let (room, event_type, failures) = captured.lock().unwrap().take().unwrap();
    assert_eq!(room.as_deref(), Some("lobby"));
    assert_eq!(event_type, EventType::of::<Chat>());
    assert_eq!(failures, 1);
}

#[test]
fn a_panicking_observer_does_not_disturb_the_others() {
    let counting = CountingObserver::new();
    let service = EventService::builder()
        .priority_order()
        .result_observer(|_: &PostReport<'_, Key, Priority>| panic!("observer bug"))
        .observer(counting.clone())
        .build()
        .unwrap();
    service.subscribe(key("ok"), |_: &Ping| Ok(())).unwrap();

    let result = service.post(Ping { seq: 0 }).unwrap();

    assert!(result.is_success());
    assert_eq!(counting.posts(), 1);
    assert_eq!(counting.failed(), 0);
    assert_eq!(service.observers().len(), 2);
}

#[test]
fn logging_observer_accepts_any_post() {
    let service = service();
    let counting = CountingObserver::new();
    service.add_observer(LoggingObserver).unwrap();
    service.add_observer(counting.clone()).unwrap();
    service
        .subscribe(key("fails"), |_: &Ping| Err("logged".into()))
        .unwrap();

    service.post(Ping { seq: 0 }).unwrap();
    service.post(Message::default()).unwrap();

    assert_eq!(counting.posts(), 2);
    assert_eq!(counting.failed(), 1);
}
