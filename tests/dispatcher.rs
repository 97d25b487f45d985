use hdf_message_router::Core::ObjectStatus;
use hdf_message_router::Core::Semaphore::Semaphore;
use hdf_message_router::Message::Dispatcher::Dispatcher;
use hdf_message_router::Message::Structs::MessageContext::{
    MessageCallback, MessageContext, RequestContext, SyncCompletion,
};
use hdf_message_router::{DispatcherConfig, MessageBuffer, RouterError, RouterResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config(id: u8) -> DispatcherConfig {
    DispatcherConfig::new(id)
        .with_queue_size(16)
        .with_priority_levels(2)
        .with_poll_timeout(Duration::from_millis(50))
}

/// A callback that records its status and the thread it ran on.
fn recording_callback(
    log: &Arc<Mutex<Vec<(String, RouterResult<()>)>>>,
    done: &Arc<Semaphore>,
) -> MessageCallback {
    let log = log.clone();
    let done = done.clone();
    Box::new(
        move |_ctx: &RequestContext, _req: &MessageBuffer, _rsp: &MessageBuffer, status: RouterResult<()>| {
            let name = thread::current().name().unwrap_or("").to_string();
            log.lock().push((name, status));
            done.post();
        },
    )
}

/// An async response envelope, as a worker would receive it.
fn response_envelope(callback: MessageCallback) -> Box<MessageContext> {
    let mut msg = MessageContext::async_request(1, 2, 0, MessageBuffer::new(), Some(callback));
    msg.set_to_response();
    msg
}

#[test]
fn test_start_and_shutdown_lifecycle() {
    let dispatcher = Dispatcher::create(&config(3)).unwrap();
    assert_eq!(dispatcher.status(), ObjectStatus::Stopped);
    assert_eq!(dispatcher.dispatcher_id(), 3);
    assert_eq!(dispatcher.queue_capacity(), 16);
    assert_eq!(dispatcher.priority_levels(), 2);

    Dispatcher::start(&dispatcher).unwrap();
    assert_eq!(dispatcher.status(), ObjectStatus::Running);
    println!("{:?}", *dispatcher);

    assert!(matches!(
        Dispatcher::start(&dispatcher),
        Err(RouterError::WrongStatus { .. })
    ));

    dispatcher.shutdown();
    dispatcher.join();
    assert_eq!(dispatcher.status(), ObjectStatus::ToDestroy);

    // idempotent
    dispatcher.shutdown();
    dispatcher.join();
}

#[test]
fn test_invalid_config_is_rejected() {
    let zero_queue = DispatcherConfig::new(1).with_queue_size(0);
    assert!(matches!(
        Dispatcher::create(&zero_queue),
        Err(RouterError::ParameterInvalid { .. })
    ));
    let zero_levels = DispatcherConfig::new(1).with_priority_levels(0);
    assert!(matches!(
        Dispatcher::create(&zero_levels),
        Err(RouterError::ParameterInvalid { .. })
    ));
}

#[test]
fn test_append_requires_running() {
    let dispatcher = Dispatcher::create(&config(4)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Semaphore::new(0));

    let err = dispatcher
        .append_message(0, response_envelope(recording_callback(&log, &done)))
        .unwrap_err();
    assert_eq!(
        err.error,
        RouterError::WrongStatus {
            status: ObjectStatus::Stopped
        }
    );
    assert!(log.lock().is_empty(), "rejected envelope is handed back unsignalled");

    err.release();
    assert_eq!(log.lock().len(), 1);
    assert!(log.lock()[0].1.is_err());
}

#[test]
fn test_response_callback_runs_on_worker_thread() {
    let dispatcher = Dispatcher::create(&config(7)).unwrap();
    Dispatcher::start(&dispatcher).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Semaphore::new(0));
    dispatcher
        .append_message(0, response_envelope(recording_callback(&log, &done)))
        .unwrap();

    assert!(done.wait_timeout(Duration::from_secs(5)));
    let entries = log.lock();
    assert_eq!(entries[0].0, "msg-dispatcher-7");
    assert_eq!(entries[0].1, Ok(()));
    drop(entries);

    dispatcher.shutdown();
    dispatcher.join();
}

#[test]
fn test_unbounded_push_timeout_accepts_work() {
    let dispatcher = Dispatcher::create(&config(9).with_push_timeout(Duration::MAX)).unwrap();
    Dispatcher::start(&dispatcher).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Semaphore::new(0));
    for _ in 0..32 {
        dispatcher
            .append_message(1, response_envelope(recording_callback(&log, &done)))
            .unwrap();
    }
    for _ in 0..32 {
        assert!(done.wait_timeout(Duration::from_secs(5)));
    }
    assert!(log.lock().iter().all(|(_, status)| status.is_ok()));

    dispatcher.shutdown();
    dispatcher.join();
}

#[test]
fn test_request_for_unknown_service_fails_callback() {
    let dispatcher = Dispatcher::create(&config(8)).unwrap();
    Dispatcher::start(&dispatcher).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Semaphore::new(0));
    let msg = MessageContext::async_request(
        1,
        63,
        0,
        MessageBuffer::new(),
        Some(recording_callback(&log, &done)),
    );
    dispatcher.append_message(1, msg).unwrap();

    assert!(done.wait_timeout(Duration::from_secs(5)));
    assert_eq!(
        log.lock()[0].1,
        Err(RouterError::NoSuchService { service_id: 63 })
    );

    dispatcher.shutdown();
    dispatcher.join();
}

#[test]
fn test_shutdown_fails_queued_envelopes() {
    let dispatcher = Dispatcher::create(&config(9)).unwrap();
    Dispatcher::start(&dispatcher).unwrap();

    // occupy the worker
    let busy = Arc::new(Semaphore::new(0));
    let busy_started = busy.clone();
    let slow: MessageCallback = Box::new(
        move |_ctx: &RequestContext, _req: &MessageBuffer, _rsp: &MessageBuffer, _status: RouterResult<()>| {
            busy_started.post();
            thread::sleep(Duration::from_millis(200));
        },
    );
    dispatcher.append_message(0, response_envelope(slow)).unwrap();
    assert!(busy.wait_timeout(Duration::from_secs(5)));

    let log = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Semaphore::new(0));
    for _ in 0..3 {
        dispatcher
            .append_message(1, response_envelope(recording_callback(&log, &done)))
            .unwrap();
    }

    let completion = SyncCompletion::new();
    let mut sync = MessageContext::sync_request(
        1,
        2,
        0,
        MessageBuffer::new(),
        MessageBuffer::new(),
        completion.clone(),
    );
    sync.set_to_response();
    dispatcher.append_message(1, sync).unwrap();
    assert_eq!(dispatcher.pending(), 4);

    dispatcher.shutdown();
    dispatcher.join();

    for _ in 0..3 {
        assert!(done.wait_timeout(Duration::from_secs(1)));
    }
    for (_, status) in log.lock().iter() {
        assert_eq!(*status, Err(RouterError::NotSupported));
    }
    assert_eq!(completion.wait().status, Err(RouterError::NotSupported));
    assert_eq!(dispatcher.pending(), 0);
}
