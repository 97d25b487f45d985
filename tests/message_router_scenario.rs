// End-to-end runs against a two-dispatcher router.
mod common;

use common::fresh_router;
use hdf_message_router::Core::Semaphore::Semaphore;
use hdf_message_router::Message::Router;
use hdf_message_router::Message::Structs::MessageContext::RequestContext;
use hdf_message_router::{
    DispatcherConfig, MessageBuffer, RouterResult, ServiceConfig, ServiceDef, Sidecar,
};
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SERVICE_A: u8 = 1;
const SERVICE_B: u8 = 2;
const DISPATCHER_B: u8 = 1;
const SLOW_HANDLER: Duration = Duration::from_millis(500);

fn echo(_ctx: &RequestContext, req: &MessageBuffer, rsp: &mut MessageBuffer) -> RouterResult<()> {
    rsp.write_raw(req.as_bytes());
    Ok(())
}

/// A on the default dispatcher with an echo at priority 1. B on a four-level
/// dispatcher: echo at priority 2, then commands 1..=4 that record their id
/// and sleep, at priorities 0..=3.
fn setup(order: &Arc<Mutex<Vec<u32>>>) -> (Sidecar, Sidecar) {
    fresh_router().unwrap();
    Router::add_dispatcher(
        DispatcherConfig::new(DISPATCHER_B)
            .with_priority_levels(4)
            .with_queue_size(1024),
    )
    .unwrap();

    let a = Sidecar::create(
        ServiceDef::new(SERVICE_A).with_message(0, echo, 1),
        &ServiceConfig::new(),
    )
    .unwrap();

    let mut def_b = ServiceDef::new(SERVICE_B).with_message(0, echo, 2);
    for cmd in 1..=4u32 {
        let order = order.clone();
        def_b = def_b.with_message(
            cmd,
            move |ctx: &RequestContext, _req: &MessageBuffer, _rsp: &mut MessageBuffer| {
                order.lock().push(ctx.command_id);
                thread::sleep(SLOW_HANDLER);
                Ok(())
            },
            (cmd - 1) as u8,
        );
    }
    let b = Sidecar::create(def_b, &ServiceConfig::new().with_dispatcher_id(DISPATCHER_B)).unwrap();
    (a, b)
}

#[test]
#[serial]
fn test_sync_and_async_traffic() {
    let (a, _b) = setup(&Arc::new(Mutex::new(Vec::new())));

    let start = Instant::now();
    for i in 0..40_000u32 {
        let mut req = MessageBuffer::new();
        req.write_u32(i);
        let mut rsp = MessageBuffer::new();
        a.send_sync_message(SERVICE_B, 0, Some(&req), Some(&mut rsp))
            .unwrap();
        assert_eq!(rsp, req);
    }
    let sync_elapsed = start.elapsed();
    println!("40000 sync round trips in {:?}", sync_elapsed);
    assert!(
        sync_elapsed < Duration::from_secs(30),
        "sync round trips took {:?}",
        sync_elapsed
    );

    let total = 10_000usize;
    let fired: Arc<Vec<AtomicBool>> = Arc::new((0..total).map(|_| AtomicBool::new(false)).collect());
    let calls = Arc::new(AtomicUsize::new(0));
    let all_done = Arc::new(Semaphore::new(0));

    let start = Instant::now();
    for i in 0..total {
        let mut req = MessageBuffer::new();
        req.write_u64(i as u64);
        let (fired, calls, all_done) = (fired.clone(), calls.clone(), all_done.clone());
        a.send_async_message(
            SERVICE_B,
            0,
            Some(req),
            Some(Box::new(
                move |_ctx: &RequestContext, _req: &MessageBuffer, rsp: &MessageBuffer, status: RouterResult<()>| {
                    assert_eq!(status, Ok(()));
                    let idx = rsp.reader().read_u64().unwrap() as usize;
                    assert!(!fired[idx].swap(true, Ordering::SeqCst), "callback {} fired twice", idx);
                    if calls.fetch_add(1, Ordering::SeqCst) + 1 == total {
                        all_done.post();
                    }
                },
            )),
        )
        .unwrap();
    }

    assert!(
        all_done.wait_timeout(Duration::from_secs(60)),
        "only {} of {} callbacks fired",
        calls.load(Ordering::SeqCst),
        total
    );
    println!("{} async round trips in {:?}", total, start.elapsed());
    assert!(fired.iter().all(|f| f.load(Ordering::SeqCst)));

    Router::shutdown_message_router().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), total, "no callback after shutdown");
}

#[test]
#[serial]
fn test_queued_requests_follow_priority() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, _b) = setup(&order);

    // command 4 occupies B's worker, the rest queue up behind it
    a.send_oneway_message(SERVICE_B, 4, None).unwrap();
    assert!(common::wait_until(Duration::from_secs(2), || !order.lock().is_empty()));
    for cmd in [3, 2, 1] {
        a.send_oneway_message(SERVICE_B, cmd, None).unwrap();
    }

    assert!(common::wait_until(Duration::from_secs(5), || order.lock().len() == 4));
    println!("handled order: {:?}", order.lock());
    assert_eq!(*order.lock(), vec![4, 1, 2, 3]);

    Router::shutdown_message_router().unwrap();
}

#[test]
#[serial]
fn test_shutdown_releases_blocked_external_caller() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, _b) = setup(&order);

    a.send_oneway_message(SERVICE_B, 4, None).unwrap();
    assert!(common::wait_until(Duration::from_secs(2), || !order.lock().is_empty()));

    // queued behind the slow handler
    let caller = thread::spawn(|| {
        let encoded = ((SERVICE_B as u32) << 16) | 1;
        let start = Instant::now();
        let result = Router::dispatch_to_message(7, encoded, None, None);
        (result, start.elapsed())
    });

    thread::sleep(Duration::from_millis(100));
    Router::shutdown_message_router().unwrap();

    let (result, waited) = caller.join().unwrap();
    println!("blocked caller returned {:?} after {:?}", result, waited);
    assert!(result.is_err(), "a drained request must fail, not hang");
    assert!(waited < Duration::from_secs(5));
    assert_eq!(*order.lock(), vec![4], "queued command never ran");
}
