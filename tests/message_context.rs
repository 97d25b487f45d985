use hdf_message_router::Message::Structs::MessageContext::{
    MessageContext, RequestContext, RequestType, SyncCompletion,
};
use hdf_message_router::{MessageBuffer, RouterError, RouterResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn payload(text: &str) -> MessageBuffer {
    let mut buf = MessageBuffer::new();
    buf.write_string(text);
    buf
}

#[test]
fn test_buffer_typed_fields_read_back_in_order() {
    let mut buf = MessageBuffer::with_capacity(32);
    buf.write_u8(7);
    buf.write_u16(0xBEEF);
    buf.write_u32(42);
    buf.write_u64(u64::MAX - 1);
    buf.write_i32(-5);
    buf.write_bytes(&[1, 2, 3]);
    buf.write_string("router");

    let mut reader = buf.reader();
    assert_eq!(reader.read_u8(), Some(7));
    assert_eq!(reader.read_u16(), Some(0xBEEF));
    assert_eq!(reader.read_u32(), Some(42));
    assert_eq!(reader.read_u64(), Some(u64::MAX - 1));
    assert_eq!(reader.read_i32(), Some(-5));
    assert_eq!(reader.read_bytes(), Some(&[1u8, 2, 3][..]));
    assert_eq!(reader.read_string(), Some("router"));
    assert_eq!(reader.remaining(), 0);
    assert_eq!(reader.read_u8(), None);
}

#[test]
fn test_short_read_leaves_cursor_in_place() {
    let mut buf = MessageBuffer::new();
    buf.write_u32(100); // claims a 100 byte payload
    buf.write_raw(b"abc");

    let mut reader = buf.reader();
    let before = reader.remaining();
    assert_eq!(reader.read_bytes(), None);
    assert_eq!(reader.remaining(), before);
    assert_eq!(reader.read_u32(), Some(100));
}

#[test]
fn test_set_to_response_swaps_addresses() {
    let completion = SyncCompletion::new();
    let mut msg = MessageContext::sync_request(
        3,
        9,
        1,
        payload("ping"),
        MessageBuffer::new(),
        completion.clone(),
    );
    assert_eq!(msg.request_type, RequestType::SyncReq);

    msg.set_to_response();
    assert_eq!(msg.sender_id, 9);
    assert_eq!(msg.receiver_id, 3);
    assert_eq!(msg.request_type, RequestType::SyncRsp);
    assert!(!msg.request_type.is_request());
    assert!(msg.request_type.is_sync());
}

#[test]
fn test_complete_posts_sync_waiter_with_response() {
    let completion = SyncCompletion::new();
    let mut msg = MessageContext::sync_request(
        1,
        2,
        0,
        payload("ping"),
        MessageBuffer::new(),
        completion.clone(),
    );
    msg.rsp_data = payload("pong");
    msg.response_status = Err(RouterError::Handler(-42));
    msg.set_to_response();
    msg.complete();

    assert!(completion.is_posted());
    let outcome = completion.wait();
    assert_eq!(outcome.status, Err(RouterError::Handler(-42)));
    assert_eq!(outcome.response.reader().read_string(), Some("pong"));
}

#[test]
fn test_dropped_sync_envelope_never_strands_waiter() {
    let completion = SyncCompletion::new();
    let msg = MessageContext::sync_request(
        1,
        2,
        0,
        MessageBuffer::new(),
        MessageBuffer::new(),
        completion.clone(),
    );
    assert!(!completion.is_posted());
    println!("dropping {:?}", msg);
    drop(msg);

    let outcome = completion.wait();
    assert_eq!(outcome.status, Err(RouterError::NotSupported));
    assert!(outcome.response.is_empty());
}

#[test]
fn test_async_callback_runs_once_with_status() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let mut msg = MessageContext::async_request(
        4,
        5,
        2,
        payload("req"),
        Some(Box::new(move |ctx: &RequestContext, req: &MessageBuffer, _rsp: &MessageBuffer, status: RouterResult<()>| {
            assert_eq!(ctx.request_type, RequestType::AsyncRsp);
            assert_eq!(ctx.receiver_id, 4, "response addressed back to the sender");
            assert_eq!(req.reader().read_string(), Some("req"));
            assert_eq!(status, Err(RouterError::NoSuchService { service_id: 5 }));
            seen.fetch_add(1, Ordering::SeqCst);
        })),
    );
    assert!(msg.has_callback());
    assert!(!msg.is_oneway());

    msg.set_to_response();
    msg.fail(RouterError::NoSuchService { service_id: 5 });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_oneway_envelope_has_no_reply() {
    let msg = MessageContext::async_request(1, 2, 0, MessageBuffer::new(), None);
    assert!(msg.is_oneway());
    assert!(!msg.has_callback());
    let debug = format!("{:?}", msg);
    assert!(debug.contains("oneway"), "{}", debug);
    msg.complete();
}

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(RouterError::NullInput.code(), -1);
    assert_eq!(RouterError::Handler(-77).code(), -77);
    assert!(RouterError::ResourceExhausted.code() < 0);
    assert_ne!(
        RouterError::NoSuchService { service_id: 1 }.code(),
        RouterError::NoSuchCommand { service_id: 1, command_id: 0 }.code()
    );
}
