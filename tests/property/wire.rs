//! Property-based serialization round-trip tests for the wire protocol.
//!
//! Uses proptest to verify:
//! 1. Any valid `ClientRequest` survives encode → decode round-trip.
//! 2. Any valid `ServerPush` survives encode → decode round-trip.
//! 3. Random bytes never cause a panic in decode (returns `Err` gracefully).

use proptest::prelude::*;
use taskflow_proto::task::TaskId;
use taskflow_proto::wire::*;

// --- Arbitrary implementations for protocol types ---

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    "[a-z0-9-]{1,40}".prop_map(TaskId::from_string)
}

/// Strategy for generating arbitrary `Document` values.
fn arb_document() -> impl Strategy<Value = Document> {
    (arb_task_id(), "[^\x00]{0,256}", any::<bool>(), any::<u64>()).prop_map(
        |(id, text, completed, created_at)| Document {
            id,
            text,
            completed,
            created_at,
        },
    )
}

/// Strategy for generating arbitrary `ClientRequest` values.
fn arb_client_request() -> impl Strategy<Value = ClientRequest> {
    prop_oneof![
        any::<u16>().prop_map(|protocol_version| ClientRequest::Subscribe { protocol_version }),
        (any::<u64>(), "[^\x00]{0,256}")
            .prop_map(|(request_id, text)| ClientRequest::Append { request_id, text }),
        (any::<u64>(), arb_task_id(), any::<bool>()).prop_map(|(request_id, id, completed)| {
            ClientRequest::Patch {
                request_id,
                id,
                completed,
            }
        }),
        (any::<u64>(), arb_task_id())
            .prop_map(|(request_id, id)| ClientRequest::Remove { request_id, id }),
    ]
}

/// Strategy for generating arbitrary `ServerPush` values.
fn arb_server_push() -> impl Strategy<Value = ServerPush> {
    prop_oneof![
        Just(ServerPush::Subscribed),
        ".{0,128}".prop_map(|reason| ServerPush::Rejected { reason }),
        prop::collection::vec(arb_document(), 0..16)
            .prop_map(|documents| ServerPush::Snapshot { documents }),
        any::<u64>().prop_map(|request_id| ServerPush::WriteOk { request_id }),
        (any::<u64>(), ".{0,128}").prop_map(|(request_id, reason)| ServerPush::WriteFailed {
            request_id,
            reason
        }),
    ]
}

proptest! {
    #[test]
    fn client_request_round_trips(request in arb_client_request()) {
        let bytes = encode_request(&request).expect("encode");
        let decoded = decode_request(&bytes).expect("decode");
        prop_assert_eq!(request, decoded);
    }

    #[test]
    fn server_push_round_trips(push in arb_server_push()) {
        let bytes = encode_push(&push).expect("encode");
        let decoded = decode_push(&bytes).expect("decode");
        prop_assert_eq!(push, decoded);
    }

    #[test]
    fn decode_request_never_panics_on_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_request(&bytes);
    }

    #[test]
    fn decode_push_never_panics_on_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_push(&bytes);
    }
}
