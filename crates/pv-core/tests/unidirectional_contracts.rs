//! End-to-end scenarios driven through the public registry API, mirroring the literal
//! worked examples: scalar round-trip, overflow, and notification coalescing.

use pv_core::prelude::*;

fn registry() -> PvManager {
    PvManager::new("unidirectional-contracts")
}

#[test]
fn scalar_round_trip_is_lossless_for_three_writes_into_a_two_deep_queue() {
    let registry = registry();
    registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 3, CreateFlags {
            wait_for_new_data: true,
            may_send_destructively: false,
        })
        .unwrap();

    let sender = registry.get_sender::<i32>("x", true).unwrap();
    let receiver = registry.get_receiver::<i32>("x", false).unwrap();

    for v in [42, 43, 44] {
        assert!(!sender.write(&[v]).unwrap());
    }

    let mut seen = Vec::new();
    while receiver.read_non_blocking() {
        seen.push(receiver.payload()[0]);
    }
    assert_eq!(seen, vec![42, 43, 44]);
}

#[test]
fn overflow_preserves_ring_head_and_most_recent_staged_value() {
    let registry = registry();
    registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 3, CreateFlags::default())
        .unwrap();

    let sender = registry.get_sender::<i32>("x", true).unwrap();
    let receiver = registry.get_receiver::<i32>("x", false).unwrap();

    for v in 1..=10 {
        sender.write(&[v]).unwrap();
    }

    let mut seen = Vec::new();
    while receiver.read_non_blocking() {
        seen.push(receiver.payload()[0]);
    }
    assert_eq!(seen, vec![1, 2, 10]);
}

#[test]
fn hundred_writes_without_draining_coalesce_to_one_notification() {
    let registry = registry();
    registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 4, CreateFlags::default())
        .unwrap();

    let sender = registry.get_sender::<i32>("x", true).unwrap();
    for v in 0..100 {
        sender.write(&[v]).unwrap();
    }

    assert!(registry.next_notification(false).is_some());
    assert!(registry.next_notification(false).is_none());

    let receiver = registry.get_receiver::<i32>("x", false).unwrap();
    let mut count = 0;
    while receiver.read_non_blocking() {
        count += 1;
    }
    assert_eq!(count, 100);
}

#[test]
fn explicit_version_must_be_strictly_greater_than_the_last() {
    let registry = registry();
    registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 2, CreateFlags::default())
        .unwrap();
    let sender = registry.get_sender::<i32>("x", true).unwrap();

    let v = VersionNumber::new();
    sender.write_with_version(&[1], v).unwrap();
    let err = sender.write_with_version(&[2], v).unwrap_err();
    assert!(matches!(err, PvError::NonMonotonicVersion { .. }));
}

#[test]
fn poll_only_receiver_sees_the_seeded_initial_value_before_any_write() {
    let registry = registry();
    registry
        .create_process_array::<i32>(
            Direction::ControlSystemToDevice,
            "x",
            3,
            vec![7, 7, 7],
            2,
            CreateFlags::default(),
        )
        .unwrap();
    let receiver = registry.get_receiver::<i32>("x", false).unwrap();
    assert_eq!(receiver.payload(), vec![7, 7, 7]);
}

#[test]
fn duplicate_name_is_rejected() {
    let registry = registry();
    registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 2, CreateFlags::default())
        .unwrap();
    let err = registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 2, CreateFlags::default())
        .unwrap_err();
    assert!(matches!(err, PvError::DuplicateName { .. }));
}

#[test]
fn number_of_buffers_below_two_is_rejected() {
    let registry = registry();
    let err = registry
        .create_process_array::<i32>(Direction::ControlSystemToDevice, "x", 1, vec![0], 1, CreateFlags::default())
        .unwrap_err();
    assert!(matches!(err, PvError::QueueTooSmall { .. }));
}
