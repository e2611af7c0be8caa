#![cfg(not(target_arch = "wasm32"))]

use tern_state::{
    join_path, HandlerRegistry, MemStorage, StateError, StateStorage, StateVisitor,
    STATE_HEADER_LEN,
};

#[derive(Default)]
struct Device {
    name: String,
    value: u32,
    calls: usize,
}

fn registry() -> HandlerRegistry<Device> {
    let mut registry = HandlerRegistry::new();
    registry
        .register("device", |dev: &mut Device, v: &mut dyn StateVisitor| {
            dev.calls += 1;
            v.object("device", 2, |v| {
                v.string_field("name", &mut dev.name)?;
                v.scalar("value", &mut dev.value)
            })
        })
        .unwrap();
    registry
}

fn stored() -> MemStorage {
    let mut storage = MemStorage::new();
    let mut dev = Device {
        name: "abc".to_string(),
        value: 7,
        calls: 0,
    };
    registry().store(&mut dev, &mut storage, "snap").unwrap();
    storage
}

fn state_path() -> String {
    join_path("snap", "state.bin")
}

#[test]
fn third_insertion_into_capacity_two_object_fails() {
    let mut registry = HandlerRegistry::<()>::new();
    registry
        .register("full", |_, v: &mut dyn StateVisitor| {
            v.object("full", 2, |v| {
                v.field("a", &mut [1])?;
                v.field("b", &mut [2])?;
                v.field("c", &mut [3])
            })
        })
        .unwrap();

    let mut storage = MemStorage::new();
    let err = registry.store(&mut (), &mut storage, "snap").unwrap_err();
    assert!(matches!(
        err.root_cause(),
        StateError::CapacityExhausted { key, capacity: 2 } if key == "c"
    ));
    assert!(!storage.contains(&state_path()));
}

#[test]
fn nested_object_past_capacity_fails() {
    let mut registry = HandlerRegistry::<()>::new();
    registry
        .register("full", |_, v: &mut dyn StateVisitor| {
            v.object("full", 2, |v| {
                v.field("a", &mut [1])?;
                v.field("b", &mut [2])?;
                v.object("c", 1, |_| Ok(()))
            })
        })
        .unwrap();

    let err = registry
        .store(&mut (), &mut MemStorage::new(), "snap")
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        StateError::CapacityExhausted { capacity: 2, .. }
    ));
}

#[test]
fn flipped_string_terminator_fails_restore() {
    let mut storage = stored();
    let bytes = storage.get_mut(&state_path()).unwrap();

    // The name blob is stored as a 4 byte length followed by "abc\0".
    let needle = [4u8, 0, 0, 0, b'a', b'b', b'c', 0];
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("encoded name blob");
    bytes[at + needle.len() - 1] = b'a';

    let mut dev = Device::default();
    let err = registry().load(&mut dev, &mut storage, "snap").unwrap_err();
    assert!(matches!(
        err.root_cause(),
        StateError::InvalidString(name) if name == "name"
    ));
}

#[test]
fn bad_magic_fails_before_any_handler_runs() {
    let mut storage = stored();
    let bytes = storage.get_mut(&state_path()).unwrap();
    bytes[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    let mut dev = Device::default();
    let err = registry().load(&mut dev, &mut storage, "snap").unwrap_err();
    assert!(matches!(err, StateError::InvalidMagic(0xEFBE_ADDE)));
    assert_eq!(dev.calls, 0);
}

#[test]
fn bad_version_fails_before_any_handler_runs() {
    let mut storage = stored();
    let bytes = storage.get_mut(&state_path()).unwrap();
    bytes[4..8].copy_from_slice(&7u32.to_le_bytes());

    let mut dev = Device::default();
    let err = registry().load(&mut dev, &mut storage, "snap").unwrap_err();
    assert!(matches!(err, StateError::UnsupportedVersion(7)));
    assert_eq!(dev.calls, 0);
}

#[test]
fn malformed_body_fails_before_any_handler_runs() {
    let mut storage = stored();
    let bytes = storage.get_mut(&state_path()).unwrap();
    bytes.truncate(STATE_HEADER_LEN + 3);

    let mut dev = Device::default();
    let err = registry().load(&mut dev, &mut storage, "snap").unwrap_err();
    assert!(matches!(err, StateError::Corrupt(_)));
    assert_eq!(dev.calls, 0);
}

#[test]
fn missing_state_file_names_the_path() {
    let mut dev = Device::default();
    let err = registry()
        .load(&mut dev, &mut MemStorage::new(), "snap")
        .unwrap_err();
    match err {
        StateError::File { path, source } => {
            assert_eq!(path, state_path());
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_object_is_fatal_on_restore() {
    let mut storage = stored();
    let mut registry = HandlerRegistry::<()>::new();
    registry
        .register("other", |_, v: &mut dyn StateVisitor| {
            v.object("not-there", 1, |_| Ok(()))
        })
        .unwrap();

    let err = registry.load(&mut (), &mut storage, "snap").unwrap_err();
    assert!(matches!(
        err,
        StateError::Handler { name: "other", .. }
    ));
    assert!(matches!(
        err.root_cause(),
        StateError::MissingObject(name) if name == "not-there"
    ));
}

#[test]
fn handler_leaving_an_object_open_is_reported() {
    let mut registry = HandlerRegistry::<()>::new();
    registry
        .register("leaky", |_, v: &mut dyn StateVisitor| v.begin_object("open", 1))
        .unwrap();
    registry
        .register("never", |_, _| panic!("runs after an unbalanced handler"))
        .unwrap();

    let err = registry
        .store(&mut (), &mut MemStorage::new(), "snap")
        .unwrap_err();
    assert!(matches!(
        err,
        StateError::Handler { name: "leaky", .. }
    ));
    assert!(matches!(err.root_cause(), StateError::UnbalancedObject));
}

#[test]
fn short_auxiliary_file_fails_restore() {
    let mut registry = HandlerRegistry::<[u8; 16]>::new();
    registry
        .register("ram", |ram: &mut [u8; 16], v: &mut dyn StateVisitor| {
            v.auxiliary_file("ram", ram)
        })
        .unwrap();

    let mut storage = MemStorage::new();
    registry.store(&mut [5u8; 16], &mut storage, "snap").unwrap();
    storage
        .write_file(&join_path("snap", "ram"), &[5u8; 8])
        .unwrap();

    let mut ram = [0u8; 16];
    let err = registry.load(&mut ram, &mut storage, "snap").unwrap_err();
    match err.root_cause() {
        StateError::File { path, source } => {
            assert_eq!(path, &join_path("snap", "ram"));
            assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof);
        }
        other => panic!("unexpected error {other:?}"),
    }
}
