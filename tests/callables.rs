//! Integration tests for `PolyFn`.
//!
//! - `test_plain_function_and_heap_closure`: a plain function and an
//!   oversized capturing closure give the same results
//! - `test_empty_call_panics_every_time`: calling an empty callable never
//!   returns a value
//! - `test_instance_as_first_argument`: methods bound through a plain
//!   function taking the instance
//! - `test_target_panics_propagate`: the target's own panics reach the caller
//! - `test_copies_call_independent_state`: cloned targets do not share state

use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

use polybox::{
    ContainerError, PolyFn,
    markers::Local,
    policy::{DefaultPolicy, InlineOrHeap},
    space::A8,
};

type Matcher = fn(*mut u8, u64) -> bool;

/// Returns `true` if the first `len` bytes at `ptr` are all ASCII digits.
fn all_digits(ptr: *mut u8, len: u64) -> bool {
    let Ok(len) = usize::try_from(len) else {
        return false;
    };
    // SAFETY: Every caller in this file passes a buffer of at least `len`
    // bytes.
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
    bytes.iter().all(u8::is_ascii_digit)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

#[test]
fn test_plain_function_and_heap_closure() {
    let mut digits = *b"12345abc";
    let ptr = digits.as_mut_ptr();

    let direct: PolyFn<Matcher> = PolyFn::new(all_digits);
    assert!(direct.is_inline());
    assert_eq!(direct.call(ptr, 5), all_digits(ptr, 5));
    assert_eq!(direct.call(ptr, 6), all_digits(ptr, 6));

    let pointer: PolyFn<Matcher> = PolyFn::new(all_digits as Matcher);
    assert_eq!(pointer.call(ptr, 5), all_digits(ptr, 5));

    // 64 bytes of captured state do not fit the default 24 inline bytes.
    let allowed = [true; 64];
    let oversized: PolyFn<Matcher> = PolyFn::new(move |ptr: *mut u8, len: u64| {
        let Ok(len) = usize::try_from(len) else {
            return false;
        };
        // SAFETY: Every caller in this file passes a buffer of at least `len`
        // bytes.
        let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
        bytes
            .iter()
            .all(|&byte| byte.is_ascii_digit() && allowed[usize::from(byte) % 64])
    });
    assert!(!oversized.is_inline());
    assert_eq!(oversized.call(ptr, 5), all_digits(ptr, 5));
    assert_eq!(oversized.call(ptr, 6), all_digits(ptr, 6));

    // Moving the heap target keeps its trampoline.
    let mut oversized = oversized;
    let moved = oversized.take();
    assert!(oversized.is_empty());
    assert!(moved.call(ptr, 5));
}

#[test]
fn test_empty_call_panics_every_time() {
    let empty: PolyFn<fn(u32) -> u32> = PolyFn::empty();
    let mut panics = 0;
    for _ in 0..3 {
        let result = panic::catch_unwind(AssertUnwindSafe(|| empty.call(1)));
        let Err(payload) = result else {
            panic!("an empty callable returned a value");
        };
        assert_eq!(panic_message(&*payload), Some("called an empty PolyFn"));
        panics += 1;
    }
    assert_eq!(panics, 3);
    assert_eq!(
        ContainerError::EmptyInvocation.to_string(),
        "called an empty PolyFn"
    );

    for _ in 0..3 {
        assert_eq!(empty.try_call(1), Err(ContainerError::EmptyInvocation));
    }

    // A reset callable behaves like one that was never bound.
    let mut reset: PolyFn<fn(u32) -> u32> = PolyFn::new(|x: u32| x + 1);
    assert_eq!(reset.try_call(1), Ok(2));
    reset.reset();
    assert!(panic::catch_unwind(AssertUnwindSafe(|| reset.call(1))).is_err());
    assert_eq!(reset.try_call(1), Err(ContainerError::EmptyInvocation));

    let default: PolyFn<fn()> = PolyFn::default();
    assert!(default.is_empty());
    assert_eq!(format!("{default:?}"), "PolyFn(<empty>)");
}

#[test]
fn test_instance_as_first_argument() {
    struct Sensor {
        reads: AtomicU32,
        offset: u32,
    }

    impl Sensor {
        fn read(&self) -> u32 {
            self.reads.fetch_add(1, Ordering::Relaxed) + self.offset
        }
    }

    let sensor: &'static Sensor = Box::leak(Box::new(Sensor {
        reads: AtomicU32::new(0),
        offset: 100,
    }));

    let read: PolyFn<fn(&'static Sensor) -> u32> = PolyFn::new(Sensor::read);
    assert_eq!(read.call(sensor), 100);
    assert_eq!(read.call(sensor), 101);
    assert_eq!(sensor.reads.load(Ordering::Relaxed), 2);

    // Function items carry no state, so the target is zero-sized and inline
    // under any policy.
    let tiny: PolyFn<fn(&'static Sensor) -> u32, InlineOrHeap<A8<8>>> =
        PolyFn::new_trivial(Sensor::read);
    assert!(tiny.is_inline());
    assert_eq!(tiny.call(sensor), 102);
}

#[test]
fn test_target_panics_propagate() {
    let fails: PolyFn<fn(u8) -> u8> = PolyFn::new(|x: u8| {
        assert!(x < 10, "too large: {x}");
        x
    });
    assert_eq!(fails.call(3), 3);

    let payload = panic::catch_unwind(AssertUnwindSafe(|| fails.call(12))).unwrap_err();
    assert_eq!(panic_message(&*payload), Some("too large: 12"));

    // The callable is still bound and usable after the panic.
    assert_eq!(fails.try_call(4), Ok(4));
}

#[test]
fn test_copies_call_independent_state() {
    #[derive(Clone)]
    struct Accumulate {
        total: Rc<Cell<u64>>,
        weight: u64,
    }

    let total = Rc::new(Cell::new(0));
    let state = Accumulate {
        total: total.clone(),
        weight: 2,
    };
    let add: PolyFn<fn(u64), DefaultPolicy, Local> = PolyFn::new(move |x: u64| {
        state.total.set(state.total.get() + x * state.weight);
    });
    add.call(5);
    assert_eq!(total.get(), 10);

    // The copy owns its own `Accumulate`, which still points at the same
    // shared total.
    let copy = add.try_clone().unwrap();
    drop(add);
    copy.call(1);
    assert_eq!(total.get(), 12);
    assert_eq!(Rc::strong_count(&total), 2);

    drop(copy);
    assert_eq!(Rc::strong_count(&total), 1);
}
