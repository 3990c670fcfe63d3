//! Integration tests for `PolyBox`.
//!
//! - `test_emplace_replaces_value`: construct with an integer, then emplace a
//!   string; the integer is destroyed exactly once, before the string is built
//! - `test_moves_leave_source_empty`: every non-destructive move empties its
//!   source
//! - `test_copies_are_deep`: clones own their own value
//! - `test_trivial_types_share_tables`: one table per `(size, align)` shape
//! - `test_relocate_between_policies`: moving into other policies, or failing
//!   to
//! - `test_send_to_thread`: thread-safe containers cross threads
//! - `test_interior_mutability_inline`: shared access to an inline `Cell`

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    thread,
};

use polybox::{
    ContainerError, Placement, PolyBox, Shape,
    markers::Local,
    policy::{DefaultPolicy, InlineOnly, InlineOrHeap},
    space::{A8, A16},
};

type Small = InlineOrHeap<A8<16>>;

type Log = Rc<RefCell<Vec<String>>>;

/// Records its destruction in a shared log.
#[derive(Clone)]
struct Tracked {
    value: i32,
    log: Log,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.borrow_mut().push(format!("drop {}", self.value));
    }
}

#[test]
fn test_emplace_replaces_value() {
    let mut value: PolyBox<Small> = PolyBox::new(42i32);
    assert!(value.holds::<i32>());
    assert_eq!(value.get::<i32>(), Ok(&42));

    value.emplace(String::from("hello"));
    assert!(!value.holds::<i32>());
    assert!(value.holds::<String>());
    assert_eq!(value.get::<String>().map(String::as_str), Ok("hello"));

    // The same sequence with a value that records its destruction.
    let log = Log::default();
    let mut value: PolyBox<Small, Local> = PolyBox::new(Tracked {
        value: 42,
        log: log.clone(),
    });
    assert_eq!(value.get::<Tracked>().map(|tracked| tracked.value), Ok(42));

    let constructor_log = log.clone();
    value.emplace_with(move || {
        constructor_log.borrow_mut().push("construct hello".to_owned());
        String::from("hello")
    });
    assert_eq!(*log.borrow(), ["drop 42", "construct hello"]);
    assert_eq!(value.get::<String>().map(String::as_str), Ok("hello"));

    drop(value);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn test_moves_leave_source_empty() {
    fn assert_moved<T>(source: &PolyBox<Small, T>, target: &PolyBox<Small, T>) {
        assert!(source.is_empty());
        assert_eq!(source.type_token(), None);
        assert!(source.get::<u8>().is_err());
        assert!(!target.is_empty());
    }

    let mut inline: PolyBox<Small> = PolyBox::new(1u64);
    let taken = inline.take();
    assert_moved(&inline, &taken);

    let mut boxed: PolyBox<Small> = PolyBox::new(vec![1u8; 100].into_boxed_slice());
    let mut target: PolyBox<Small> = PolyBox::new_move_only([0u64; 4]);
    assert!(target.is_heap());
    target.assign_from(&mut boxed);
    assert_moved(&boxed, &target);
    assert_eq!(target.get::<Box<[u8]>>().map(|bytes| bytes.len()), Ok(100));

    // Moving an empty container yields an empty container.
    let mut empty: PolyBox<Small> = PolyBox::empty();
    assert!(empty.take().is_empty());
    assert!(empty.is_empty());

    // The by-value move is the destructive one.
    let moved = taken;
    assert_eq!(moved.get::<u64>(), Ok(&1));
}

#[test]
fn test_copies_are_deep() {
    let original: PolyBox<Small> = PolyBox::new(vec![String::from("a")]);
    let mut copy = original.try_clone().unwrap();
    copy.get_mut::<Vec<String>>().unwrap().push(String::from("b"));
    assert_eq!(original.get::<Vec<String>>().map(Vec::len), Ok(1));
    assert_eq!(copy.get::<Vec<String>>().map(Vec::len), Ok(2));

    let mut target: PolyBox<Small> = PolyBox::new(0u8);
    target.try_clone_from(&copy).unwrap();
    assert_eq!(target.get::<Vec<String>>().map(Vec::len), Ok(2));

    let heap: PolyBox<Small> = PolyBox::new([9u32; 16]);
    let heap_copy = heap.try_clone().unwrap();
    assert!(heap_copy.is_heap());
    assert_eq!(heap_copy.get::<[u32; 16]>(), Ok(&[9; 16]));

    let unique: PolyBox<Small> = PolyBox::new_move_only(5u8);
    assert!(!unique.is_cloneable());
    assert!(matches!(
        unique.try_clone(),
        Err(ContainerError::NotCopyable { type_name: "u8" })
    ));
}

#[test]
fn test_trivial_types_share_tables() {
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Point {
        x: f32,
        y: f32,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Millis(u64);

    let point: PolyBox = PolyBox::new_trivial(Point { x: 1.0, y: 2.0 });
    let millis: PolyBox = PolyBox::new_trivial(Millis(500));
    let raw: PolyBox = PolyBox::new_trivial(7u64);

    // `Point` is two `f32`s: same size as a `u64`, but aligned to 4.
    assert_eq!(Shape::of::<Millis>(), Shape::of::<u64>());
    assert_ne!(Shape::of::<Point>(), Shape::of::<u64>());

    // Tokens keep the types apart even when the table is shared.
    assert_ne!(millis.type_token(), raw.type_token());
    assert!(millis.get::<u64>().is_err());
    assert_eq!(millis.try_clone().unwrap().get::<Millis>(), Ok(&Millis(500)));
    assert_eq!(point.get::<Point>(), Ok(&Point { x: 1.0, y: 2.0 }));

    let mut a: PolyBox = PolyBox::new_trivial(Millis(1));
    let mut b: PolyBox = PolyBox::new_trivial(Millis(2));
    a.swap(&mut b);
    assert_eq!(a.get::<Millis>(), Ok(&Millis(2)));
    assert_eq!(b.get::<Millis>(), Ok(&Millis(1)));
}

#[test]
fn test_relocate_between_policies() {
    let value: PolyBox<DefaultPolicy> = PolyBox::new([3u16; 12]);
    assert!(value.is_inline());

    let (value, err) = value
        .relocate_into::<InlineOnly<A8<16>>>()
        .map(|_| ())
        .unwrap_err();
    assert_eq!(
        err,
        ContainerError::StorageTooSmall {
            needed_size: 24,
            needed_align: 2,
            capacity: 16,
            alignment: 8,
        }
    );
    assert_eq!(value.get::<[u16; 12]>(), Ok(&[3; 12]));

    let spilled = value.relocate_into::<Small>().unwrap();
    assert_eq!(spilled.placement(), Some(Placement::Heap));

    let back = spilled.relocate_into::<InlineOnly<A16<32>>>().unwrap();
    assert!(back.is_inline());
    assert_eq!(back.get::<[u16; 12]>(), Ok(&[3; 12]));
}

#[test]
fn test_send_to_thread() {
    let value: PolyBox = PolyBox::new(String::from("crosses threads"));
    let handle = thread::spawn(move || value.get::<String>().map(String::len));
    assert_eq!(handle.join().unwrap(), Ok(15));

    let shared: PolyBox = PolyBox::new(21u32);
    thread::scope(|scope| {
        scope.spawn(|| assert_eq!(shared.get::<u32>(), Ok(&21)));
        scope.spawn(|| assert_eq!(shared.get::<u32>(), Ok(&21)));
    });
}

#[test]
fn test_interior_mutability_inline() {
    let value: PolyBox<Small, Local> = PolyBox::new(Cell::new(1u32));
    assert!(value.is_inline());
    let cell = value.get::<Cell<u32>>().unwrap();
    cell.set(cell.get() + 1);
    assert_eq!(value.get::<Cell<u32>>().map(Cell::get), Ok(2));
}
