#![deny(
    missing_docs,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Tracing events for heap blocks allocated by polybox containers.
//!
//! Values that do not fit the inline storage of their container are placed
//! in heap blocks. That is correct but often unintended, since avoiding the
//! heap is why the inline storage exists. This crate makes spills visible.
//!
//! # How It Works
//!
//! [`Traced`] wraps another [`Allocator`] and emits a `tracing` event with
//! the target [`ALLOC_TARGET`] for every block it hands out. Containers opt
//! in through their storage policy, usually [`TracedPolicy`].
//! [`SpillLayer`] is a subscriber layer that counts those events, for tests
//! and diagnostics.
//!
//! # Quick Start
//!
//! ```
//! use polybox::{PolyBox, space::A8};
//! use polybox_tracing::{SpillLayer, TracedPolicy};
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//!
//! let spills = SpillLayer::new();
//! let subscriber = Registry::default()
//!     .with(spills.clone())
//!     .with(tracing_subscriber::fmt::layer());
//!
//! tracing::subscriber::with_default(subscriber, || {
//!     let small: PolyBox<TracedPolicy<A8<16>>> = PolyBox::new(7u64);
//!     let large: PolyBox<TracedPolicy<A8<16>>> = PolyBox::new([0u64; 8]);
//!     assert!(small.is_inline());
//!     assert!(large.is_heap());
//! });
//!
//! assert_eq!(spills.stats().allocations(), 1);
//! assert_eq!(spills.stats().bytes(), 64);
//! ```
//!
//! # Environment Variables
//!
//! - `POLYBOX_TRACING` - Comma-separated options:
//!   - `deallocations` - Also emit an event when a block is released
//!   - `off` - Emit no events at all

use core::{alloc::Layout, fmt, marker::PhantomData, ptr::NonNull};
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicU64, Ordering},
};

use polybox::policy::{Allocator, Global, InlineOrHeap};
use tracing::field::{Field, Visit};

/// Target of every event emitted by [`Traced`].
pub const ALLOC_TARGET: &str = "polybox::alloc";

/// Storage policy with the inline buffer `B` that spills through a
/// [`Traced`] allocator.
pub type TracedPolicy<B, A = Global> = InlineOrHeap<B, Traced<A>>;

/// An [`Allocator`] that forwards to `A` and emits a `tracing` event for each
/// block.
///
/// Successful allocations are reported at the `TRACE` level, failed ones at
/// `WARN`. Every event carries the `size` and `align` of the block and a
/// `kind` field of `"allocate"`, `"deallocate"` or `"failure"`.
pub struct Traced<A = Global>(PhantomData<fn() -> A>);

impl<A> fmt::Debug for Traced<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Traced")
    }
}

#[derive(Debug, PartialEq, Eq)]
struct TraceOptions {
    enabled: bool,
    deallocations: bool,
}

impl TraceOptions {
    const DEFAULT: Self = Self {
        enabled: true,
        deallocations: false,
    };

    /// Parses the comma-separated value of `POLYBOX_TRACING`. Unknown options
    /// are ignored.
    fn parse(var: &str) -> Self {
        let mut options = Self::DEFAULT;
        for v in var.split(',').map(str::trim) {
            if v.eq_ignore_ascii_case("deallocations") {
                options.deallocations = true;
            } else if v.eq_ignore_ascii_case("off") {
                options.enabled = false;
            }
        }
        options
    }

    fn get() -> &'static Self {
        static POLYBOX_TRACING_FLAGS: OnceLock<TraceOptions> = OnceLock::new();

        POLYBOX_TRACING_FLAGS.get_or_init(|| match std::env::var_os("POLYBOX_TRACING") {
            Some(var) => Self::parse(&var.to_string_lossy()),
            None => Self::DEFAULT,
        })
    }
}

// SAFETY: Both guarantees are those of `A`, which receives every call
// unchanged.
unsafe impl<A: Allocator> Allocator for Traced<A> {
    unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: Forwarded caller contract.
        let block = unsafe { A::allocate(layout) };
        if TraceOptions::get().enabled {
            match block {
                Some(ptr) => tracing::trace!(
                    target: ALLOC_TARGET,
                    kind = "allocate",
                    size = layout.size(),
                    align = layout.align(),
                    ptr = ?ptr,
                    "allocated heap block"
                ),
                None => tracing::warn!(
                    target: ALLOC_TARGET,
                    kind = "failure",
                    size = layout.size(),
                    align = layout.align(),
                    "heap block allocation failed"
                ),
            }
        }
        block
    }

    unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
        let options = TraceOptions::get();
        if options.enabled && options.deallocations {
            tracing::trace!(
                target: ALLOC_TARGET,
                kind = "deallocate",
                size = layout.size(),
                align = layout.align(),
                ptr = ?ptr,
                "released heap block"
            );
        }
        // SAFETY: Forwarded caller contract.
        unsafe { A::deallocate(ptr, layout) }
    }
}

/// Counters updated by a [`SpillLayer`].
#[derive(Debug, Default)]
pub struct SpillStats {
    allocations: AtomicU64,
    bytes: AtomicU64,
    deallocations: AtomicU64,
    failures: AtomicU64,
}

impl SpillStats {
    /// Number of heap blocks allocated.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Total size of the allocated heap blocks.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Number of heap blocks released. Only counted when `POLYBOX_TRACING`
    /// contains `deallocations`.
    pub fn deallocations(&self) -> u64 {
        self.deallocations.load(Ordering::Relaxed)
    }

    /// Number of failed allocations.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// A tracing layer that counts the events emitted by [`Traced`].
///
/// Clones share their counters, so one clone can be added to a subscriber
/// while another is kept to read the [`stats`](SpillLayer::stats).
///
/// # Examples
///
/// ```
/// use polybox_tracing::SpillLayer;
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
///
/// let spills = SpillLayer::new();
/// let subscriber = Registry::default().with(spills.clone());
///
/// tracing::subscriber::with_default(subscriber, || {
///     // No traced containers are used here.
/// });
/// assert_eq!(spills.stats().allocations(), 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SpillLayer {
    stats: Arc<SpillStats>,
}

impl SpillLayer {
    /// Creates a layer with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters shared by this layer and its clones.
    pub fn stats(&self) -> &SpillStats {
        &self.stats
    }
}

/// Extracts the fields of one allocation event.
#[derive(Default)]
struct AllocVisitor {
    kind: Option<&'static str>,
    size: u64,
}

impl Visit for AllocVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "size" {
            self.size = value;
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "kind" {
            self.kind = ["allocate", "deallocate", "failure"]
                .into_iter()
                .find(|kind| *kind == value);
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl<S> tracing_subscriber::Layer<S> for SpillLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if event.metadata().target() != ALLOC_TARGET {
            return;
        }

        let mut visitor = AllocVisitor::default();
        event.record(&mut visitor);
        match visitor.kind {
            Some("allocate") => {
                self.stats.allocations.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes.fetch_add(visitor.size, Ordering::Relaxed);
            }
            Some("deallocate") => {
                self.stats.deallocations.fetch_add(1, Ordering::Relaxed);
            }
            Some("failure") => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}
