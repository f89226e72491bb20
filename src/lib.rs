//! # tagheap - A Boundary-Tag Free-List Heap Allocator
//!
//! This crate implements the classic **boundary-tag, explicit-free-list**
//! allocation algorithm over a single growable arena obtained from a
//! break-style memory source: next-fit search, block splitting, and eager
//! four-way coalescing of freed neighbors.
//!
//! ## Overview
//!
//! ```text
//!   The Arena:
//!
//!   ┌──────────┬───────────────┬──────────────┬───────────────┬─────────┐
//!   │ Sentinel │  Free Block   │  Allocated   │  Free Block   │  ...    │
//!   │ (size 0) │               │    Block     │               │         │
//!   └──────────┴───────────────┴──────────────┴───────────────┴─────────┘
//!   low addresses                                        high addresses
//!
//!   The arena grows upward, one page at a time, as the memory source
//!   extends its contiguous byte range.
//! ```
//!
//! Every block, free or allocated, is bracketed by a pair of boundary
//! tags, one allocation unit each:
//!
//! ```text
//!   Single Block (N payload units):
//!
//!   ┌────────────────┬─────────────────────────────┬────────────────┐
//!   │     Header     │           Payload           │     Footer     │
//!   │ ┌────────────┐ │                             │ ┌────────────┐ │
//!   │ │ size: N    │ │        N × UNIT bytes       │ │ size: N    │ │
//!   │ │ link: fwd  │ │                             │ │ link: bwd  │ │
//!   │ └────────────┘ │                             │ └────────────┘ │
//!   └────────────────┴─────────────────────────────┴────────────────┘
//!                    ▲
//!                    └── payload offset handed to the caller
//! ```
//!
//! Free blocks thread a circular doubly-linked list through their own
//! tags: the header link points forward, the footer link points backward,
//! and a permanent size-0 sentinel anchors the ring. Allocated blocks
//! clear both links, which is also how physical neighbors are recognized
//! as free or not during coalescing; the list order itself carries no
//! address meaning.
//!
//! ```text
//!   Free List (circular, threaded through the blocks):
//!
//!        ┌─────▶ Sentinel ──────▶ Free A ──────▶ Free B ─────┐
//!        │                                                   │
//!        └───────────────────────◀───────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagheap
//!   ├── units   - Allocation-unit granularity (units! macro)
//!   ├── tag     - Boundary tags and index arithmetic (internal layout)
//!   ├── source  - Memory sources (VecSource, SbrkSource)
//!   └── heap    - The allocator: allocate, free, resize, free_bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagheap::{Heap, VecSource};
//!
//! let mut heap = Heap::new(VecSource::new());
//!
//! // Allocate, use, resize, free
//! let p = heap.allocate(24).expect("arena can grow");
//! heap.payload_mut(p)[..4].copy_from_slice(b"data");
//!
//! let p = heap.resize(Some(p), 4096).expect("arena can grow");
//! assert_eq!(&heap.payload(p)[..4], b"data");
//!
//! heap.free(Some(p));
//! assert!(heap.free_bytes() > 0);
//! ```
//!
//! Payload handles are byte offsets into the arena, not raw pointers:
//! the whole allocator is index arithmetic over one byte slice, so heap
//! corruption surfaces as a panic in a tag accessor instead of undefined
//! behavior.
//!
//! ## Failure Model
//!
//! - **Exhaustion** of the memory source is the one recoverable failure:
//!   `allocate` and `resize` return `None` and no state changes.
//! - **Contract breaches** (freeing a handle this heap never produced,
//!   double-freeing, corrupted tags) panic. The allocator does not track
//!   live allocations, so detection is best-effort, as with any
//!   `malloc`-style interface.
//!
//! ## Limitations
//!
//! - **Single-threaded**: no internal synchronization; wrap the heap in
//!   external mutual exclusion if it must be shared.
//! - **Single arena**: one contiguous range, one free list, no size
//!   classes.
//! - **No shrink-to-fit**: resizing downward keeps the block's full
//!   extent.

pub mod heap;
pub mod source;
pub mod tag;
pub mod units;

pub use heap::Heap;
#[cfg(unix)]
pub use source::SbrkSource;
pub use source::{MemorySource, VecSource};
