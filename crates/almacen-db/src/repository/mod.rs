//! # Repository Layer
//!
//! One repository per entity, each a thin async wrapper over the pool.
//!
//! ## Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Repository Pattern                             │
//! │                                                                     │
//! │  Service layer ──► Repository ──► SqlitePool ──► SQLite             │
//! │                                                                     │
//! │  • Repositories own SQL; callers never see query strings           │
//! │  • Row structs (#[derive(FromRow)]) stay private to each module    │
//! │  • Multi-statement invariants live in the checkout coordinator,    │
//! │    which borrows the pub(crate) transaction-scoped helpers below   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod customer;
pub mod invoice;
pub mod outbox;
pub mod product;
pub mod stock;
