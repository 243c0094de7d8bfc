//! Caches backing the checkout engine
//!
//! Two caches keep repeated checkouts cheap and adaptive:
//!
//! - [`RefCache`] deduplicates `git ls-remote` calls. The first request for a
//!   source starts the subprocess; every concurrent request for the same
//!   source awaits that same in-flight future, so a dependency tree that
//!   references one repository many times lists its refs exactly once.
//! - [`NoShallowCache`] remembers which hosts have rejected `--depth 1`
//!   clones. Entries are bounded and expire, so a transient server problem
//!   does not permanently condemn a host to full clones.
//!
//! Both caches are scoped to a [`GitCheckout`](crate::checkout::GitCheckout)
//! instance rather than being process-global, so independent engines do not
//! observe each other's state.

mod no_shallow;
mod refs;

pub use no_shallow::NoShallowCache;
pub use refs::RefCache;
