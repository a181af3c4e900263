//! DNS resolution subsystem.
//!
//! # Data Flow
//! ```text
//! ResolveDNS(hostname, use_cache)
//!     → cache.rs (fresh entry? return it, count a hit)
//!     → resolver.rs DnsResolver
//!         → circuit breaker (fail fast while resolvers are down)
//!         → FallbackResolver: nameserver 1 → nameserver 2 → … → system resolver
//!     → success: cache.rs insert (evict oldest at capacity)
//!     → failure: cache.rs stale entry, else DnsResolutionFailed
//!
//! Monitor cycle:
//!     → cache.rs purge entries older than 2 × TTL
//! ```
//!
//! # Design Decisions
//! - Entries between 1× and 2× TTL are never served fresh, only as fallback
//! - Hostnames are cached case-insensitively
//! - The pool's connector resolves through the same cache

pub mod cache;
pub mod resolver;

pub use cache::{DnsCache, DnsCacheEntry};
pub use resolver::{
    DnsResolver, FallbackResolver, Lookup, LookupError, NameserverLookup, SystemLookup,
};
