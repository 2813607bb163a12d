//! Pointer-keyed wrapper identity cache.
//!
//! Wrapping the same native pointer twice must yield the same handle, so
//! host-side reference equality keeps working. Entries are purged by
//! [`crate::registry::dispose`] while the native pointer is still valid;
//! a later wrap of a reused address then mints a fresh handle instead of
//! resurrecting the retired one.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::registry::{HandleId, HandleKind};

static CACHE: Lazy<Mutex<HashMap<(HandleKind, usize), HandleId>>> = Lazy::new(Default::default);

fn lock() -> std::sync::MutexGuard<'static, HashMap<(HandleKind, usize), HandleId>> {
    match CACHE.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

/// Returns the existing handle for `ptr`, or registers the one produced by
/// `factory`.
pub(crate) fn get_or_create(
    kind: HandleKind,
    ptr: usize,
    factory: impl FnOnce() -> HandleId,
) -> HandleId {
    let mut map = lock();
    if let Some(&id) = map.get(&(kind, ptr)) {
        return id;
    }
    let id = factory();
    map.insert((kind, ptr), id);
    id
}

/// Drops the identity mapping for `ptr`. Called exactly once, at disposal
/// time, before the native pointer is freed.
pub(crate) fn remove(kind: HandleKind, ptr: usize) {
    lock().remove(&(kind, ptr));
}
