//! Process-wide registry of live native handles.
//!
//! Wrapper objects never hand their raw pointer to the host. Instead, the
//! first time a native object crosses the embedding boundary it is assigned a
//! [`HandleId`] here, and every subsequent operation resolves the id back to
//! the pointer after a liveness check. Ids are monotonically assigned and
//! never reissued, so a disposed handle stays invalid even if the native
//! allocator reuses the address behind it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use log::debug;
use once_cell::sync::Lazy;

use crate::cache;
use crate::errors::{BridgeError, Result};

/// Opaque identity of a wrapped native object, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper class tag, checked when a handle is passed back in as an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Dataset,
    Band,
    VrtSource,
}

impl HandleKind {
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Dataset => "Dataset",
            HandleKind::Band => "RasterBand",
            HandleKind::VrtSource => "VrtSimpleSource",
        }
    }
}

/// What to do with the native pointer when the handle is disposed.
pub(crate) enum Release {
    /// The wrapper owns the dataset and must `GDALClose` it.
    DatasetClose,
    /// The pointer is a boxed bridge-side object; reclaim the box.
    BoxedSource,
    /// The pointer is owned by a parent object; nothing to free.
    Borrowed,
}

struct Slot {
    ptr: usize,
    kind: HandleKind,
    alive: bool,
    release: Release,
    children: Vec<HandleId>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    slots: HashMap<u64, Slot>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(Default::default);

fn lock() -> std::sync::MutexGuard<'static, Registry> {
    match REGISTRY.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

/// Registers a native pointer and issues a fresh id for it.
pub(crate) fn add(ptr: usize, kind: HandleKind, release: Release) -> HandleId {
    let mut reg = lock();
    reg.next_id += 1;
    let id = HandleId(reg.next_id);
    reg.slots.insert(
        id.0,
        Slot {
            ptr,
            kind,
            alive: true,
            release,
            children: Vec::new(),
        },
    );
    debug!("registered {} handle {} [{:#x}]", kind.name(), id, ptr);
    id
}

/// Registers a pointer owned by `parent`; it is retired together with it.
pub(crate) fn add_child(parent: HandleId, ptr: usize, kind: HandleKind) -> Result<HandleId> {
    live_ptr(parent)?;
    let id = add(ptr, kind, Release::Borrowed);
    link_child(parent, id);
    Ok(id)
}

/// Records an existing handle as a child of `parent`. A no-op for duplicate
/// links and for parents already retired.
pub(crate) fn link_child(parent: HandleId, child: HandleId) {
    let mut reg = lock();
    if let Some(slot) = reg.slots.get_mut(&parent.0) {
        if slot.alive && !slot.children.contains(&child) {
            slot.children.push(child);
        }
    }
}

/// Whether the id refers to a live native object. Unknown and retired ids
/// both report `false`.
pub fn is_alive(id: HandleId) -> bool {
    lock().slots.get(&id.0).map(|s| s.alive).unwrap_or(false)
}

/// Resolves a live handle to its native pointer.
pub(crate) fn live_ptr(id: HandleId) -> Result<usize> {
    match lock().slots.get(&id.0) {
        Some(slot) if slot.alive => Ok(slot.ptr),
        _ => Err(BridgeError::UseAfterDispose { id }),
    }
}

/// Resolves a live handle, also checking its wrapper class.
pub(crate) fn live_ptr_of(id: HandleId, kind: HandleKind) -> Result<usize> {
    match lock().slots.get(&id.0) {
        Some(slot) if slot.alive && slot.kind == kind => Ok(slot.ptr),
        Some(slot) if slot.alive => Err(BridgeError::BadArgument {
            name: "handle",
            message: format!(
                "expected a {} handle, got a {} handle",
                kind.name(),
                slot.kind.name()
            ),
        }),
        _ => Err(BridgeError::UseAfterDispose { id }),
    }
}

pub(crate) fn kind_of(id: HandleId) -> Option<HandleKind> {
    lock().slots.get(&id.0).filter(|s| s.alive).map(|s| s.kind)
}

/// Retires a handle and releases the native object it owns.
///
/// Idempotent: explicit disposal by host code and end-of-life cleanup may
/// both ask for the same id. Children (e.g. band handles of a dataset) are
/// retired first, and the object cache is purged before the native pointer
/// is actually freed.
pub fn dispose(id: HandleId) {
    // Collect the subtree and mark it dead under the lock; free outside it.
    let mut to_release: Vec<(usize, HandleKind, Release)> = Vec::new();
    {
        let mut reg = lock();
        let mut stack = vec![id];
        let mut ordered = Vec::new();
        while let Some(next) = stack.pop() {
            if let Some(slot) = reg.slots.get(&next.0) {
                if slot.alive {
                    stack.extend(slot.children.iter().copied());
                    ordered.push(next);
                }
            }
        }
        // Children were pushed after their parent, so reversing the
        // traversal order releases leaves first.
        for handle in ordered.into_iter().rev() {
            if let Some(slot) = reg.slots.get_mut(&handle.0) {
                slot.alive = false;
                slot.children.clear();
                let release = std::mem::replace(&mut slot.release, Release::Borrowed);
                to_release.push((slot.ptr, slot.kind, release));
                debug!("disposed {} handle {}", slot.kind.name(), handle);
            }
        }
    }

    for (ptr, kind, release) in to_release {
        // Purge identity first; the address may be reused once freed.
        cache::remove(kind, ptr);
        match release {
            Release::DatasetClose => unsafe {
                gdal_sys::GDALClose(ptr as gdal_sys::GDALDatasetH);
            },
            Release::BoxedSource => unsafe {
                drop(Box::from_raw(ptr as *mut crate::vrt::SourceDef));
            },
            Release::Borrowed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_plain() -> HandleId {
        // A bogus but never-dereferenced pointer; Borrowed slots are never freed.
        add(0xdead_0000, HandleKind::Band, Release::Borrowed)
    }

    #[test]
    fn ids_are_monotonic_and_never_reissued() {
        let a = add_plain();
        let b = add_plain();
        assert!(b > a);
        dispose(a);
        let c = add_plain();
        assert!(c > b);
        assert_ne!(c, a);
    }

    #[test]
    fn dispose_is_permanent_and_idempotent() {
        let id = add_plain();
        assert!(is_alive(id));
        dispose(id);
        assert!(!is_alive(id));
        dispose(id);
        assert!(!is_alive(id));
        assert!(matches!(
            live_ptr(id),
            Err(BridgeError::UseAfterDispose { id: e }) if e == id
        ));
    }

    #[test]
    fn unknown_ids_are_not_alive() {
        assert!(!is_alive(HandleId(u64::MAX)));
    }

    #[test]
    fn children_are_retired_with_their_parent() {
        let parent = add(0xbeef_0000, HandleKind::Dataset, Release::Borrowed);
        let child = add_child(parent, 0xbeef_0010, HandleKind::Band).unwrap();
        assert!(is_alive(child));
        dispose(parent);
        assert!(!is_alive(parent));
        assert!(!is_alive(child));
    }

    #[test]
    fn child_of_dead_parent_is_rejected() {
        let parent = add(0xbeef_0100, HandleKind::Dataset, Release::Borrowed);
        dispose(parent);
        assert!(add_child(parent, 0xbeef_0110, HandleKind::Band).is_err());
    }

    #[test]
    fn kind_mismatch_is_a_bad_argument() {
        let id = add(0xbeef_0200, HandleKind::Dataset, Release::Borrowed);
        assert!(live_ptr_of(id, HandleKind::Dataset).is_ok());
        assert!(matches!(
            live_ptr_of(id, HandleKind::VrtSource),
            Err(BridgeError::BadArgument { .. })
        ));
        dispose(id);
    }
}
