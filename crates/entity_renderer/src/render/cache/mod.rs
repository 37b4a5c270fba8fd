//! Versioned resource caches
//!
//! Every compiled GPU object is stamped with the versions of the data it was
//! built from. A lookup with a different stamp disposes the cached object
//! and compiles a replacement, so at most one version of an object is ever
//! alive.

mod keys;

pub use keys::{BindingSlot, DrawSlot, RendererKey};

use std::collections::hash_map::{Entry, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use log::debug;

use super::backends::vulkan::VulkanResult;
use super::gpu::GpuDevice;

/// Compiled object that remembers which source versions it came from
pub trait Versioned {
    /// Version information compared on lookup
    type Stamp: PartialEq + Debug;

    /// Stamp recorded at compile time
    fn stamp(&self) -> &Self::Stamp;
}

/// Map from cache key to the single live version of a compiled object
#[derive(Debug)]
pub struct VersionedCache<K, T> {
    entries: HashMap<K, T>,
}

impl<K, T> Default for VersionedCache<K, T> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K, T> VersionedCache<K, T>
where
    K: Copy + Eq + Hash + Debug,
    T: Versioned,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached object for a key, whatever its stamp
    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.get(key)
    }

    /// Whether the cached object for `key` was compiled from `stamp`
    pub fn is_current(&self, key: &K, stamp: &T::Stamp) -> bool {
        self.entries.get(key).is_some_and(|cached| cached.stamp() == stamp)
    }

    /// Reuse the cached object or replace it with a freshly compiled one
    ///
    /// When the cached stamp differs, `retire` receives the stale object
    /// before `compile` runs. Returns the live object and whether it was
    /// compiled by this call.
    pub fn get_or_compile<E>(
        &mut self,
        key: K,
        stamp: T::Stamp,
        compile: impl FnOnce() -> Result<T, E>,
        retire: impl FnOnce(T) -> Result<(), E>,
    ) -> Result<(&mut T, bool), E> {
        if self.entries.get(&key).is_some_and(|cached| *cached.stamp() != stamp) {
            if let Some(stale) = self.entries.remove(&key) {
                debug!("Retiring {key:?} compiled from {:?}, now {stamp:?}", stale.stamp());
                retire(stale)?;
            }
        }

        match self.entries.entry(key) {
            Entry::Occupied(slot) => Ok((slot.into_mut(), false)),
            Entry::Vacant(slot) => {
                let fresh = compile()?;
                debug!("Compiled {key:?}");
                Ok((slot.insert(fresh), true))
            }
        }
    }

    /// Remove every entry `keep` rejects, handing each to `retire`
    ///
    /// Stops at the first retire failure; entries not yet visited stay cached.
    pub fn sweep<E>(
        &mut self,
        mut keep: impl FnMut(&K, &T) -> bool,
        mut retire: impl FnMut(K, T) -> Result<(), E>,
    ) -> Result<usize, E> {
        let unused: Vec<K> = self
            .entries
            .iter()
            .filter(|&(key, value)| !keep(key, value))
            .map(|(key, _)| *key)
            .collect();

        let mut removed = 0;
        for key in unused {
            if let Some(value) = self.entries.remove(&key) {
                retire(key, value)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Empty the cache, yielding every entry
    pub fn drain(&mut self) -> impl Iterator<Item = (K, T)> + '_ {
        self.entries.drain()
    }

    /// Cached entries
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries.iter()
    }

    /// Number of cached objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Waits for the device to go idle at most once per operation
///
/// The first stale object found during an operation waits for the GPU to
/// finish with it; later ones in the same operation reuse that wait.
#[derive(Debug, Default)]
pub struct IdleLatch {
    waited: bool,
}

impl IdleLatch {
    /// Create an unlatched latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for device idle unless this latch already did
    pub fn wait_once<D: GpuDevice + ?Sized>(&mut self, device: &D) -> VulkanResult<()> {
        if !self.waited {
            device.wait_idle()?;
            self.waited = true;
        }
        Ok(())
    }
}
