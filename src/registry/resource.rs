use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{EntryId, Registry};
use crate::error::{Error, Result};

/// Identifies a registered resource for quick updates without a path lookup.
pub type ResourceId = EntryId;

/// Bytes served for a resource.
///
/// The registry never copies or frees the bytes themselves. It only holds
/// whatever reference the caller hands it.
#[derive(Clone)]
pub enum Content {
    /// Bytes baked into the image.
    Static(&'static [u8]),
    /// Immutable bytes shared with the caller.
    Shared(Arc<[u8]>),
    /// A fixed buffer the firmware rewrites in place.
    Buffer(SharedBuffer),
}

impl Content {
    /// Real size of the backing bytes.
    pub fn capacity(&self) -> usize {
        match self {
            Content::Static(v) => v.len(),
            Content::Shared(v) => v.len(),
            Content::Buffer(v) => v.capacity(),
        }
    }
}

/// Bytes of a resource captured for sending.
///
/// Static and shared content is referenced. Buffer content is copied, so no
/// lock is held while the bytes go out.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Static(&'static [u8]),
    Shared(Arc<[u8]>, usize),
    Copied(Vec<u8>),
}

impl Deref for Snapshot {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match self {
            Snapshot::Static(v) => v,
            Snapshot::Shared(v, len) => &v[..*len],
            Snapshot::Copied(v) => v,
        }
    }
}

impl Content {
    /// Capture the first `len` bytes, clamped to the backing capacity.
    pub fn snapshot(&self, len: usize) -> Result<Snapshot> {
        let snapshot = match self {
            Content::Static(v) => Snapshot::Static(&v[..len.min(v.len())]),
            Content::Shared(v) => Snapshot::Shared(v.clone(), len.min(v.len())),
            Content::Buffer(v) => v.read(|b| {
                let b = &b[..len.min(b.len())];
                let mut copy = Vec::new();
                copy.try_reserve_exact(b.len())
                    .map_err(|_| Error::Alloc(b.len()))?;
                copy.extend_from_slice(b);
                Ok::<_, Error>(Snapshot::Copied(copy))
            })?,
        };
        Ok(snapshot)
    }
}

impl From<&'static [u8]> for Content {
    fn from(value: &'static [u8]) -> Self {
        Content::Static(value)
    }
}

impl From<&'static str> for Content {
    fn from(value: &'static str) -> Self {
        Content::Static(value.as_bytes())
    }
}

impl From<Arc<[u8]>> for Content {
    fn from(value: Arc<[u8]>) -> Self {
        Content::Shared(value)
    }
}

impl From<SharedBuffer> for Content {
    fn from(value: SharedBuffer) -> Self {
        Content::Buffer(value)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Content::Static(_) => "Static",
            Content::Shared(_) => "Shared",
            Content::Buffer(_) => "Buffer",
        };
        write!(f, "{}({}b)", kind, self.capacity())
    }
}

/// Fixed capacity buffer that can be rewritten while it is registered.
///
/// The capacity never changes after creation. What part of it is served is
/// decided by the resource length, see [`ResourceRegistry::truncate`].
#[derive(Clone)]
pub struct SharedBuffer(Arc<RwLock<Box<[u8]>>>);

impl SharedBuffer {
    /// Zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        let mut v: Vec<u8> = Vec::new();
        v.try_reserve_exact(capacity)
            .map_err(|_| Error::Alloc(capacity))?;
        v.resize(capacity, 0);
        Ok(v.into())
    }

    pub fn capacity(&self) -> usize {
        self.0.read().len()
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.0.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.0.write())
    }
}

impl From<Vec<u8>> for SharedBuffer {
    fn from(value: Vec<u8>) -> Self {
        SharedBuffer(Arc::new(RwLock::new(value.into_boxed_slice())))
    }
}

/// A registered GET-able resource.
///
/// Lookups hand out clones, so a request keeps serving what it captured even
/// if the entry is replaced meanwhile.
#[derive(Debug, Clone)]
pub struct Resource {
    mime: &'static str,
    content: Content,
    len: usize,
}

impl Resource {
    pub fn new(mime: &'static str, content: impl Into<Content>, len: usize) -> Self {
        Resource {
            mime,
            content: content.into(),
            len,
        }
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Declared length, which is not checked against the content capacity.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capture the bytes to serve, see [`Content::snapshot`].
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.content.snapshot(self.len)
    }
}

/// Either way of addressing a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    Path(&'a str),
    Id(ResourceId),
}

impl<'a> From<&'a str> for ResourceRef<'a> {
    fn from(value: &'a str) -> Self {
        ResourceRef::Path(value)
    }
}

impl From<ResourceId> for ResourceRef<'_> {
    fn from(value: ResourceId) -> Self {
        ResourceRef::Id(value)
    }
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    inner: RwLock<Registry<Resource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the resource at `path`.
    pub fn put(
        &self,
        path: &str,
        mime: &'static str,
        content: impl Into<Content>,
        len: usize,
    ) -> Result<ResourceId> {
        let resource = Resource::new(mime, content, len);

        let capacity = resource.content.capacity();
        if len > capacity {
            warn!(
                "Length of {} ({}b) exceeds its content ({}b)",
                path, len, capacity
            );
        }

        let (id, replaced) = self.inner.write().put(path, resource)?;

        if replaced.is_some() {
            info!("Replacing page \"{}\" -> \"{}\" ({}b)", path, mime, len);
        } else {
            info!("Registering page \"{}\" -> \"{}\" ({}b)", path, mime, len);
        }

        Ok(id)
    }

    pub fn get(&self, path: &str) -> Option<Resource> {
        self.inner.read().get(path).cloned()
    }

    pub fn get_by_id(&self, id: ResourceId) -> Option<Resource> {
        self.inner.read().get_by_id(id).cloned()
    }

    pub fn id_of(&self, path: &str) -> Option<ResourceId> {
        self.inner.read().id_of(path)
    }

    /// Set the served length of a resource, leaving its content alone.
    ///
    /// Does nothing if the resource does not exist.
    pub fn truncate<'a>(&self, target: impl Into<ResourceRef<'a>>, len: usize) {
        let mut inner = self.inner.write();

        let resource = match target.into() {
            ResourceRef::Path(path) => inner.get_mut(path),
            ResourceRef::Id(id) => inner.get_by_id_mut(id),
        };

        let Some(resource) = resource else {
            debug!("Truncate of missing page ignored");
            return;
        };

        let capacity = resource.content.capacity();
        if len > capacity {
            warn!("Truncate to {}b exceeds content of {}b", len, capacity);
        }

        trace!("Truncate page {}b -> {}b", resource.len, len);
        resource.len = len;
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        let removed = self.inner.write().remove(path);

        match removed {
            Some(_) => {
                info!("Removed page \"{}\"", path);
                Ok(())
            }
            None => Err(Error::NotFound(path.into())),
        }
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn shrink(&self) {
        self.inner.write().shrink();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.inner.read().iter().map(|(p, _)| p.to_string()).collect()
    }
}
