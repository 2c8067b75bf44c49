use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const ITEM_KEY_PREFIX: &str = "np-store-";

/// The document a viewer was opened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerItem {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ViewerItem {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

pub trait ItemStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<ViewerItem>>;
    fn store(&self, key: &str, item: &ViewerItem) -> Result<()>;
    /// Returns whether an entry was removed.
    fn remove(&self, key: &str) -> Result<bool>;
}

fn prefixed(key: &str) -> String {
    format!("{ITEM_KEY_PREFIX}{key}")
}

pub struct FileItemStore {
    root: PathBuf,
}

impl FileItemStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create item directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", prefixed(key)))
    }
}

impl ItemStore for FileItemStore {
    fn get(&self, key: &str) -> Result<Option<ViewerItem>> {
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut file =
            File::open(&path).with_context(|| format!("failed to open item file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let item = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode item file {:?}", path))?;
        Ok(Some(item))
    }

    fn store(&self, key: &str, item: &ViewerItem) -> Result<()> {
        let path = self.item_path(key);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(item)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp item file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("failed to remove item file {:?}", path))?;
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryItemStore {
    inner: Mutex<HashMap<String, ViewerItem>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItemStore for MemoryItemStore {
    fn get(&self, key: &str) -> Result<Option<ViewerItem>> {
        Ok(self.inner.lock().get(&prefixed(key)).cloned())
    }

    fn store(&self, key: &str, item: &ViewerItem) -> Result<()> {
        self.inner.lock().insert(prefixed(key), item.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().remove(&prefixed(key)).is_some())
    }
}

/// Where leaving the viewer should take the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackTarget {
    Pop,
    Details { slug: String },
    Root,
}

/// Remembers the viewed item across restarts and decides where "back" goes.
pub struct ViewerSession {
    store: Arc<dyn ItemStore>,
    key: String,
    slug: Option<String>,
}

impl ViewerSession {
    pub fn new(store: Arc<dyn ItemStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            slug: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// A given item wins and is remembered; otherwise the stored one is used.
    /// Store failures never prevent viewing.
    pub fn restore(&self, given: Option<ViewerItem>) -> Option<ViewerItem> {
        match given {
            Some(item) => {
                if let Err(err) = self.store.store(&self.key, &item) {
                    warn!(key = %self.key, error = %format!("{err:#}"), "failed to remember item");
                }
                Some(item)
            }
            None => match self.store.get(&self.key) {
                Ok(item) => {
                    debug!(key = %self.key, restored = item.is_some(), "item lookup");
                    item
                }
                Err(err) => {
                    warn!(key = %self.key, error = %format!("{err:#}"), "stored item unreadable");
                    None
                }
            },
        }
    }

    /// Forgets the stored item and picks the back target.
    pub fn back_target(&self, can_pop: bool) -> BackTarget {
        if let Err(err) = self.store.remove(&self.key) {
            warn!(key = %self.key, error = %format!("{err:#}"), "failed to forget item");
        }
        if can_pop {
            BackTarget::Pop
        } else if let Some(slug) = &self.slug {
            BackTarget::Details { slug: slug.clone() }
        } else {
            BackTarget::Root
        }
    }
}
