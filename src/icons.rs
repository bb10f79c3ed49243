//! Node symbol resolution.
//!
//! A symbol id is resolved at most once per process: memo, then the local
//! disk cache, then the server's symbol endpoint, then a static table of
//! upstream URLs. Misses are memoized as well, so a topology full of exotic
//! appliances costs one round of lookups per distinct symbol.

use crate::client::{Api, RequestKind};
use crate::raster;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Payloads this small are error pages or truncated downloads, not symbols.
pub const MIN_VALID_ICON_BYTES: usize = 100;

const SYMBOL_BASE_URL: &str = "https://raw.githubusercontent.com/GNS3/gns3-gui/master/resources/symbols";

/// Base filename → upstream symbol file, for servers that cannot serve them.
pub const FALLBACK_SYMBOLS: [(&str, &str); 17] = [
    ("router", "router.svg"),
    ("vpcs", "vpcs_guest.svg"),
    ("vpcs_guest", "vpcs_guest.svg"),
    ("cloud", "cloud.svg"),
    ("nat", "nat.svg"),
    ("atm_switch", "atm_switch.svg"),
    ("hub", "hub.svg"),
    ("ethernet_switch", "ethernet_switch.svg"),
    ("asa", "asa.svg"),
    ("computer", "computer.svg"),
    ("docker_guest", "docker_guest.svg"),
    ("firewall", "firewall.svg"),
    ("frame_relay_switch", "frame_relay_switch.svg"),
    ("multilayer_switch", "multilayer_switch.svg"),
    ("qemu_guest", "qemu_guest.svg"),
    ("vbox_guest", "vbox_guest.svg"),
    ("vmware_guest", "vmware_guest.svg"),
];

pub type IconBytes = Arc<Vec<u8>>;

static GLOBAL_ICON_CACHE: Lazy<Arc<IconCache>> = Lazy::new(|| Arc::new(IconCache::new()));

/// Symbol id → PNG bytes, or a remembered miss.
#[derive(Debug, Default)]
pub struct IconCache {
    entries: Mutex<HashMap<String, Option<IconBytes>>>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by every render.
    pub fn global() -> Arc<IconCache> {
        Arc::clone(&GLOBAL_ICON_CACHE)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// `Some(None)` for a memoized miss, `None` when never resolved.
    pub fn get(&self, symbol: &str) -> Option<Option<IconBytes>> {
        self.lock().get(symbol).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<IconBytes>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Anything the scene composer can ask for node icons.
pub trait IconLookup {
    fn lookup(&self, symbol: &str) -> Option<IconBytes>;
}

impl<F> IconLookup for F
where
    F: Fn(&str) -> Option<IconBytes>,
{
    fn lookup(&self, symbol: &str) -> Option<IconBytes> {
        self(symbol)
    }
}

/// Lookup that never finds anything; nodes fall back to colored shapes.
pub struct NoIcons;

impl IconLookup for NoIcons {
    fn lookup(&self, _symbol: &str) -> Option<IconBytes> {
        None
    }
}

pub struct IconResolver {
    api: Arc<dyn Api>,
    cache: Arc<IconCache>,
    cache_dir: Option<PathBuf>,
    icon_pixels: u32,
}

impl IconResolver {
    pub fn new(
        api: Arc<dyn Api>,
        cache: Arc<IconCache>,
        cache_dir: Option<PathBuf>,
        icon_pixels: u32,
    ) -> Self {
        Self {
            api,
            cache,
            cache_dir,
            icon_pixels: icon_pixels.max(1),
        }
    }

    pub fn resolve(&self, symbol: &str) -> Option<IconBytes> {
        if symbol.trim().is_empty() {
            return None;
        }

        // One lock around check → fetch → store: concurrent workers asking
        // for the same symbol wait for the first resolution instead of
        // racing it.
        let mut entries = self.cache.lock();
        if let Some(known) = entries.get(symbol) {
            return known.clone();
        }

        let base = symbol_base_name(symbol);
        tracing::debug!(symbol, base = %base, "resolving icon");
        let resolved = self.resolve_uncached(symbol, &base).map(Arc::new);
        if resolved.is_none() {
            tracing::debug!(symbol, "no icon found; caching miss");
        }
        entries.insert(symbol.to_string(), resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, symbol: &str, base: &str) -> Option<Vec<u8>> {
        let local_path = self.cache_dir.as_ref().map(|dir| dir.join(format!("{base}.svg")));

        if let Some(path) = &local_path
            && let Some(png) = self.from_disk(path)
        {
            return Some(png);
        }

        let symbol_url = self.api.url(&symbol_endpoint(symbol));
        if let Some(png) = self.from_remote(&symbol_url, RequestKind::Symbol, local_path.as_deref()) {
            return Some(png);
        }

        let fallback = fallback_symbol_url(base)?;
        self.from_remote(&fallback, RequestKind::Fallback, local_path.as_deref())
    }

    fn from_disk(&self, path: &Path) -> Option<Vec<u8>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read cached symbol");
                return None;
            }
        };
        if bytes.len() <= MIN_VALID_ICON_BYTES {
            return None;
        }
        raster::rasterize_icon(&bytes, self.icon_pixels)
    }

    fn from_remote(&self, url: &str, kind: RequestKind, persist_to: Option<&Path>) -> Option<Vec<u8>> {
        let fetched = match self.api.get(url, kind) {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::debug!(url, error = %err, "symbol fetch failed");
                return None;
            }
        };
        if fetched.status != 200 || fetched.body.len() <= MIN_VALID_ICON_BYTES {
            return None;
        }
        let png = raster::rasterize_icon(&fetched.body, self.icon_pixels)?;
        if let Some(path) = persist_to {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = fs::write(path, &fetched.body);
        }
        Some(png)
    }
}

impl IconLookup for IconResolver {
    fn lookup(&self, symbol: &str) -> Option<IconBytes> {
        self.resolve(symbol)
    }
}

/// Path segments of a symbol's raw endpoint. Slashes inside the symbol id
/// stay path separators; everything else is encoded per segment.
fn symbol_endpoint(symbol: &str) -> Vec<&str> {
    let mut segments = vec!["v2", "symbols"];
    segments.extend(symbol.split('/'));
    segments.push("raw");
    segments
}

/// `":/symbols/Classic/Router.svg"` → `"router"`.
pub fn symbol_base_name(symbol: &str) -> String {
    let last = symbol.rsplit('/').next().unwrap_or(symbol);
    Path::new(last)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn fallback_symbol_url(base: &str) -> Option<String> {
    FALLBACK_SYMBOLS
        .iter()
        .find(|(key, _)| *key == base)
        .map(|(_, file)| format!("{SYMBOL_BASE_URL}/{file}"))
}
