#![forbid(unsafe_code)]

//! Observer construction.
//!
//! [`ObserverProvider`] owns the member resolver and provider-wide
//! configuration, parses path strings (keeping a bounded cache of parsed
//! paths), and picks the observer shape from the path length.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use pathbind_core::{MemberPath, MemberResolver, Object};
use tracing::{debug, trace};

use crate::config::{ObserverOptions, ProviderConfig};
use crate::error::ObserverError;
use crate::observer::{
    EmptyPathObserver, EmptyWalker, MemberPathObserver, MultiPathObserver, MultiWalker,
    SinglePathObserver, SingleWalker,
};

/// Path part of an [`ObserverRequest`].
#[derive(Debug, Clone)]
pub enum PathSource {
    Text(String),
    Parsed(MemberPath),
}

/// What to observe, relative to a root object.
#[derive(Debug, Clone)]
pub struct ObserverRequest {
    pub path: PathSource,
    /// `None` uses the provider's default options.
    pub options: Option<ObserverOptions>,
}

impl ObserverRequest {
    #[must_use]
    pub fn new(path: impl Into<ObserverRequest>) -> Self {
        path.into()
    }

    #[must_use]
    pub fn with_options(mut self, options: ObserverOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl From<&str> for ObserverRequest {
    fn from(path: &str) -> Self {
        Self {
            path: PathSource::Text(path.to_owned()),
            options: None,
        }
    }
}

impl From<String> for ObserverRequest {
    fn from(path: String) -> Self {
        Self {
            path: PathSource::Text(path),
            options: None,
        }
    }
}

impl From<MemberPath> for ObserverRequest {
    fn from(path: MemberPath) -> Self {
        Self {
            path: PathSource::Parsed(path),
            options: None,
        }
    }
}

/// Creates path observers over one member resolver.
pub struct ObserverProvider {
    resolver: Arc<dyn MemberResolver>,
    config: ProviderConfig,
    paths: Mutex<HashMap<String, MemberPath>>,
}

impl ObserverProvider {
    pub fn new(resolver: Arc<dyn MemberResolver>) -> Self {
        Self::with_config(resolver, ProviderConfig::default())
    }

    pub fn with_config(resolver: Arc<dyn MemberResolver>, config: ProviderConfig) -> Self {
        Self {
            resolver,
            config,
            paths: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Parse `text`, reusing a previously parsed path when cached.
    ///
    /// The cache is cleared wholesale once it reaches capacity.
    pub fn member_path(&self, text: &str) -> Result<MemberPath, ObserverError> {
        let capacity = self.config.path_cache_capacity;
        if capacity == 0 {
            return Ok(MemberPath::parse(text)?);
        }
        if let Some(path) = self
            .paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return Ok(path.clone());
        }
        let path = MemberPath::parse(text)?;
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        if paths.len() >= capacity {
            trace!(evicted = paths.len(), "path cache full; cleared");
            paths.clear();
        }
        paths.insert(text.to_owned(), path.clone());
        Ok(path)
    }

    /// Number of parsed paths currently cached.
    #[must_use]
    pub fn cached_paths(&self) -> usize {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Create an observer for `request` rooted at `target`.
    ///
    /// Only path syntax errors fail here; member resolution problems are
    /// reported by the observer itself.
    pub fn observe(
        &self,
        target: &Object,
        request: impl Into<ObserverRequest>,
    ) -> Result<Arc<dyn MemberPathObserver>, ObserverError> {
        let request = request.into();
        let path = match request.path {
            PathSource::Text(text) => self.member_path(&text)?,
            PathSource::Parsed(path) => path,
        };
        let options = request
            .options
            .unwrap_or_else(|| self.config.default_options.clone());
        let resolver = Arc::clone(&self.resolver);

        let observer: Arc<dyn MemberPathObserver> = match path.len() {
            0 => EmptyPathObserver::new(target, path, options, resolver, EmptyWalker),
            1 => SinglePathObserver::new(target, path, options, resolver, SingleWalker),
            _ => MultiPathObserver::new(target, path, options, resolver, MultiWalker),
        };
        debug!(
            path = %observer.path(),
            kind = ?observer.kind(),
            target = target.type_key().name(),
            "observer created"
        );
        Ok(observer)
    }
}

impl std::fmt::Debug for ObserverProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverProvider")
            .field("config", &self.config)
            .field("cached_paths", &self.cached_paths())
            .finish_non_exhaustive()
    }
}
