#![forbid(unsafe_code)]

//! Observer and provider configuration.
//!
//! [`ObserverOptions`] travels with each observer request. [`ProviderConfig`]
//! holds provider-wide defaults and can be overlaid from `PATHBIND_*`
//! environment variables:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `PATHBIND_WEAK_TARGETS` | default `weak_target` |
//! | `PATHBIND_STABLE_PATHS` | default `stable_path` |
//! | `PATHBIND_OPTIONAL_PATHS` | default `optional` |
//! | `PATHBIND_METHOD_EVENT_SUFFIX` | default `method_event_suffix` |
//! | `PATHBIND_PATH_CACHE_CAPACITY` | `path_cache_capacity` |
//!
//! Boolean variables accept `1`, `true`, `yes`, `on` (case-insensitive);
//! anything else reads as `false`. Unparsable numbers are ignored.

use pathbind_core::MemberFlags;

/// Suffix appended to a method name to find its change event.
pub const DEFAULT_METHOD_EVENT_SUFFIX: &str = "Changed";

/// Default number of parsed paths kept by the provider.
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 256;

/// Per-observer behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ObserverOptions {
    /// Lookup policy passed to the member resolver.
    pub member_flags: MemberFlags,
    /// A missing member makes the path unavailable instead of failing.
    pub optional: bool,
    /// Resolve each hop's member once and reuse it while the owner's runtime
    /// type stays the same.
    pub stable_path: bool,
    /// Subscribe to hop changes. `false` gives one-time reads.
    pub observable: bool,
    /// Drop [`MemberFlags::ATTACHED`] from lookups.
    pub ignore_attached_members: bool,
    /// Hold the root object through a weak handle.
    pub weak_target: bool,
    /// The last segment names a zero-argument method observed through a
    /// companion event.
    pub method_terminal: bool,
    /// Companion event suffix for method terminals.
    pub method_event_suffix: String,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            member_flags: MemberFlags::default(),
            optional: false,
            stable_path: false,
            observable: true,
            ignore_attached_members: false,
            weak_target: true,
            method_terminal: false,
            method_event_suffix: DEFAULT_METHOD_EVENT_SUFFIX.to_owned(),
        }
    }
}

impl ObserverOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_member_flags(mut self, flags: MemberFlags) -> Self {
        self.member_flags = flags;
        self
    }

    #[must_use]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_stable_path(mut self, stable: bool) -> Self {
        self.stable_path = stable;
        self
    }

    #[must_use]
    pub fn with_observable(mut self, observable: bool) -> Self {
        self.observable = observable;
        self
    }

    #[must_use]
    pub fn with_ignore_attached_members(mut self, ignore: bool) -> Self {
        self.ignore_attached_members = ignore;
        self
    }

    #[must_use]
    pub fn with_weak_target(mut self, weak: bool) -> Self {
        self.weak_target = weak;
        self
    }

    /// Treat the last segment as a method observed via `<name><suffix>`.
    #[must_use]
    pub fn with_method_terminal(mut self, suffix: impl Into<String>) -> Self {
        self.method_terminal = true;
        self.method_event_suffix = suffix.into();
        self
    }

    /// Flags actually handed to the resolver.
    #[must_use]
    pub fn effective_flags(&self) -> MemberFlags {
        if self.ignore_attached_members {
            self.member_flags - MemberFlags::ATTACHED
        } else {
            self.member_flags
        }
    }
}

/// Provider-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProviderConfig {
    /// Options for requests that do not carry their own.
    pub default_options: ObserverOptions,
    /// Parsed path strings kept for reuse. `0` disables caching.
    pub path_cache_capacity: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_options: ObserverOptions::default(),
            path_cache_capacity: DEFAULT_PATH_CACHE_CAPACITY,
        }
    }
}

#[inline]
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl ProviderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_options(mut self, options: ObserverOptions) -> Self {
        self.default_options = options;
        self
    }

    #[must_use]
    pub fn with_path_cache_capacity(mut self, capacity: usize) -> Self {
        self.path_cache_capacity = capacity;
        self
    }

    /// Defaults overlaid with `PATHBIND_*` process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with variables read through `get_env`.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let options = &mut config.default_options;
        if let Some(value) = get_env("PATHBIND_WEAK_TARGETS") {
            options.weak_target = env_flag(&value);
        }
        if let Some(value) = get_env("PATHBIND_STABLE_PATHS") {
            options.stable_path = env_flag(&value);
        }
        if let Some(value) = get_env("PATHBIND_OPTIONAL_PATHS") {
            options.optional = env_flag(&value);
        }
        if let Some(value) = get_env("PATHBIND_METHOD_EVENT_SUFFIX") {
            let value = value.trim();
            if !value.is_empty() {
                options.method_event_suffix = value.to_owned();
            }
        }
        if let Some(capacity) =
            get_env("PATHBIND_PATH_CACHE_CAPACITY").and_then(|v| v.trim().parse().ok())
        {
            config.path_cache_capacity = capacity;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let options = ObserverOptions::default();
        assert!(options.observable);
        assert!(options.weak_target);
        assert!(!options.optional);
        assert!(!options.stable_path);
        assert!(!options.method_terminal);
        assert_eq!(options.method_event_suffix, "Changed");
        assert_eq!(
            ProviderConfig::default().path_cache_capacity,
            DEFAULT_PATH_CACHE_CAPACITY
        );
    }

    #[test]
    fn builder_chain() {
        let options = ObserverOptions::new()
            .with_optional(true)
            .with_stable_path(true)
            .with_observable(false)
            .with_weak_target(false)
            .with_method_terminal("Updated");
        assert!(options.optional);
        assert!(options.stable_path);
        assert!(!options.observable);
        assert!(!options.weak_target);
        assert!(options.method_terminal);
        assert_eq!(options.method_event_suffix, "Updated");
    }

    #[test]
    fn ignore_attached_strips_flag() {
        let options = ObserverOptions::new().with_ignore_attached_members(true);
        assert!(!options.effective_flags().contains(MemberFlags::ATTACHED));
        assert!(
            ObserverOptions::new()
                .effective_flags()
                .contains(MemberFlags::ATTACHED)
        );
    }

    #[test]
    fn env_overlay() {
        let config = ProviderConfig::from_env_with(env(&[
            ("PATHBIND_WEAK_TARGETS", "off"),
            ("PATHBIND_STABLE_PATHS", " YES "),
            ("PATHBIND_OPTIONAL_PATHS", "1"),
            ("PATHBIND_METHOD_EVENT_SUFFIX", "Updated"),
            ("PATHBIND_PATH_CACHE_CAPACITY", "8"),
        ]));
        assert!(!config.default_options.weak_target);
        assert!(config.default_options.stable_path);
        assert!(config.default_options.optional);
        assert_eq!(config.default_options.method_event_suffix, "Updated");
        assert_eq!(config.path_cache_capacity, 8);
    }

    #[test]
    fn env_garbage_is_ignored_or_false() {
        let config = ProviderConfig::from_env_with(env(&[
            ("PATHBIND_STABLE_PATHS", "maybe"),
            ("PATHBIND_PATH_CACHE_CAPACITY", "lots"),
            ("PATHBIND_METHOD_EVENT_SUFFIX", "  "),
        ]));
        assert!(!config.default_options.stable_path);
        assert_eq!(config.path_cache_capacity, DEFAULT_PATH_CACHE_CAPACITY);
        assert_eq!(config.default_options.method_event_suffix, "Changed");
    }

    #[test]
    fn empty_env_is_default() {
        assert_eq!(ProviderConfig::from_env_with(|_| None), ProviderConfig::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_round_trips_through_json() {
        let config = ProviderConfig::new()
            .with_path_cache_capacity(4)
            .with_default_options(ObserverOptions::new().with_stable_path(true));
        let json = serde_json::to_string(&config).unwrap();
        let back: ProviderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        let partial: ObserverOptions = serde_json::from_str(r#"{"optional":true}"#).unwrap();
        assert!(partial.optional);
        assert!(partial.observable);
    }
}
