//! Reflection configuration

/// How abstract interface methods hide each other across interface
/// hierarchies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideSemantics {
    /// An abstract method in a subinterface hides the superinterface's
    /// abstract declaration.
    #[default]
    Modern,
    /// Abstract interface methods never hide other abstract interface
    /// methods by subtyping alone; both stay visible as siblings.
    Legacy,
}

/// What a single-result lookup does when unrelated declarations compete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Pick the first candidate in resolution order (superclass
    /// contribution first, then direct interfaces in declaration order).
    #[default]
    DeclarationOrder,
    /// Report `ReflectError::AmbiguousMember`.
    Reject,
}

/// Configuration for the reflection runtime
#[derive(Debug, Clone)]
pub struct ReflectConfig {
    /// Publish and reuse resolved members (default: true)
    pub cache_enabled: bool,
    /// Emit a debug event for every cache lookup and publication (default: false)
    pub debug: bool,
    /// Interface hiding rules (default: Modern)
    pub override_semantics: OverrideSemantics,
    /// Tie-break for unrelated defaults (default: DeclarationOrder)
    pub ambiguity: AmbiguityPolicy,
    /// Snapshot attempts before an introspector race is treated as fatal (default: 16)
    pub snapshot_retries: usize,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        ReflectConfig {
            cache_enabled: true,
            debug: false,
            override_semantics: OverrideSemantics::Modern,
            ambiguity: AmbiguityPolicy::DeclarationOrder,
            snapshot_retries: 16,
        }
    }
}

impl ReflectConfig {
    /// Defaults overlaid with `RAYA_REFLECT_CACHE`, `RAYA_REFLECT_DEBUG` and
    /// `RAYA_REFLECT_LEGACY_OVERRIDES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup("RAYA_REFLECT_CACHE") {
            config.cache_enabled = parse_flag(&value);
        }
        if let Some(value) = lookup("RAYA_REFLECT_DEBUG") {
            config.debug = parse_flag(&value);
        }
        if let Some(value) = lookup("RAYA_REFLECT_LEGACY_OVERRIDES") {
            if parse_flag(&value) {
                config.override_semantics = OverrideSemantics::Legacy;
            }
        }
        config
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "off" | "false" | "no" | ""
    )
}
