//! Applier configuration.

/// Policy for extension-space instructions the applier does not know.
///
/// Core-grammar opcodes are a closed set; an unknown byte there is always
/// a fatal parse error. Extension records are length-prefixed and can be
/// stepped over, so the policy only governs those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOpcodePolicy {
    /// Reject the changeset.
    #[default]
    Fail,
    /// Step over the record and continue.
    Skip,
}

/// Whether strong-ownership cascade runs during apply.
///
/// Disabling cascade is only legal when the schema holds no strong
/// columns; the applier rejects the combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePolicy {
    /// Strong ownership is enforced (default).
    #[default]
    Enabled,
    /// No cascade; valid only for schemas without strong columns.
    Disabled,
}

/// How the applier drives the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Normal replay with change notifications.
    #[default]
    Normal,
    /// Offline rebuild: change notifications are suppressed.
    NonatomicRebuild,
}

/// Configuration recognized by an applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyConfig {
    /// Policy for unknown extension records.
    pub treat_unknown_opcode: UnknownOpcodePolicy,
    /// Cascade enforcement policy.
    pub cascade: CascadePolicy,
    /// Replay mode.
    pub apply_mode: ApplyMode,
}

impl ApplyConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unknown-opcode policy.
    pub fn with_unknown_opcode(mut self, policy: UnknownOpcodePolicy) -> Self {
        self.treat_unknown_opcode = policy;
        self
    }

    /// Sets the cascade policy.
    pub fn with_cascade(mut self, policy: CascadePolicy) -> Self {
        self.cascade = policy;
        self
    }

    /// Sets the apply mode.
    pub fn with_apply_mode(mut self, mode: ApplyMode) -> Self {
        self.apply_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ApplyConfig::new();
        assert_eq!(config.treat_unknown_opcode, UnknownOpcodePolicy::Fail);
        assert_eq!(config.cascade, CascadePolicy::Enabled);
        assert_eq!(config.apply_mode, ApplyMode::Normal);
    }

    #[test]
    fn builder() {
        let config = ApplyConfig::new()
            .with_unknown_opcode(UnknownOpcodePolicy::Skip)
            .with_apply_mode(ApplyMode::NonatomicRebuild);
        assert_eq!(config.treat_unknown_opcode, UnknownOpcodePolicy::Skip);
        assert_eq!(config.apply_mode, ApplyMode::NonatomicRebuild);
    }
}
