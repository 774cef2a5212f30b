mod rdev;

pub use self::rdev::RdevActuator;

/// Narrow capability interface over synthetic keyboard input.
///
/// The player is the only caller, and always from a single thread; an
/// implementation does not need to tolerate interleaved calls. Failures
/// are terminal: a retried key press would desynchronize musical timing,
/// so errors propagate instead.
pub trait KeyActuator: Send + Sync {
    /// Emit a key-down for an opaque key identifier.
    fn key_down(&self, key: &str) -> anyhow::Result<()>;

    /// Emit a key-up for an opaque key identifier.
    fn key_up(&self, key: &str) -> anyhow::Result<()>;
}
