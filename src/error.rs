//! Error type shared by the portable core and the platform backends.

use crate::runtime::Eye;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No head-mounted display is attached, or the runtime refused to hand one out.
    #[error("head-mounted display not detected")]
    HeadsetNotFound,

    /// The runtime lost the display mid-session; a full re-initialization may recover it.
    #[error("head-mounted display lost")]
    DisplayLost,

    #[error("{eye:?} eye ring expects {expected} textures but the runtime provided {actual}")]
    RingLengthMismatch {
        eye: Eye,
        expected: usize,
        actual: usize,
    },

    #[error("triangle set exceeds 16-bit index range ({vertices} vertices)")]
    IndexOverflow { vertices: usize },

    #[error("VR runtime error: {0}")]
    Runtime(String),

    #[error("graphics device error: {0}")]
    Graphics(String),

    #[error("window error: {0}")]
    Window(String),
}

impl Error {
    /// Whether the supervisor may tear everything down and try again after a short sleep.
    ///
    /// Only the headset going away qualifies. Everything else is a programming or
    /// configuration error that another attempt would just repeat.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::HeadsetNotFound | Error::DisplayLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_headset_loss_is_recoverable() {
        assert!(Error::HeadsetNotFound.is_recoverable());
        assert!(Error::DisplayLost.is_recoverable());
        assert!(!Error::Graphics("device removed".into()).is_recoverable());
        assert!(
            !Error::RingLengthMismatch {
                eye: Eye::Left,
                expected: 2,
                actual: 3
            }
            .is_recoverable()
        );
    }

    #[test]
    fn ring_mismatch_message_names_both_counts() {
        let msg = Error::RingLengthMismatch {
            eye: Eye::Right,
            expected: 2,
            actual: 3,
        }
        .to_string();
        assert!(msg.contains("Right"));
        assert!(msg.contains("expects 2"));
        assert!(msg.contains("provided 3"));
    }
}
