//! Console command model.
//!
//! [`VoiceCommand`] is the parsed intent handed over by the command-parsing
//! collaborator; [`RcpCommand`] is the translated wire command plus metadata
//! carried through for UI grouping and display.

use serde::{Deserialize, Serialize};

// =============================================================================
// Parsed Voice Commands
// =============================================================================

/// Per-channel operation spoken by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOperation {
    MuteOn,
    MuteOff,
    SoloOn,
    SoloOff,
    PhantomOn,
    PhantomOff,
    /// Absolute fader move; the parameter is the spoken dB value.
    FaderSet,
    /// Relative fader nudge up by a fixed wire-unit step.
    FaderIncrease,
    /// Relative fader nudge down by a fixed wire-unit step.
    FaderDecrease,
    /// Head-amp gain; the parameter is the spoken dB value.
    GainSet,
}

/// Scene memory operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneOperation {
    Recall,
    Store,
}

/// Console-wide operation not tied to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalOperation {
    MuteAll,
    UnmuteAll,
    StatusQuery,
}

/// Parsed intent produced by the command parser.
///
/// Channel and scene numbers are one-based as spoken ("channel one",
/// "scene five"); translation to the wire's zero-based indices happens in
/// the translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoiceCommand {
    Channel {
        number: u32,
        operation: ChannelOperation,
        /// dB parameter for fader/gain operations; absent means "use the
        /// operation's default level".
        value: Option<f32>,
    },
    Scene {
        number: u32,
        operation: SceneOperation,
    },
    Global {
        operation: GlobalOperation,
    },
    /// Speech that did not parse to any known intent.
    Unknown,
}

// =============================================================================
// Translated Commands
// =============================================================================

/// UI grouping for translated commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Channel,
    Fader,
    Gain,
    Scene,
    Global,
    Query,
}

impl std::fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Channel => "channel",
            Self::Fader => "fader",
            Self::Gain => "gain",
            Self::Scene => "scene",
            Self::Global => "global",
            Self::Query => "query",
        };
        f.write_str(s)
    }
}

/// A console command ready for dispatch.
///
/// `command` is the exact wire text (`<verb> <path> <index> [<value>]`);
/// `description` and `category` exist for display only and never reach the
/// console. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcpCommand {
    pub command: String,
    pub description: String,
    /// Confidence of the transcript this command originated from.
    pub confidence: f32,
    pub category: CommandCategory,
}

impl RcpCommand {
    pub fn new(
        command: impl Into<String>,
        description: impl Into<String>,
        confidence: f32,
        category: CommandCategory,
    ) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rcp_command_clamps_confidence() {
        let cmd = RcpCommand::new("get X 00", "status", 1.4, CommandCategory::Query);
        assert_eq!(cmd.confidence, 1.0);

        let cmd = RcpCommand::new("get X 00", "status", -0.2, CommandCategory::Query);
        assert_eq!(cmd.confidence, 0.0);
    }

    #[test]
    fn test_voice_command_serde_tagging() {
        let cmd = VoiceCommand::Channel {
            number: 3,
            operation: ChannelOperation::MuteOn,
            value: None,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"kind\":\"channel\""));
        assert!(json.contains("\"mute_on\""));

        let parsed: VoiceCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(CommandCategory::Fader.to_string(), "fader");
        assert_eq!(CommandCategory::Query.to_string(), "query");
    }
}
