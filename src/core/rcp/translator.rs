//! Voice-intent to console-wire translation.
//!
//! Pure and total: every [`VoiceCommand`] variant maps to a defined
//! [`RcpCommand`], with [`VoiceCommand::Unknown`] degrading to a harmless
//! status read. A misheard phrase must never crash or stall the pipeline;
//! the worst case is a no-op query hitting the console.

use super::command::{
    ChannelOperation, CommandCategory, GlobalOperation, RcpCommand, SceneOperation, VoiceCommand,
};

// =============================================================================
// Wire Constants
// =============================================================================

const PATH_CH_MUTE: &str = "MIXER:Current/InCh/ToMix/On";
const PATH_CH_SOLO: &str = "MIXER:Current/InCh/ToCue/On";
const PATH_CH_PHANTOM: &str = "MIXER:Current/InCh/HA/Phantom";
const PATH_CH_FADER: &str = "MIXER:Current/InCh/Fader/Level";
const PATH_CH_GAIN: &str = "MIXER:Current/InCh/HA/Gain";
const PATH_SCENE_RECALL: &str = "MIXER:Current/Scene/Recall";
const PATH_SCENE_STORE: &str = "MIXER:Current/Scene/Store";
const PATH_MUTE_MASTER: &str = "MIXER:Current/MuteMaster/On";

/// Fader wire range and its dB mapping.
const FADER_WIRE_MAX: i64 = 1000;
const FADER_DB_FLOOR: f32 = -90.0;
const FADER_DB_SPAN: f32 = 100.0;
/// Head-amp gain bottoms out at -20 dB on the wire.
const GAIN_DB_FLOOR: f32 = -20.0;
const GAIN_DB_SPAN: f32 = 80.0;
/// Fader level used when no dB value was spoken (~75%).
const FADER_DEFAULT_LEVEL: i64 = 750;
/// Wire-unit step for relative nudges ("a little louder").
const FADER_NUDGE_STEP: i64 = 50;

/// Head-amp gain wire range and its dB mapping.
const GAIN_WIRE_MAX: i64 = 480;
/// Gain used when no dB value was spoken (0 dB reference point).
const GAIN_DEFAULT: i64 = 240;

// =============================================================================
// Numeric Conversions
// =============================================================================

/// Map spoken decibels onto the fader's [0, 1000] wire range.
pub fn db_to_fader_level(db: f32) -> i64 {
    let level = ((db - FADER_DB_FLOOR) / FADER_DB_SPAN * FADER_WIRE_MAX as f32).round() as i64;
    level.clamp(0, FADER_WIRE_MAX)
}

/// Map spoken decibels onto the head-amp's [0, 480] wire range.
pub fn db_to_gain(db: f32) -> i64 {
    let gain = ((db - GAIN_DB_FLOOR) / GAIN_DB_SPAN * GAIN_WIRE_MAX as f32).round() as i64;
    gain.clamp(0, GAIN_WIRE_MAX)
}

/// Wire index for a spoken one-based channel number: zero-based, 2 digits.
fn channel_index(number: u32) -> String {
    format!("{:02}", number.saturating_sub(1))
}

/// Wire index for a spoken one-based scene number: zero-based, 3 digits.
fn scene_index(number: u32) -> String {
    format!("{:03}", number.saturating_sub(1))
}

// =============================================================================
// Translation
// =============================================================================

/// Translate one parsed voice intent into a console wire command.
///
/// `confidence` is carried through from the originating transcript for UI
/// display; it never affects the produced command text.
pub fn translate(cmd: &VoiceCommand, confidence: f32) -> RcpCommand {
    match cmd {
        VoiceCommand::Channel {
            number,
            operation,
            value,
        } => translate_channel(*number, *operation, *value, confidence),
        VoiceCommand::Scene { number, operation } => {
            translate_scene(*number, *operation, confidence)
        }
        VoiceCommand::Global { operation } => translate_global(*operation, confidence),
        VoiceCommand::Unknown => status_query(confidence),
    }
}

fn translate_channel(
    number: u32,
    operation: ChannelOperation,
    value: Option<f32>,
    confidence: f32,
) -> RcpCommand {
    let idx = channel_index(number);
    match operation {
        ChannelOperation::MuteOn => RcpCommand::new(
            format!("set {PATH_CH_MUTE} {idx} 0"),
            format!("Mute channel {number}"),
            confidence,
            CommandCategory::Channel,
        ),
        ChannelOperation::MuteOff => RcpCommand::new(
            format!("set {PATH_CH_MUTE} {idx} 1"),
            format!("Unmute channel {number}"),
            confidence,
            CommandCategory::Channel,
        ),
        ChannelOperation::SoloOn => RcpCommand::new(
            format!("set {PATH_CH_SOLO} {idx} 1"),
            format!("Solo channel {number}"),
            confidence,
            CommandCategory::Channel,
        ),
        ChannelOperation::SoloOff => RcpCommand::new(
            format!("set {PATH_CH_SOLO} {idx} 0"),
            format!("Unsolo channel {number}"),
            confidence,
            CommandCategory::Channel,
        ),
        ChannelOperation::PhantomOn => RcpCommand::new(
            format!("set {PATH_CH_PHANTOM} {idx} 1"),
            format!("Phantom power on, channel {number}"),
            confidence,
            CommandCategory::Channel,
        ),
        ChannelOperation::PhantomOff => RcpCommand::new(
            format!("set {PATH_CH_PHANTOM} {idx} 0"),
            format!("Phantom power off, channel {number}"),
            confidence,
            CommandCategory::Channel,
        ),
        ChannelOperation::FaderSet => {
            let level = value.map(db_to_fader_level).unwrap_or(FADER_DEFAULT_LEVEL);
            let spoken = value
                .map(|db| format!("{db} dB"))
                .unwrap_or_else(|| "default level".to_string());
            RcpCommand::new(
                format!("set {PATH_CH_FADER} {idx} {level}"),
                format!("Set channel {number} fader to {spoken}"),
                confidence,
                CommandCategory::Fader,
            )
        }
        ChannelOperation::FaderIncrease => RcpCommand::new(
            format!("inc {PATH_CH_FADER} {idx} {FADER_NUDGE_STEP}"),
            format!("Nudge channel {number} fader up"),
            confidence,
            CommandCategory::Fader,
        ),
        ChannelOperation::FaderDecrease => RcpCommand::new(
            format!("dec {PATH_CH_FADER} {idx} {FADER_NUDGE_STEP}"),
            format!("Nudge channel {number} fader down"),
            confidence,
            CommandCategory::Fader,
        ),
        ChannelOperation::GainSet => {
            let gain = value.map(db_to_gain).unwrap_or(GAIN_DEFAULT);
            let spoken = value
                .map(|db| format!("{db} dB"))
                .unwrap_or_else(|| "default gain".to_string());
            RcpCommand::new(
                format!("set {PATH_CH_GAIN} {idx} {gain}"),
                format!("Set channel {number} gain to {spoken}"),
                confidence,
                CommandCategory::Gain,
            )
        }
    }
}

fn translate_scene(number: u32, operation: SceneOperation, confidence: f32) -> RcpCommand {
    let idx = scene_index(number);
    match operation {
        SceneOperation::Recall => RcpCommand::new(
            format!("set {PATH_SCENE_RECALL} {idx} 1"),
            format!("Recall scene {number}"),
            confidence,
            CommandCategory::Scene,
        ),
        SceneOperation::Store => RcpCommand::new(
            format!("set {PATH_SCENE_STORE} {idx} 1"),
            format!("Store scene {number}"),
            confidence,
            CommandCategory::Scene,
        ),
    }
}

fn translate_global(operation: GlobalOperation, confidence: f32) -> RcpCommand {
    match operation {
        GlobalOperation::MuteAll => RcpCommand::new(
            format!("set {PATH_MUTE_MASTER} 00 1"),
            "Mute all channels",
            confidence,
            CommandCategory::Global,
        ),
        GlobalOperation::UnmuteAll => RcpCommand::new(
            format!("set {PATH_MUTE_MASTER} 00 0"),
            "Unmute all channels",
            confidence,
            CommandCategory::Global,
        ),
        GlobalOperation::StatusQuery => status_query(confidence),
    }
}

/// Harmless read used for status requests and unrecognized speech.
fn status_query(confidence: f32) -> RcpCommand {
    RcpCommand::new(
        format!("get {PATH_SCENE_RECALL} 000"),
        "Query current scene",
        confidence,
        CommandCategory::Query,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fader_level_boundaries() {
        assert_eq!(db_to_fader_level(-90.0), 0);
        assert_eq!(db_to_fader_level(10.0), 1000);
        assert_eq!(db_to_fader_level(0.0), 900);
        // Out of range clamps rather than wrapping.
        assert_eq!(db_to_fader_level(-120.0), 0);
        assert_eq!(db_to_fader_level(40.0), 1000);
    }

    #[test]
    fn test_gain_boundaries() {
        assert_eq!(db_to_gain(-20.0), 0);
        assert_eq!(db_to_gain(60.0), 480);
        assert_eq!(db_to_gain(0.0), 120);
        assert_eq!(db_to_gain(-50.0), 0);
        assert_eq!(db_to_gain(99.0), 480);
    }

    #[test]
    fn test_mute_channel_one() {
        let cmd = translate(
            &VoiceCommand::Channel {
                number: 1,
                operation: ChannelOperation::MuteOn,
                value: None,
            },
            0.95,
        );
        assert_eq!(cmd.command, "set MIXER:Current/InCh/ToMix/On 00 0");
        assert_eq!(cmd.category, CommandCategory::Channel);
        assert_eq!(cmd.confidence, 0.95);
    }

    #[test]
    fn test_unmute_uses_on_value() {
        let cmd = translate(
            &VoiceCommand::Channel {
                number: 12,
                operation: ChannelOperation::MuteOff,
                value: None,
            },
            0.8,
        );
        assert_eq!(cmd.command, "set MIXER:Current/InCh/ToMix/On 11 1");
    }

    #[test]
    fn test_fader_set_with_value_and_default() {
        let with_value = translate(
            &VoiceCommand::Channel {
                number: 3,
                operation: ChannelOperation::FaderSet,
                value: Some(-10.0),
            },
            0.9,
        );
        assert_eq!(with_value.command, "set MIXER:Current/InCh/Fader/Level 02 800");

        let default = translate(
            &VoiceCommand::Channel {
                number: 3,
                operation: ChannelOperation::FaderSet,
                value: None,
            },
            0.9,
        );
        assert_eq!(default.command, "set MIXER:Current/InCh/Fader/Level 02 750");
    }

    #[test]
    fn test_fader_nudges_use_fixed_step() {
        let up = translate(
            &VoiceCommand::Channel {
                number: 5,
                operation: ChannelOperation::FaderIncrease,
                value: Some(12.0), // spoken value is ignored for nudges
            },
            0.7,
        );
        assert_eq!(up.command, "inc MIXER:Current/InCh/Fader/Level 04 50");

        let down = translate(
            &VoiceCommand::Channel {
                number: 5,
                operation: ChannelOperation::FaderDecrease,
                value: None,
            },
            0.7,
        );
        assert_eq!(down.command, "dec MIXER:Current/InCh/Fader/Level 04 50");
    }

    #[test]
    fn test_gain_set_default() {
        let cmd = translate(
            &VoiceCommand::Channel {
                number: 1,
                operation: ChannelOperation::GainSet,
                value: None,
            },
            0.6,
        );
        assert_eq!(cmd.command, "set MIXER:Current/InCh/HA/Gain 00 240");
        assert_eq!(cmd.category, CommandCategory::Gain);
    }

    #[test]
    fn test_scene_indices_are_three_digits() {
        let recall = translate(
            &VoiceCommand::Scene {
                number: 5,
                operation: SceneOperation::Recall,
            },
            0.9,
        );
        assert_eq!(recall.command, "set MIXER:Current/Scene/Recall 004 1");

        let store = translate(
            &VoiceCommand::Scene {
                number: 128,
                operation: SceneOperation::Store,
            },
            0.9,
        );
        assert_eq!(store.command, "set MIXER:Current/Scene/Store 127 1");
    }

    #[test]
    fn test_channel_zero_does_not_underflow() {
        let cmd = translate(
            &VoiceCommand::Channel {
                number: 0,
                operation: ChannelOperation::MuteOn,
                value: None,
            },
            0.5,
        );
        assert_eq!(cmd.command, "set MIXER:Current/InCh/ToMix/On 00 0");
    }

    #[test]
    fn test_global_mutes() {
        let mute = translate(
            &VoiceCommand::Global {
                operation: GlobalOperation::MuteAll,
            },
            0.9,
        );
        assert_eq!(mute.command, "set MIXER:Current/MuteMaster/On 00 1");

        let unmute = translate(
            &VoiceCommand::Global {
                operation: GlobalOperation::UnmuteAll,
            },
            0.9,
        );
        assert_eq!(unmute.command, "set MIXER:Current/MuteMaster/On 00 0");
    }

    #[test]
    fn test_unknown_degrades_to_status_query() {
        let cmd = translate(&VoiceCommand::Unknown, 0.1);
        assert_eq!(cmd.command, "get MIXER:Current/Scene/Recall 000");
        assert_eq!(cmd.category, CommandCategory::Query);
        assert!(cmd.command.starts_with("get "));
    }

    #[test]
    fn test_status_query_matches_unknown() {
        let status = translate(
            &VoiceCommand::Global {
                operation: GlobalOperation::StatusQuery,
            },
            0.9,
        );
        let unknown = translate(&VoiceCommand::Unknown, 0.9);
        assert_eq!(status.command, unknown.command);
    }
}
