//! Console control protocol: parsed voice intents and their translation to
//! wire commands.

pub mod command;
pub mod translator;

pub use command::{
    ChannelOperation, CommandCategory, GlobalOperation, RcpCommand, SceneOperation, VoiceCommand,
};
pub use translator::{db_to_fader_level, db_to_gain, translate};
