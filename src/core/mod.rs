//! Core pipeline components: speech streaming, command translation,
//! dispatch, and their composition.

pub mod dispatch;
pub mod pipeline;
pub mod rcp;
pub mod stt;
