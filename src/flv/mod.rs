// FLV container: tag model, muxer and demuxer

mod audio;
mod avc;
mod bitread;
mod demux;
mod header;
mod hevc;
mod multitrack;
mod mux;
mod script;
mod video;

pub use audio::*;
pub use avc::*;
pub use bitread::*;
pub use demux::*;
pub use header::*;
pub use hevc::*;
pub use multitrack::*;
pub use mux::*;
pub use script::*;
pub use video::*;
