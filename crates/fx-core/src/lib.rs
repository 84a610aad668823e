// ABOUTME: Shared types for fxdeck: effect options, parameter layouts, commands and config.
// ABOUTME: Nothing in this crate touches the GPU.

pub mod ascii;
pub mod color;
pub mod command;
pub mod config;
pub mod effects;
pub mod matcher;
pub mod options;
pub mod params;
pub mod post;
pub mod single_pass;

pub use ascii::{AsciiOptions, AtlasLayout, GridDims, MatchQuality};
pub use color::Color;
pub use command::{Command, OptionTarget};
pub use config::{Config, ConfigError, FontSettings};
pub use effects::{EffectKind, EffectOptions, EffectSettings};
pub use options::{merge_options, OptionError};
pub use params::{FrameInfo, PackParams, ParamLayout};
pub use post::{PostEffect, PostProcessOptions};
