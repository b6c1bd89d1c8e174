// src/config/mod.rs

//! `Assetdag.toml`: the serde model, file loading and the validation that
//! turns a [`RawConfigFile`] into a [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    AutoprefixerSection, ConfigFile, ConfigSection, PathsSection, RawConfigFile, ScriptSection,
    ServeSection, SpriteSection, TaskConfig,
};
