// src/stages/mod.rs

//! Concrete pipeline stages.

pub mod hash;
pub mod inject;
pub mod script;
pub mod sprite;
pub mod style;

pub use hash::HashRename;
pub use inject::Inject;
pub use script::{Concat, MinifyJs, Transpile};
pub use sprite::{SvgOptimize, SvgSprite};
pub use style::{Autoprefix, CompileScss, MinifyCss};
