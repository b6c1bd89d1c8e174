// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::paths::PathTable;
use crate::types::TriggerWhileRunningBehaviour;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// triggered_while_running_behaviour = "queue"
/// queue_length = 1
///
/// [paths.dev]
/// scss = "assets/scss/*.scss"
///
/// [autoprefixer]
/// browsers = ["last 2 versions", "iOS 7"]
///
/// [script]
/// transpile_cmd = "npx babel --presets=@babel/preset-env"
///
/// [serve]
/// port = 9005
/// proxy = "http://localhost:3270/"
///
/// [task.styles]
/// series = ["clean", "build-scss", "inject-header"]
/// ```
///
/// All sections are optional and have defaults matching a typical
/// `scss/` + `js/` + `web/assets/` project layout.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// `[paths.public]`, `[paths.dev]`, `[paths.watch]` overrides.
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub autoprefixer: AutoprefixerSection,

    #[serde(default)]
    pub script: ScriptSection,

    #[serde(default)]
    pub sprite: SpriteSection,

    #[serde(default)]
    pub serve: ServeSection,

    /// Custom compositions from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Constructed through `ConfigFile::try_from(RawConfigFile)` (see
/// `config::validate`), which resolves the path table and rejects
/// malformed sections.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub paths: PathTable,
    pub autoprefixer: AutoprefixerSection,
    pub script: ScriptSection,
    pub sprite: SpriteSection,
    pub serve: ServeSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, paths: PathTable) -> Self {
        Self {
            config: raw.config,
            paths,
            autoprefixer: raw.autoprefixer,
            script: raw.script,
            sprite: raw.sprite,
            serve: raw.serve,
            task: raw.task,
        }
    }

    /// Custom compositions declared in the config file.
    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }
}

/// `[config]` section: trigger coalescing for watch-driven reruns.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// `"queue"` (default) or `"cancel"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued runs to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_queue_length() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
        }
    }
}

/// `[paths.*]` overrides, keyed by category name (`scss`, `css_build`, ...).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    #[serde(default)]
    pub public: BTreeMap<String, String>,
    #[serde(default)]
    pub dev: BTreeMap<String, String>,
    #[serde(default)]
    pub watch: BTreeMap<String, String>,
}

/// `[autoprefixer]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoprefixerSection {
    /// Browserslist queries.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Visual cascade of prefixed declarations. Only `false` is supported.
    #[serde(default)]
    pub cascade: bool,
}

fn default_browsers() -> Vec<String> {
    vec!["last 2 versions".to_string(), "iOS 7".to_string()]
}

impl Default for AutoprefixerSection {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
            cascade: false,
        }
    }
}

/// `[script]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSection {
    /// Bundle name for the dev pipeline.
    #[serde(default = "default_dev_bundle")]
    pub dev_bundle: String,

    /// Bundle name for the production pipeline (before hashing).
    #[serde(default = "default_prod_bundle")]
    pub prod_bundle: String,

    /// External command used to downlevel scripts, fed on stdin.
    ///
    /// e.g. `"npx babel --presets=@babel/preset-env"`. When unset, the
    /// transpile stage passes files through unchanged.
    #[serde(default)]
    pub transpile_cmd: Option<String>,
}

fn default_dev_bundle() -> String {
    "script.js".to_string()
}

fn default_prod_bundle() -> String {
    "script.min.js".to_string()
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            dev_bundle: default_dev_bundle(),
            prod_bundle: default_prod_bundle(),
            transpile_cmd: None,
        }
    }
}

/// `[sprite]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpriteSection {
    /// Symbol id pattern; `%f` is replaced by the icon file stem.
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,

    #[serde(default = "default_symbols")]
    pub symbols: String,

    #[serde(default = "default_preview")]
    pub preview: String,
}

fn default_id_pattern() -> String {
    "icon-%f".to_string()
}

fn default_symbols() -> String {
    "symbols.svg".to_string()
}

fn default_preview() -> String {
    "sprite-preview.html".to_string()
}

impl Default for SpriteSection {
    fn default() -> Self {
        Self {
            id_pattern: default_id_pattern(),
            symbols: default_symbols(),
            preview: default_preview(),
        }
    }
}

/// `[serve]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServeSection {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream application origin.
    #[serde(default = "default_proxy")]
    pub proxy: String,

    /// Glob (relative to the project root) whose changes reload the browser.
    #[serde(default = "default_serve_watch")]
    pub watch: String,
}

fn default_port() -> u16 {
    9005
}

fn default_proxy() -> String {
    "http://localhost:3270/".to_string()
}

fn default_serve_watch() -> String {
    "web/**/*.*".to_string()
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            proxy: default_proxy(),
            watch: default_serve_watch(),
        }
    }
}

/// `[task.<name>]` section: a custom composition of registered tasks.
///
/// Exactly one of `series` / `parallel` must be given.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub series: Option<Vec<String>>,

    #[serde(default)]
    pub parallel: Option<Vec<String>>,

    #[serde(default)]
    pub description: Option<String>,
}
