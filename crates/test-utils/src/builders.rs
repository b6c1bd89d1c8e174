use assetdag::config::{ConfigFile, RawConfigFile, TaskConfig};
use assetdag::paths::{PathCategory, PathContext};
use assetdag::pipeline::{Pipeline, SourceSet};
use assetdag::tasks::{Composition, Job, ServeSettings, TaskDescriptor, TaskRegistry};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// Override one entry of the path table.
    pub fn with_path(mut self, context: PathContext, category: PathCategory, value: &str) -> Self {
        let section = match context {
            PathContext::Public => &mut self.config.paths.public,
            PathContext::Dev => &mut self.config.paths.dev,
            PathContext::Watch => &mut self.config.paths.watch,
        };
        section.insert(category.as_str().to_string(), value.to_string());
        self
    }

    pub fn with_series(self, name: &str, tasks: &[&str]) -> Self {
        self.with_task(name, TaskConfig {
            series: Some(tasks.iter().map(|t| t.to_string()).collect()),
            ..TaskConfig::default()
        })
    }

    pub fn with_parallel(self, name: &str, tasks: &[&str]) -> Self {
        self.with_task(name, TaskConfig {
            parallel: Some(tasks.iter().map(|t| t.to_string()).collect()),
            ..TaskConfig::default()
        })
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_browsers(mut self, browsers: &[&str]) -> Self {
        self.config.autoprefixer.browsers = browsers.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `TaskRegistry` of stand-in tasks, for exercising the
/// scheduler without real pipelines.
///
/// Leaves are empty delete pipelines; long-lived leaves are serve jobs.
/// The fake executor never runs either.
pub struct RegistryBuilder {
    tasks: Vec<TaskDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn leaf(mut self, name: &str) -> Self {
        let pipeline = Pipeline::from_source(SourceSet::new(Vec::<String>::new())).delete();
        self.tasks.push(TaskDescriptor::leaf(name, "", Job::Pipeline(pipeline)));
        self
    }

    pub fn leaves(self, names: &[&str]) -> Self {
        names.iter().fold(self, |b, n| b.leaf(n))
    }

    pub fn long_lived(mut self, name: &str) -> Self {
        let serve = Job::Serve(ServeSettings {
            port: 0,
            proxy: "http://localhost:3270/".to_string(),
            watch: "web/**/*.*".to_string(),
        });
        self.tasks.push(TaskDescriptor::leaf(name, "", serve));
        self
    }

    pub fn composite(mut self, name: &str, composition: Composition) -> Self {
        self.tasks.push(TaskDescriptor::composite(name, None, composition));
        self
    }

    pub fn build(self) -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        for task in self.tasks {
            registry.register(task).expect("duplicate task in RegistryBuilder");
        }
        registry.validate().expect("invalid registry in RegistryBuilder");
        registry
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
