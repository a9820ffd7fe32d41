use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::config::configuration::{Configuration, Relock};
use crate::config::cursor::Cursor;
use crate::error::{Error, Result};

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::default);

/// Parent argument to [`Registry::define`]: nothing, a registered name, or an
/// existing configuration handle.
#[derive(Debug, Clone, Default)]
pub enum ParentSpec {
    #[default]
    None,
    Name(String),
    Config(Configuration),
}

impl From<&str> for ParentSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ParentSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Configuration> for ParentSpec {
    fn from(config: Configuration) -> Self {
        Self::Config(config)
    }
}

impl From<&Configuration> for ParentSpec {
    fn from(config: &Configuration) -> Self {
        Self::Config(config.clone())
    }
}

// Dynamically typed embedders carry the parent reference as a JSON value; a
// string is a name, null is none, anything else is unusable.
impl TryFrom<&Value> for ParentSpec {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::None),
            Value::String(name) => Ok(Self::Name(name.clone())),
            other => Err(Error::InvalidParentType(json_type_name(other).to_owned())),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Named table of configurations.
#[derive(Default)]
pub struct Registry {
    configs: RwLock<HashMap<String, Configuration>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Create or re-open the configuration named `name`, run `builder`
    /// against its root cursor, and lock it on every exit path. The parent
    /// reference is resolved before the table is touched; a re-opened name
    /// keeps its original parent link.
    pub fn define<P, F>(&self, name: &str, parent: P, builder: F) -> Result<Configuration>
    where
        P: Into<ParentSpec>,
        F: FnOnce(&Cursor) -> Result<()>,
    {
        let parent = match parent.into() {
            ParentSpec::None => None,
            ParentSpec::Name(parent_name) => Some(self.get(&parent_name)?),
            ParentSpec::Config(config) => Some(config),
        };

        let (config, reopened) = {
            let mut configs = self.configs.write();
            match configs.get(name) {
                Some(existing) => (existing.clone(), true),
                None => {
                    let config = Configuration::new(parent);
                    configs.insert(name.to_owned(), config.clone());
                    (config, false)
                }
            }
        };
        debug!(name, reopened, "defining configuration");

        {
            let _relock = Relock::open(&config);
            builder(&config.root())?;
        }
        Ok(config)
    }

    pub fn get(&self, name: &str) -> Result<Configuration> {
        self.configs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownName(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configs.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every registered configuration. Exists for test isolation.
    pub fn clear(&self) {
        debug!("clearing registry");
        self.configs.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{ParentSpec, Registry};
    use crate::error::Error;

    #[test]
    fn define_runs_the_builder_and_locks() {
        let registry = Registry::new();
        let config = registry
            .define("app", ParentSpec::None, |root| root.set("bar", "baz"))
            .unwrap();

        assert!(config.is_locked());
        assert_eq!(config.get("bar"), Some(Value::from("baz")));

        let error = config
            .set("bar", "changed")
            .expect_err("defined config should be locked");
        assert!(error.to_string().contains("locked"));
    }

    #[test]
    fn get_returns_the_registered_instance() {
        let registry = Registry::new();
        let config = registry
            .define("app", ParentSpec::None, |_| Ok(()))
            .unwrap();

        assert_eq!(registry.get("app").unwrap(), config);

        let error = registry.get("missing").expect_err("lookup should fail");
        assert!(error.to_string().contains("no config named 'missing'"));
    }

    #[test]
    fn define_reuses_and_extends_an_existing_name() {
        let registry = Registry::new();
        let first = registry
            .define("app", ParentSpec::None, |root| root.set("a", 1))
            .unwrap();
        let second = registry
            .define("app", ParentSpec::None, |root| root.set("b", 2))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.get("a"), Some(Value::from(1)));
        assert_eq!(second.get("b"), Some(Value::from(2)));
        assert!(second.is_locked());

        // A parent supplied on reuse is resolved but the original link stays.
        let other = registry
            .define("other", ParentSpec::None, |_| Ok(()))
            .unwrap();
        let reopened = registry.define("app", &other, |_| Ok(())).unwrap();
        assert_eq!(reopened, first);
        assert!(reopened.parent().is_none());
    }

    #[test]
    fn parent_can_be_a_name_or_a_handle() {
        let registry = Registry::new();
        let parent = registry
            .define("parent", ParentSpec::None, |root| root.set("shared", true))
            .unwrap();

        let by_name = registry.define("by-name", "parent", |_| Ok(())).unwrap();
        assert_eq!(by_name.get("shared"), Some(Value::Bool(true)));

        let by_handle = registry.define("by-handle", &parent, |_| Ok(())).unwrap();
        assert_eq!(by_handle.get("shared"), Some(Value::Bool(true)));
        assert_eq!(by_handle.parent().unwrap(), parent);
    }

    #[test]
    fn unknown_parent_name_fails_before_creating_the_child() {
        let registry = Registry::new();
        let error = registry
            .define("child", "missing", |_| Ok(()))
            .expect_err("unknown parent name should fail");

        assert!(error.to_string().contains("no config named 'missing'"));
        assert!(!registry.contains("child"));
    }

    #[test]
    fn dynamic_parent_values_must_be_names_or_null() {
        assert!(matches!(
            ParentSpec::try_from(&json!(null)).unwrap(),
            ParentSpec::None
        ));
        assert!(matches!(
            ParentSpec::try_from(&json!("base")).unwrap(),
            ParentSpec::Name(name) if name == "base"
        ));

        let error = ParentSpec::try_from(&json!(42)).expect_err("number is not a parent");
        assert!(error.to_string().contains("invalid parent"));
        assert!(error.to_string().contains("number"));
    }

    #[test]
    fn failed_builder_leaves_the_config_locked() {
        let registry = Registry::new();
        let error = registry
            .define("app", ParentSpec::None, |root| {
                root.set("a", 1)?;
                Err(Error::UnknownKey("forced".to_owned()))
            })
            .expect_err("builder error should propagate");

        assert!(error.to_string().contains("forced"));
        let config = registry.get("app").unwrap();
        assert!(config.is_locked());
        assert_eq!(config.get("a"), Some(Value::from(1)));
    }

    #[test]
    fn clear_empties_the_table() {
        let registry = Registry::new();
        registry.define("app", ParentSpec::None, |_| Ok(())).unwrap();

        registry.clear();
        assert!(!registry.contains("app"));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let registry = Registry::new();
        registry.define("beta", ParentSpec::None, |_| Ok(())).unwrap();
        registry.define("alpha", ParentSpec::None, |_| Ok(())).unwrap();

        assert_eq!(registry.names(), ["alpha", "beta"]);
    }

    #[test]
    fn full_definition_and_inheritance_flow() {
        let registry = Registry::new();
        registry
            .define("defaults", ParentSpec::None, |root| {
                root.descend("server")?.descend("http")?.set("port", 8080)?;
                root.set("greeting", "hello")?;
                root.scope("output", |output| {
                    output.scope("ansi", |ansi| ansi.set("colors", true))
                })
            })
            .unwrap();

        registry
            .define("quiet", "defaults", |root| {
                root.scope("output", |output| {
                    output.scope("ansi", |ansi| ansi.set("colors", false))
                })
            })
            .unwrap();

        let child = registry.get("quiet").unwrap();
        assert_eq!(child.get("output.ansi.colors"), Some(Value::Bool(false)));
        assert_eq!(child.get("greeting"), Some(Value::from("hello")));
        assert_eq!(child.get("server.http.port"), Some(Value::from(8080)));

        let parent = registry.get("defaults").unwrap();
        assert_eq!(parent.get("output.ansi.colors"), Some(Value::Bool(true)));

        // Extending a defined config requires an edit session.
        let error = child
            .root()
            .resolve("yet")
            .expect_err("unset key should fail after define");
        assert!(error.to_string().contains("yet"));

        child
            .edit(|root| root.descend("yet")?.set("another", "value"))
            .unwrap();
        assert_eq!(child.get("yet.another"), Some(Value::from("value")));
        assert!(child.is_locked());
    }

    #[test]
    fn global_registry_is_shared() {
        let name = "global-registry-test";
        Registry::global()
            .define(name, ParentSpec::None, |root| root.set("present", true))
            .unwrap();

        assert!(Registry::global().contains(name));
        assert_eq!(
            Registry::global().get(name).unwrap().get("present"),
            Some(Value::Bool(true))
        );
    }
}
