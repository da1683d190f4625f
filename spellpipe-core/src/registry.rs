//! Stage registry
//!
//! Maps configured stage names to constructors. Built-in stages live under
//! `spellpipe.filters.<name>` and `spellpipe.flow_control.<name>`; a bare
//! name is looked up as given first, then in those two namespaces. Extra
//! stages are added with [`StageRegistry::register_filter`] and
//! [`StageRegistry::register_flow_control`].

use crate::error::SpellError;
use crate::filters::{
    ContextFilter, CppFilter, Filter, HtmlFilter, JavaScriptFilter, MarkdownFilter, PythonFilter,
    StylesheetsFilter, TextFilter, UrlFilter, XmlFilter,
};
#[cfg(feature = "office")]
use crate::filters::{OdfFilter, OoxmlFilter};
use crate::flow_control::{FlowControl, WildcardFlowControl};
use serde_yaml::Mapping;
use std::collections::BTreeMap;

pub const FILTER_NAMESPACE: &str = "spellpipe.filters";
pub const FLOW_CONTROL_NAMESPACE: &str = "spellpipe.flow_control";

/// Builds a filter from its user options and the task's default encoding
pub type FilterFactory =
    Box<dyn Fn(&Mapping, &str) -> Result<Box<dyn Filter>, SpellError> + Send + Sync>;

/// Builds a flow control from its user options
pub type FlowControlFactory =
    Box<dyn Fn(&Mapping) -> Result<Box<dyn FlowControl>, SpellError> + Send + Sync>;

pub enum StageFactory<'r> {
    Filter(&'r FilterFactory),
    FlowControl(&'r FlowControlFactory),
}

#[derive(Default)]
pub struct StageRegistry {
    filters: BTreeMap<String, FilterFactory>,
    flow_controls: BTreeMap<String, FlowControlFactory>,
}

macro_rules! builtin_filter {
    ($registry:expr, $filter:ty) => {
        $registry.register_filter(
            format!("{}.{}", FILTER_NAMESPACE, <$filter>::NAME),
            |options: &Mapping, encoding: &str| -> Result<Box<dyn Filter>, SpellError> {
                Ok(Box::new(<$filter>::new(options, encoding)?))
            },
        )
    };
}

impl StageRegistry {
    /// Registry with no stages at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in filter and flow control
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        builtin_filter!(registry, TextFilter);
        builtin_filter!(registry, UrlFilter);
        builtin_filter!(registry, ContextFilter);
        builtin_filter!(registry, PythonFilter);
        builtin_filter!(registry, CppFilter);
        builtin_filter!(registry, JavaScriptFilter);
        builtin_filter!(registry, StylesheetsFilter);
        builtin_filter!(registry, MarkdownFilter);
        builtin_filter!(registry, HtmlFilter);
        builtin_filter!(registry, XmlFilter);
        #[cfg(feature = "office")]
        {
            builtin_filter!(registry, OdfFilter);
            builtin_filter!(registry, OoxmlFilter);
        }

        registry.register_flow_control(
            format!("{}.{}", FLOW_CONTROL_NAMESPACE, WildcardFlowControl::NAME),
            |options: &Mapping| -> Result<Box<dyn FlowControl>, SpellError> {
                Ok(Box::new(WildcardFlowControl::new(options)?))
            },
        );
        registry
    }

    pub fn register_filter<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Mapping, &str) -> Result<Box<dyn Filter>, SpellError> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Box::new(factory));
    }

    pub fn register_flow_control<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Mapping) -> Result<Box<dyn FlowControl>, SpellError> + Send + Sync + 'static,
    {
        self.flow_controls.insert(name.into(), Box::new(factory));
    }

    /// Find the constructor for a configured stage name
    pub fn resolve(&self, name: &str) -> Option<StageFactory<'_>> {
        let lookup = |key: &str| {
            self.filters
                .get(key)
                .map(StageFactory::Filter)
                .or_else(|| self.flow_controls.get(key).map(StageFactory::FlowControl))
        };

        lookup(name).or_else(|| {
            if name.contains('.') {
                return None;
            }
            self.filters
                .get(&format!("{FILTER_NAMESPACE}.{name}"))
                .map(StageFactory::Filter)
                .or_else(|| {
                    self.flow_controls
                        .get(&format!("{FLOW_CONTROL_NAMESPACE}.{name}"))
                        .map(StageFactory::FlowControl)
                })
        })
    }

    /// Every registered stage name, filters first
    pub fn names(&self) -> Vec<&str> {
        self.filters
            .keys()
            .chain(self.flow_controls.keys())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_and_aliases() {
        let registry = StageRegistry::builtin();
        assert!(matches!(registry.resolve("text"), Some(StageFactory::Filter(_))));
        assert!(matches!(
            registry.resolve("spellpipe.filters.python"),
            Some(StageFactory::Filter(_))
        ));
        assert!(matches!(
            registry.resolve("wildcard"),
            Some(StageFactory::FlowControl(_))
        ));
        assert!(matches!(
            registry.resolve("spellpipe.flow_control.wildcard"),
            Some(StageFactory::FlowControl(_))
        ));
        assert!(registry.resolve("nonexistent").is_none());
        assert!(registry.resolve("other.filters.text").is_none());
        assert!(registry.names().contains(&"spellpipe.filters.html"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = StageRegistry::empty();
        registry.register_filter("upper", |options, encoding| {
            Ok(Box::new(TextFilter::new(options, encoding)?) as Box<dyn Filter>)
        });
        assert!(matches!(registry.resolve("upper"), Some(StageFactory::Filter(_))));
        assert!(registry.resolve("text").is_none());
    }
}
