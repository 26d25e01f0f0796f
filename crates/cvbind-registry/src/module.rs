//! Per-module registration tables.
//!
//! A [`Module`] collects the `(name, overload set)` and `(name, constant)`
//! pairs for one native namespace such as `cv` or `cv.aruco`. Installing it
//! into a [`NamespaceTree`](crate::NamespaceTree) applies the host naming
//! rules.

use cvbind_dispatch::OverloadSet;

/// Registration table for one native namespace.
#[derive(Debug, Clone)]
pub struct Module {
    native_path: String,
    functions: Vec<OverloadSet>,
    constants: Vec<(String, i64)>,
}

impl Module {
    /// Create an empty module for the dotted native namespace `native_path`.
    pub fn new(native_path: impl Into<String>) -> Self {
        Self {
            native_path: native_path.into(),
            functions: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Add a function. Candidates for an already added name are appended to
    /// the existing set.
    pub fn function(mut self, set: OverloadSet) -> Self {
        match self.functions.iter_mut().find(|f| f.name() == set.name()) {
            Some(existing) => {
                for overload in set.overloads() {
                    existing.push(overload.clone());
                }
            }
            None => self.functions.push(set),
        }
        self
    }

    /// Add an integer constant.
    pub fn constant(mut self, name: impl Into<String>, value: i64) -> Self {
        self.constants.push((name.into(), value));
        self
    }

    /// Add the values of a native enum.
    ///
    /// Values of a scoped enum are published as `<Enum>_<VALUE>`; unscoped
    /// values keep their own name.
    pub fn enum_values<'a>(
        mut self,
        enum_name: &str,
        scoped: bool,
        values: impl IntoIterator<Item = (&'a str, i64)>,
    ) -> Self {
        for (name, value) in values {
            let name = if scoped {
                format!("{enum_name}_{name}")
            } else {
                name.to_owned()
            };
            self.constants.push((name, value));
        }
        self
    }

    pub fn native_path(&self) -> &str {
        &self.native_path
    }

    /// Host namespace path, see [`module_path`].
    pub fn host_path(&self) -> Vec<String> {
        module_path(&self.native_path)
    }

    pub fn functions(&self) -> &[OverloadSet] {
        &self.functions
    }

    pub fn constants(&self) -> &[(String, i64)] {
        &self.constants
    }

    /// Number of registered functions and constants.
    pub fn item_count(&self) -> usize {
        self.functions.len() + self.constants.len()
    }
}

/// Host namespace path of a dotted native namespace.
///
/// The root `cv` segment maps to the top-level module itself; every other
/// segment is capitalized: `cv.aruco` becomes `["Aruco"]`.
pub fn module_path(native_path: &str) -> Vec<String> {
    native_path
        .split('.')
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .filter(|&(i, segment)| !(i == 0 && segment == "cv"))
        .map(|(_, segment)| capitalize(segment))
        .collect()
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// How a constant name is treated on installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantVisibility {
    /// Installed as a module constant.
    Exposed,
    /// Private to the binding; never installed.
    Private,
    /// Lowercase-leading; belongs to a namespaced flag table.
    Skipped,
}

/// Classify a constant name.
pub fn constant_visibility(name: &str) -> ConstantVisibility {
    match name.chars().next() {
        Some('_') => ConstantVisibility::Private,
        Some(c) if c.is_uppercase() => ConstantVisibility::Exposed,
        _ => ConstantVisibility::Skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvbind_core::Value;
    use cvbind_dispatch::Signature;

    #[test]
    fn module_path_drops_root_and_capitalizes() {
        assert!(module_path("cv").is_empty());
        assert_eq!(module_path("cv.aruco"), ["Aruco"]);
        assert_eq!(module_path("cv.dnn.superres"), ["Dnn", "Superres"]);
        assert_eq!(module_path("ml"), ["Ml"]);
    }

    #[test]
    fn scoped_enum_values_are_prefixed() {
        let module = Module::new("cv")
            .enum_values("AccessFlag", true, [("ACCESS_READ", 1), ("ACCESS_WRITE", 2)])
            .enum_values("", false, [("IMREAD_COLOR", 1)]);
        let names: Vec<_> = module.constants().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            ["AccessFlag_ACCESS_READ", "AccessFlag_ACCESS_WRITE", "IMREAD_COLOR"]
        );
    }

    #[test]
    fn constant_naming_rules() {
        assert_eq!(constant_visibility("CV_8U"), ConstantVisibility::Exposed);
        assert_eq!(constant_visibility("_INTERNAL"), ConstantVisibility::Private);
        assert_eq!(constant_visibility("flag_x"), ConstantVisibility::Skipped);
        assert_eq!(constant_visibility(""), ConstantVisibility::Skipped);
    }

    #[test]
    fn same_name_merges_candidates() {
        let sig = || Signature::new("f", []);
        let module = Module::new("cv")
            .function(OverloadSet::new("f").overload(sig(), |_| Ok(Value::Nil)))
            .function(OverloadSet::new("f").overload(sig(), |_| Ok(Value::Int(1))));
        assert_eq!(module.functions().len(), 1);
        assert_eq!(module.functions()[0].len(), 2);
    }
}
