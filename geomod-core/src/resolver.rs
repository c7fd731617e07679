//! Dependency resolver - computes a load order over the catalog
//!
//! Depth-first topological sort over dependency names. Marks live only for
//! the duration of one call; the graph itself is never materialized.

use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::error::PluginError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Walk<'a> {
    catalog: &'a Catalog,
    marks: HashMap<&'a str, Mark>,
    path: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, name: &'a str) -> Result<(), PluginError> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|n| *n == name).unwrap_or(0);
                let mut names: Vec<String> =
                    self.path[start..].iter().map(|n| n.to_string()).collect();
                names.push(name.to_string());
                return Err(PluginError::CyclicDependency { names });
            }
            None => {}
        }

        let catalog = self.catalog;
        let descriptor = catalog
            .get(name)
            .ok_or_else(|| PluginError::not_found(name))?;

        self.marks.insert(name, Mark::Visiting);
        self.path.push(name);

        for dep in &descriptor.dependencies {
            if !catalog.contains(dep) {
                return Err(PluginError::MissingDependency {
                    dependent: name.to_string(),
                    missing: dep.clone(),
                });
            }
            self.visit(dep)?;
        }

        self.path.pop();
        self.marks.insert(name, Mark::Done);
        self.order.push(name.to_string());
        Ok(())
    }
}

/// Order `requested` plus everything they transitively need.
///
/// Every dependency appears strictly before its dependents. Independent
/// plugins keep the order of `requested`, and dependencies are visited in
/// declared order, so the result is deterministic.
///
/// # Errors
///
/// - [`PluginError::NotFound`] if a requested name is not in the catalog
/// - [`PluginError::MissingDependency`] if a dependency is not in the catalog
/// - [`PluginError::CyclicDependency`] with the cycle path, e.g. `A -> B -> A`
pub fn resolve<S: AsRef<str>>(requested: &[S], catalog: &Catalog) -> Result<Vec<String>, PluginError> {
    let mut walk = Walk {
        catalog,
        marks: HashMap::new(),
        path: Vec::new(),
        order: Vec::new(),
    };

    for name in requested {
        let name = name.as_ref();
        let descriptor = catalog
            .get(name)
            .ok_or_else(|| PluginError::not_found(name))?;
        walk.visit(&descriptor.name)?;
    }

    Ok(walk.order)
}

/// Names among `candidates` that directly depend on `name`.
pub fn dependents<'c>(
    name: &str,
    candidates: impl IntoIterator<Item = &'c str>,
    catalog: &Catalog,
) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|candidate| *candidate != name)
        .filter(|candidate| catalog.get(candidate).is_some_and(|d| d.depends_on(name)))
        .map(str::to_string)
        .collect()
}
