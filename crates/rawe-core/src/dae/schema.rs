//! Named variable schema
//!
//! Ordered state, control and parameter names of a dynamic model, with
//! name→index tables built once so every lookup is a hash probe.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Kind of a model name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    State,
    Control,
    Parameter,
    Algebraic,
    Output,
    /// States and parameters together, the names stored in a design vector
    Design,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Namespace::State => "state",
            Namespace::Control => "control",
            Namespace::Parameter => "parameter",
            Namespace::Algebraic => "algebraic",
            Namespace::Output => "output",
            Namespace::Design => "design vector",
        };
        f.write_str(label)
    }
}

/// Ordered unique names with O(1) position lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl NameTable {
    pub fn new<I, S>(names: I, namespace: Namespace) -> Result<Self, MapError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for name in names {
            table.push(name.into(), namespace)?;
        }
        Ok(table)
    }

    pub(crate) fn push(&mut self, name: String, namespace: Namespace) -> Result<usize, MapError> {
        if self.index.contains_key(&name) {
            return Err(MapError::DuplicateName { name, namespace });
        }
        let k = self.names.len();
        self.index.insert(name.clone(), k);
        self.names.push(name);
        Ok(k)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// State, control and parameter names of one model
///
/// A name may appear in at most one of the three sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    states: NameTable,
    controls: NameTable,
    parameters: NameTable,
}

impl Schema {
    pub fn new<S: AsRef<str>>(
        states: &[S],
        controls: &[S],
        parameters: &[S],
    ) -> Result<Self, MapError> {
        let states = NameTable::new(states.iter().map(|s| s.as_ref()), Namespace::State)?;
        let controls = NameTable::new(controls.iter().map(|s| s.as_ref()), Namespace::Control)?;
        let parameters =
            NameTable::new(parameters.iter().map(|s| s.as_ref()), Namespace::Parameter)?;

        let schema = Self {
            states,
            controls,
            parameters,
        };
        schema.check_disjoint()?;
        Ok(schema)
    }

    fn check_disjoint(&self) -> Result<(), MapError> {
        for name in self.controls.names() {
            if self.states.contains(name) {
                return Err(MapError::DuplicateName {
                    name: name.clone(),
                    namespace: Namespace::State,
                });
            }
        }
        for name in self.parameters.names() {
            if let Some((namespace, _)) = self.resolve(name).filter(|(ns, _)| *ns != Namespace::Parameter) {
                return Err(MapError::DuplicateName {
                    name: name.clone(),
                    namespace,
                });
            }
        }
        Ok(())
    }

    pub fn state_names(&self) -> &[String] {
        self.states.names()
    }

    pub fn control_names(&self) -> &[String] {
        self.controls.names()
    }

    pub fn parameter_names(&self) -> &[String] {
        self.parameters.names()
    }

    pub fn nx(&self) -> usize {
        self.states.len()
    }

    pub fn nu(&self) -> usize {
        self.controls.len()
    }

    pub fn np(&self) -> usize {
        self.parameters.len()
    }

    /// Length of the flat design vector for `nk` intervals
    pub fn design_len(&self, nk: usize) -> usize {
        self.np() + self.nx() * (nk + 1)
    }

    /// Position of `name` within one namespace
    pub fn index_of(&self, namespace: Namespace, name: &str) -> Result<usize, MapError> {
        let found = match namespace {
            Namespace::State => self.states.get(name),
            Namespace::Control => self.controls.get(name),
            Namespace::Parameter => self.parameters.get(name),
            Namespace::Design => self.states.get(name).or_else(|| self.parameters.get(name)),
            Namespace::Algebraic | Namespace::Output => None,
        };
        found.ok_or_else(|| MapError::UnknownName {
            name: name.to_string(),
            namespace,
        })
    }

    /// Which namespace `name` belongs to and its position there
    pub fn resolve(&self, name: &str) -> Option<(Namespace, usize)> {
        if let Some(k) = self.states.get(name) {
            Some((Namespace::State, k))
        } else if let Some(k) = self.controls.get(name) {
            Some((Namespace::Control, k))
        } else {
            self.parameters.get(name).map(|k| (Namespace::Parameter, k))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(&["x", "y"], &["u"], &["endTime"]).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let s = schema();
        assert_eq!((s.nx(), s.nu(), s.np()), (2, 1, 1));
        assert_eq!(s.design_len(3), 1 + 2 * 4);
    }

    #[test]
    fn test_index_of() {
        let s = schema();
        assert_eq!(s.index_of(Namespace::State, "y"), Ok(1));
        assert_eq!(s.index_of(Namespace::Design, "endTime"), Ok(0));
        assert_eq!(
            s.index_of(Namespace::Parameter, "x"),
            Err(MapError::UnknownName {
                name: "x".into(),
                namespace: Namespace::Parameter
            })
        );
    }

    #[test]
    fn test_resolve() {
        let s = schema();
        assert_eq!(s.resolve("u"), Some((Namespace::Control, 0)));
        assert_eq!(s.resolve("nope"), None);
    }

    #[test]
    fn test_rejects_duplicates() {
        assert!(matches!(
            Schema::new(&["x", "x"], &[], &[]),
            Err(MapError::DuplicateName { .. })
        ));
        assert!(matches!(
            Schema::new(&["x"], &[], &["x"]),
            Err(MapError::DuplicateName {
                namespace: Namespace::State,
                ..
            })
        ));
    }
}
