//! Incrementally filled design vector map
//!
//! Used for bounds and initial guesses: the driver writes values by name,
//! optionally scoped to one timestep, then asks which entries are still
//! missing before flattening the result.

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;
use serde::Serialize;

use crate::dae::{Namespace, Schema};
use crate::error::MapError;

use super::table::MaskedTable;

/// Entries of a [`WritableDesignMap`] that were never written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingEntries {
    /// State name and its unset timesteps, in schema order, only names with
    /// at least one unset timestep
    pub states: Vec<(String, Vec<usize>)>,
    /// Unset parameter names in schema order
    pub parameters: Vec<String>,
}

impl MissingEntries {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.parameters.is_empty()
    }

    /// Unset timesteps of one state, if any
    pub fn state(&self, name: &str) -> Option<&[usize]> {
        self.states
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, steps)| steps.as_slice())
    }
}

impl fmt::Display for MissingEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .states
            .iter()
            .map(|(name, steps)| format!("{name} {steps:?}"))
            .collect();
        parts.extend(self.parameters.iter().cloned());
        f.write_str(&parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WritableDesignMap {
    schema: Arc<Schema>,
    nk: usize,
    states: MaskedTable,
    parameters: MaskedTable,
}

impl WritableDesignMap {
    /// Every entry starts out unset
    pub fn new(schema: Arc<Schema>, nk: usize) -> Self {
        let states = MaskedTable::new(nk + 1, schema.nx());
        let parameters = MaskedTable::new(1, schema.np());
        Self {
            schema,
            nk,
            states,
            parameters,
        }
    }

    pub fn nk(&self) -> usize {
        self.nk
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn check_timestep(&self, name: &str, timestep: usize) -> Result<(), MapError> {
        if timestep > self.nk {
            return Err(MapError::TimestepOutOfRange {
                name: name.to_string(),
                timestep,
                limit: self.nk + 1,
            });
        }
        Ok(())
    }

    fn unknown(name: &str) -> MapError {
        MapError::UnknownName {
            name: name.to_string(),
            namespace: Namespace::Design,
        }
    }

    /// Write a state at one node (or at every node when `timestep` is
    /// `None`), or a parameter (`timestep` must be `None`)
    pub fn set_value(
        &mut self,
        name: &str,
        value: f64,
        timestep: Option<usize>,
    ) -> Result<(), MapError> {
        match self.schema.resolve(name) {
            Some((Namespace::State, k)) => match timestep {
                None => {
                    self.states.fill_column(k, value);
                    Ok(())
                }
                Some(t) => {
                    self.check_timestep(name, t)?;
                    self.states.set(t, k, value);
                    Ok(())
                }
            },
            Some((Namespace::Parameter, k)) => match timestep {
                Some(t) => Err(MapError::TimestepNotAllowed {
                    name: name.to_string(),
                    timestep: t,
                }),
                None => {
                    self.parameters.set(0, k, value);
                    Ok(())
                }
            },
            _ => Err(Self::unknown(name)),
        }
    }

    /// Read back an entry, `None` while it is unset
    pub fn lookup(&self, name: &str, timestep: Option<usize>) -> Result<Option<f64>, MapError> {
        match self.schema.resolve(name) {
            Some((Namespace::State, k)) => {
                let t = timestep.ok_or_else(|| MapError::TimestepRequired {
                    name: name.to_string(),
                })?;
                self.check_timestep(name, t)?;
                Ok(self.states.get(t, k))
            }
            Some((Namespace::Parameter, k)) => match timestep {
                Some(t) => Err(MapError::TimestepNotAllowed {
                    name: name.to_string(),
                    timestep: t,
                }),
                None => Ok(self.parameters.get(0, k)),
            },
            _ => Err(Self::unknown(name)),
        }
    }

    /// Flat layout `[p, x_0, .., x_nk]`; unset entries come out as NaN
    ///
    /// Completeness is not checked, see [`missing_entries`](Self::missing_entries).
    pub fn vectorize(&self) -> DVector<f64> {
        let mut flat = Vec::with_capacity(self.schema.design_len(self.nk));
        flat.extend(self.parameters.row_values(0));
        for t in 0..=self.nk {
            flat.extend(self.states.row_values(t));
        }
        DVector::from_vec(flat)
    }

    pub fn missing_entries(&self) -> MissingEntries {
        let states = self
            .schema
            .state_names()
            .iter()
            .enumerate()
            .filter_map(|(k, name)| {
                let unset = self.states.unset_rows(k);
                (!unset.is_empty()).then(|| (name.clone(), unset))
            })
            .collect();

        let parameters = self
            .schema
            .parameter_names()
            .iter()
            .enumerate()
            .filter(|(k, _)| self.parameters.get(0, *k).is_none())
            .map(|(_, name)| name.clone())
            .collect();

        MissingEntries { states, parameters }
    }

    pub fn is_complete(&self) -> bool {
        self.states.is_complete() && self.parameters.is_complete()
    }
}
