//! Read-only design vector map
//!
//! Layout of the flat design vector for `nk` intervals:
//!
//! ```text
//! [ p (np) | x_0 (nx) | x_1 (nx) | ... | x_nk (nx) ]
//! ```
//!
//! Controls are not part of this vector; see
//! [`ControlMatrix`](super::ControlMatrix).

use crate::dae::{Namespace, Schema};
use crate::error::{MapError, Shape};

/// Named, per-timestep view over a borrowed flat design vector
///
/// Works for numeric (`f64`) and symbolic (`Expr`) vectors alike.
#[derive(Debug)]
pub struct DesignVectorMap<'a, T> {
    schema: &'a Schema,
    nk: usize,
    vec: &'a [T],
}

impl<T> Clone for DesignVectorMap<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DesignVectorMap<'_, T> {}

impl<'a, T> DesignVectorMap<'a, T> {
    /// Wrap `vec`, which must have length `np + nx*(nk+1)`
    pub fn new(schema: &'a Schema, nk: usize, vec: &'a [T]) -> Result<Self, MapError> {
        let expected = schema.design_len(nk);
        if vec.len() != expected {
            return Err(MapError::ShapeMismatch {
                what: "design vector".to_string(),
                expected: Shape::vector(expected),
                got: Shape::vector(vec.len()),
            });
        }
        Ok(Self { schema, nk, vec })
    }

    pub fn nk(&self) -> usize {
        self.nk
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    fn node_slice(&self, name: &str, timestep: usize) -> Result<&'a [T], MapError> {
        if timestep > self.nk {
            return Err(MapError::TimestepOutOfRange {
                name: name.to_string(),
                timestep,
                limit: self.nk + 1,
            });
        }
        let nx = self.schema.nx();
        let start = self.schema.np() + timestep * nx;
        Ok(&self.vec[start..start + nx])
    }

    /// States at node `timestep`, `0 <= timestep <= nk`
    pub fn state_slice(&self, timestep: usize) -> Result<&'a [T], MapError> {
        self.node_slice("state vector", timestep)
    }

    /// The shared parameters
    pub fn parameter_slice(&self) -> &'a [T] {
        &self.vec[..self.schema.np()]
    }

    /// Look up a state (timestep required) or a parameter (no timestep)
    pub fn lookup(&self, name: &str, timestep: Option<usize>) -> Result<&'a T, MapError> {
        match self.schema.resolve(name) {
            Some((Namespace::State, k)) => {
                let timestep = timestep.ok_or_else(|| MapError::TimestepRequired {
                    name: name.to_string(),
                })?;
                Ok(&self.node_slice(name, timestep)?[k])
            }
            Some((Namespace::Parameter, k)) => match timestep {
                Some(timestep) => Err(MapError::TimestepNotAllowed {
                    name: name.to_string(),
                    timestep,
                }),
                None => Ok(&self.parameter_slice()[k]),
            },
            _ => Err(MapError::UnknownName {
                name: name.to_string(),
                namespace: Namespace::Design,
            }),
        }
    }

    /// The wrapped flat vector
    pub fn vectorize(&self) -> &'a [T] {
        self.vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::Expr;

    fn xy_schema() -> Schema {
        Schema::new(&["x", "y"], &["u"], &["w0"]).unwrap()
    }

    #[test]
    fn test_slices() {
        let schema = xy_schema();
        let vec = [9.0, 1.0, 2.0, 3.0, 4.0];
        let map = DesignVectorMap::new(&schema, 1, &vec).unwrap();

        assert_eq!(map.parameter_slice(), &[9.0]);
        assert_eq!(map.state_slice(0).unwrap(), &[1.0, 2.0]);
        assert_eq!(map.state_slice(1).unwrap(), &[3.0, 4.0]);
        assert!(matches!(
            map.state_slice(2),
            Err(MapError::TimestepOutOfRange { timestep: 2, limit: 2, .. })
        ));
    }

    #[test]
    fn test_lookup_guards() {
        let schema = xy_schema();
        let vec = [9.0, 1.0, 2.0, 3.0, 4.0];
        let map = DesignVectorMap::new(&schema, 1, &vec).unwrap();

        assert_eq!(map.lookup("y", Some(1)), Ok(&4.0));
        assert_eq!(map.lookup("w0", None), Ok(&9.0));
        assert!(matches!(map.lookup("x", None), Err(MapError::TimestepRequired { .. })));
        assert!(matches!(
            map.lookup("w0", Some(0)),
            Err(MapError::TimestepNotAllowed { timestep: 0, .. })
        ));
        assert!(matches!(
            map.lookup("u", Some(0)),
            Err(MapError::UnknownName {
                namespace: Namespace::Design,
                ..
            })
        ));
    }

    #[test]
    fn test_symbolic_vector() {
        let schema = xy_schema();
        let vec = Expr::symbols("dv", schema.design_len(2));
        let map = DesignVectorMap::new(&schema, 2, &vec).unwrap();
        let y2 = map.lookup("y", Some(2)).unwrap();
        assert_eq!(y2.symbol_ref(), vec[6].symbol_ref());
    }
}
