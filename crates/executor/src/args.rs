//! Argument extraction for loosely typed invocations
//!
//! Every accessor fails with InvalidArgument when the argument is missing,
//! `null` or of the wrong JSON type.

use distkv_core::{Entry, Error, Result, Value};
use distkv_wire::{decode_entries, decode_loose};
use serde_json::Value as Json;

/// Positional arguments of one invocation
pub(crate) struct Args<'a> {
    method: &'a str,
    args: &'a [Json],
}

impl<'a> Args<'a> {
    pub(crate) fn new(method: &'a str, args: &'a [Json]) -> Self {
        Self { method, args }
    }

    pub(crate) fn len(&self) -> usize {
        self.args.len()
    }

    fn err(&self, msg: impl std::fmt::Display) -> Error {
        Error::InvalidArgument(format!("{}: {}", self.method, msg))
    }

    /// The method takes no arguments
    pub(crate) fn none(&self) -> Result<()> {
        if self.args.is_empty() {
            Ok(())
        } else {
            Err(self.err(format!("takes no arguments, got {}", self.args.len())))
        }
    }

    /// Argument count must lie in `min..=max`
    pub(crate) fn arity(&self, min: usize, max: usize) -> Result<()> {
        let n = self.args.len();
        if n < min || n > max {
            if min == max {
                return Err(self.err(format!("expects {} arguments, got {}", min, n)));
            }
            return Err(self.err(format!("expects {} to {} arguments, got {}", min, max, n)));
        }
        Ok(())
    }

    fn get(&self, i: usize) -> Result<&'a Json> {
        match self.args.get(i) {
            None => Err(self.err(format!("argument {} is missing", i))),
            Some(Json::Null) => Err(self.err(format!("argument {} is null", i))),
            Some(v) => Ok(v),
        }
    }

    pub(crate) fn raw(&self, i: usize) -> Result<&'a Json> {
        self.get(i)
    }

    pub(crate) fn string(&self, i: usize) -> Result<String> {
        self.get(i)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.err(format!("argument {} must be a string", i)))
    }

    pub(crate) fn bool(&self, i: usize) -> Result<bool> {
        self.get(i)?
            .as_bool()
            .ok_or_else(|| self.err(format!("argument {} must be a boolean", i)))
    }

    pub(crate) fn u32(&self, i: usize) -> Result<u32> {
        self.get(i)?
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.err(format!("argument {} must be a non-negative integer", i)))
    }

    pub(crate) fn i64(&self, i: usize) -> Result<i64> {
        let v = self.get(i)?;
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| self.err(format!("argument {} must be an integer", i)))
    }

    pub(crate) fn value(&self, i: usize) -> Result<Value> {
        decode_loose(self.get(i)?).map_err(|e| self.err(format!("argument {}: {}", i, e)))
    }

    pub(crate) fn strings(&self, i: usize) -> Result<Vec<String>> {
        let items = self
            .get(i)?
            .as_array()
            .ok_or_else(|| self.err(format!("argument {} must be an array of strings", i)))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.err(format!("argument {} must hold only strings", i)))
            })
            .collect()
    }

    pub(crate) fn entries(&self, i: usize) -> Result<Vec<Entry>> {
        decode_entries(self.get(i)?).map_err(|e| self.err(format!("argument {}: {}", i, e)))
    }
}
