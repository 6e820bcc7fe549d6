//! Dispersion lookup tables
//!
//! A table maps period -> damping -> hardening ratio -> ductility to a
//! dispersion vector sampled at the dynamic ductilities listed under the
//! top-level `"ductility"` key. The four outer levels are matched to the
//! nearest available key; only the final dynamic-ductility step is
//! interpolated.
//!
//! ```json
//! {
//!   "ductility": [0.5, 1.0, 2.0],
//!   "1.0": {"0.05": {"0.02": {"4.0": [0.1, 0.2, 0.3]}}}
//! }
//! ```
//!
//! `null` entries in a vector are read as NaN.

use crate::error::{Result, RhomutError};
use crate::models::Diagnostic;
use anyhow::Context;
use serde_json::{Map, Value};

/// Top-level key holding the dynamic-ductility grid
pub const DUCTILITY_GRID_KEY: &str = "ductility";

/// Keys of one nesting level sorted ascending, with their entries
#[derive(Debug, Clone, PartialEq)]
struct NearestIndex<T> {
    keys: Vec<f64>,
    values: Vec<T>,
}

impl<T> NearestIndex<T> {
    /// Entries whose keys are not numbers are skipped
    fn from_object<F>(map: Map<String, Value>, level: &str, parse: F) -> anyhow::Result<Self>
    where
        F: Fn(Value) -> anyhow::Result<T>,
    {
        let mut entries = Vec::new();
        for (key, value) in map {
            let Some(numeric) = key.trim().parse::<f64>().ok().filter(|k| k.is_finite()) else {
                continue;
            };
            let parsed = parse(value).with_context(|| format!("{level} {key}"))?;
            entries.push((numeric, parsed));
        }
        if entries.is_empty() {
            anyhow::bail!("no numeric {level} keys");
        }

        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (keys, values) = entries.into_iter().unzip();
        Ok(Self { keys, values })
    }

    /// Entry with the key closest to `query`; ties go to the smaller key
    fn nearest(&self, query: f64) -> &T {
        let idx = self.keys.partition_point(|k| *k < query);
        if idx == 0 {
            return &self.values[0];
        }
        if idx == self.keys.len() {
            return &self.values[idx - 1];
        }
        if (self.keys[idx] - query).abs() < (query - self.keys[idx - 1]).abs() {
            &self.values[idx]
        } else {
            &self.values[idx - 1]
        }
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }
}

/// Dispersion stored at the end of a key path
#[derive(Debug, Clone, PartialEq)]
pub enum DispersionLeaf {
    Scalar(f64),
    Vector(Vec<f64>),
}

type HardeningLevel = NearestIndex<NearestIndex<DispersionLeaf>>;
type DampingLevel = NearestIndex<HardeningLevel>;
type PeriodLevel = NearestIndex<DampingLevel>;

/// Dispersion resolved for one query, with the warning raised on fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDispersion {
    pub value: f64,
    pub diagnostic: Option<Diagnostic>,
}

/// Query coordinates for a dispersion lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispersionQuery {
    pub period: f64,
    pub damping: f64,
    pub hardening_ratio: f64,
    pub ductility: f64,
    pub dynamic_ductility: Option<f64>,
}

/// Parsed dispersion table with numeric indexes at every level
#[derive(Debug, Clone, PartialEq)]
pub struct DispersionTable {
    ductility_grid: Vec<f64>,
    periods: PeriodLevel,
}

impl DispersionTable {
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_slice(bytes).context("Failed to parse dispersion JSON")?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let Value::Object(mut root) = value else {
            anyhow::bail!("dispersion table must be a JSON object");
        };

        let ductility_grid = match root.remove(DUCTILITY_GRID_KEY) {
            Some(grid) => parse_vector(grid).context("ductility grid")?,
            None => Vec::new(),
        };
        if ductility_grid
            .windows(2)
            .any(|w| w[1].partial_cmp(&w[0]) != Some(std::cmp::Ordering::Greater))
        {
            anyhow::bail!("ductility grid must be strictly increasing");
        }

        let periods = NearestIndex::from_object(root, "period", |v| {
            NearestIndex::from_object(as_object(v)?, "damping", |v| {
                NearestIndex::from_object(as_object(v)?, "hardening ratio", |v| {
                    NearestIndex::from_object(as_object(v)?, "ductility", parse_leaf)
                })
            })
        })?;

        let table = Self {
            ductility_grid,
            periods,
        };
        table.check_vector_lengths()?;
        Ok(table)
    }

    /// Dynamic-ductility sample points of the dispersion vectors
    pub fn ductility_grid(&self) -> &[f64] {
        &self.ductility_grid
    }

    fn check_vector_lengths(&self) -> anyhow::Result<()> {
        if self.ductility_grid.is_empty() {
            return Ok(());
        }
        let expected = self.ductility_grid.len();
        let leaves = self
            .periods
            .values()
            .flat_map(|d| d.values())
            .flat_map(|h| h.values())
            .flat_map(|m| m.values());
        for leaf in leaves {
            if let DispersionLeaf::Vector(v) = leaf {
                if v.len() != expected {
                    anyhow::bail!(
                        "dispersion vector has {} values but the ductility grid has {}",
                        v.len(),
                        expected
                    );
                }
            }
        }
        Ok(())
    }

    /// Nearest-key entry for the four physical parameters
    pub fn lookup(&self, query: &DispersionQuery) -> &DispersionLeaf {
        self.periods
            .nearest(query.period)
            .nearest(query.damping)
            .nearest(query.hardening_ratio)
            .nearest(query.ductility)
    }

    /// Resolve the dispersion for `query`.
    ///
    /// Collapse entries are returned as stored. Otherwise the entry is
    /// interpolated at the dynamic ductility; a NaN or zero result falls back
    /// to the largest dispersion in the entry.
    pub fn resolve(&self, query: &DispersionQuery, collapse: bool) -> Result<ResolvedDispersion> {
        let leaf = self.lookup(query);

        if collapse {
            let value = match leaf {
                DispersionLeaf::Scalar(v) => *v,
                DispersionLeaf::Vector(v) => *v.first().ok_or_else(|| {
                    RhomutError::Inference("empty collapse dispersion entry".to_string())
                })?,
            };
            return Ok(ResolvedDispersion {
                value,
                diagnostic: None,
            });
        }

        let dynamic_ductility = query.dynamic_ductility.ok_or_else(|| {
            RhomutError::Inference("non-collapse dispersion requires a dynamic ductility".to_string())
        })?;

        let vector = match leaf {
            DispersionLeaf::Scalar(v) => {
                return Ok(ResolvedDispersion {
                    value: *v,
                    diagnostic: None,
                })
            }
            DispersionLeaf::Vector(v) => v,
        };
        if self.ductility_grid.is_empty() {
            return Err(RhomutError::Inference(
                "dispersion table has no ductility grid".to_string(),
            ));
        }

        let value = interpolate_or_last(&self.ductility_grid, vector, dynamic_ductility);
        if value.is_nan() || value == 0.0 {
            let fallback = max_finite(vector);
            return Ok(ResolvedDispersion {
                value: fallback,
                diagnostic: Some(Diagnostic::UnattainableDuctility {
                    dynamic_ductility,
                    fallback_dispersion: fallback,
                }),
            });
        }

        Ok(ResolvedDispersion {
            value,
            diagnostic: None,
        })
    }
}

/// Linear interpolation of `ys` over increasing `xs`; outside the grid the
/// last sample is returned
pub fn interpolate_or_last(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let (Some(first), Some(last), Some(fill)) = (xs.first(), xs.last(), ys.last()) else {
        return f64::NAN;
    };
    if x.is_nan() || x < *first || x > *last {
        return *fill;
    }

    let idx = xs.partition_point(|v| *v < x);
    if idx == 0 {
        return ys[0];
    }
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let (y0, y1) = (ys[idx - 1], ys[idx]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn max_finite(values: &[f64]) -> f64 {
    let max = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() {
        max
    } else {
        0.0
    }
}

fn as_object(value: Value) -> anyhow::Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, found {}", type_name(&other)),
    }
}

fn parse_leaf(value: Value) -> anyhow::Result<DispersionLeaf> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(DispersionLeaf::Scalar)
            .context("invalid dispersion number"),
        Value::Array(_) => parse_vector(value).map(DispersionLeaf::Vector),
        other => anyhow::bail!("expected a number or array, found {}", type_name(&other)),
    }
}

fn parse_vector(value: Value) -> anyhow::Result<Vec<f64>> {
    let Value::Array(items) = value else {
        anyhow::bail!("expected an array, found {}", type_name(&value));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Number(n) => n.as_f64().context("invalid number"),
            Value::Null => Ok(f64::NAN),
            other => anyhow::bail!("expected a number, found {}", type_name(&other)),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
