//! JSON snapshot of a QP/LP subproblem.
//!
//! Written when a subproblem solve fails fatally so the exact instance can be
//! replayed against a backend offline. Infinite bounds are stored as the
//! strings `"inf"` / `"-inf"` since JSON has no representation for them.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SqpResult;
use crate::linalg::{CompressedColumn, SparseTriplet, Vector};

use super::backend::{ProblemType, QpData};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QpDump {
    pub problem_type: ProblemType,
    pub num_variables: usize,
    pub num_constraints: usize,
    #[serde(with = "extended_reals")]
    pub lb: Vec<f64>,
    #[serde(with = "extended_reals")]
    pub ub: Vec<f64>,
    #[serde(with = "extended_reals")]
    pub lb_a: Vec<f64>,
    #[serde(with = "extended_reals")]
    pub ub_a: Vec<f64>,
    pub g: Vec<f64>,
    /// Upper triangle, column-major.
    pub hessian: Option<SparseTriplet>,
    /// Full constraint matrix including the slack identity blocks.
    pub jacobian: Option<SparseTriplet>,
}

impl QpDump {
    pub fn from_data(data: &QpData) -> SqpResult<Self> {
        Ok(Self {
            problem_type: data.problem_type,
            num_variables: data.num_variables,
            num_constraints: data.num_constraints,
            lb: data.lb.values().to_vec(),
            ub: data.ub.values().to_vec(),
            lb_a: data.lb_a.values().to_vec(),
            ub_a: data.ub_a.values().to_vec(),
            g: data.g.values().to_vec(),
            hessian: data.hessian.as_ref().map(|h| h.to_triplet()).transpose()?,
            jacobian: data.jacobian.as_ref().map(|a| a.to_triplet()).transpose()?,
        })
    }

    /// Rebuild the subproblem storage this dump was taken from.
    pub fn to_data(&self) -> SqpResult<QpData> {
        let mut data = QpData::new(self.problem_type, self.num_variables, self.num_constraints);
        data.lb = Vector::from_slice(&self.lb);
        data.ub = Vector::from_slice(&self.ub);
        data.lb_a = Vector::from_slice(&self.lb_a);
        data.ub_a = Vector::from_slice(&self.ub_a);
        data.g = Vector::from_slice(&self.g);
        data.hessian = self
            .hessian
            .as_ref()
            .map(CompressedColumn::from_triplet)
            .transpose()?;
        data.jacobian = self
            .jacobian
            .as_ref()
            .map(CompressedColumn::from_triplet)
            .transpose()?;
        Ok(data)
    }

    pub fn write_json(&self, path: &Path) -> SqpResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> SqpResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

mod extended_reals {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = values
            .iter()
            .map(|&v| {
                if v == f64::INFINITY {
                    Entry::Text("inf".to_string())
                } else if v == f64::NEG_INFINITY {
                    Entry::Text("-inf".to_string())
                } else {
                    Entry::Number(v)
                }
            })
            .collect();
        entries.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Entry>::deserialize(d)?
            .into_iter()
            .map(|entry| match entry {
                Entry::Number(v) => Ok(v),
                Entry::Text(t) => match t.as_str() {
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    other => Err(serde::de::Error::custom(format!(
                        "unexpected bound value {other:?}"
                    ))),
                },
            })
            .collect()
    }
}
