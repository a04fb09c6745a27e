//! Serialized program files.
//!
//! A program file lists methods in the same shape as [`Method`], with calls
//! still symbolic. Loading one runs the full verification of
//! [`MethodTable::load`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::Method;
use crate::fault::LoadError;
use crate::table::MethodTable;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgramFile {
    pub methods: Vec<Method>,
}

#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("invalid JSON program: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML program: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
}

pub fn from_json(text: &str) -> Result<MethodTable, InterchangeError> {
    let file: ProgramFile = serde_json::from_str(text)?;
    Ok(MethodTable::load(file.methods)?)
}

pub fn from_yaml(text: &str) -> Result<MethodTable, InterchangeError> {
    let file: ProgramFile = serde_yaml::from_str(text)?;
    Ok(MethodTable::load(file.methods)?)
}

pub fn to_json(methods: &[Method]) -> Result<String, InterchangeError> {
    let file = ProgramFile {
        methods: methods.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}
