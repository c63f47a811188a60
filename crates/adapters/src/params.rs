//! Resolved key/value parameters of a resource.
//!
//! Keys are matched case-insensitively, so `bandMixer`, `bandmixer` and
//! `BANDMIXER` name the same parameter.

use std::collections::BTreeMap;
use std::sync::Arc;

use coverage_processor::{EncodeOptions, ExpressionTransform, Interpolation};
use geo_common::ObservableKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, Result};

pub const BAND: &str = "band";
pub const BAND_MIXER: &str = "bandmixer";
pub const NODATA: &str = "nodata";
pub const INTERPOLATION: &str = "interpolation";
pub const TRANSFORM: &str = "transform";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceParameters(BTreeMap<String, Value>);

impl ResourceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Text form of a parameter; numbers and booleans are rendered.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key)
            .ok_or_else(|| AdapterError::MissingParameter(key.to_string()))
    }

    /// Numeric parameter, accepting numbers written as strings.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| AdapterError::invalid_parameter(key, "not a finite number")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| AdapterError::invalid_parameter(key, format!("'{}' is not a number", s))),
            Some(other) => Err(AdapterError::invalid_parameter(
                key,
                format!("expected a number, got {}", other),
            )),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.get_f64(key)? {
            None => Ok(None),
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as usize)),
            Some(v) => Err(AdapterError::invalid_parameter(
                key,
                format!("{} is not a non-negative integer", v),
            )),
        }
    }

    pub fn nodata(&self) -> Result<Option<f64>> {
        self.get_f64(NODATA)
    }

    /// Band selection, mixer, resource nodata and transform.
    ///
    /// The transform is compiled here so that a bad expression fails before
    /// any data is fetched.
    pub fn encode_options(&self) -> Result<EncodeOptions> {
        let mut options = EncodeOptions::default().with_band(self.get_usize(BAND)?.unwrap_or(0));
        if let Some(mixer) = self.get_str(BAND_MIXER) {
            options = options.with_band_mixer(mixer);
        }
        if let Some(nodata) = self.nodata()? {
            options = options.with_nodata(nodata);
        }
        if let Some(expression) = self.get_str(TRANSFORM) {
            options = options.with_transform(Arc::new(ExpressionTransform::compile(&expression)?));
        }
        Ok(options)
    }

    /// Kernel for this resource: the request's explicit choice, then the
    /// resource default, then the observable's default.
    pub fn interpolation(&self, explicit: Option<&str>, observable: &ObservableKind) -> Result<Interpolation> {
        let resource_default = self.get_str(INTERPOLATION);
        Ok(Interpolation::resolve(explicit, resource_default.as_deref(), observable)?)
    }
}

impl FromIterator<(String, Value)> for ResourceParameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
