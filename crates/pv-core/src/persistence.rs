//! Persistence Overlay: snapshots writeable PV payloads to a flat XML file and restores them
//! at startup, per §4.6.
//!
//! The wire format is a flat `PersistentData` document keyed by application name, with one
//! `variable` element per PV and one `val` child per array index. Parsing is tolerant: a
//! missing file is not an error, and a type or length mismatch on reload is downgraded to the
//! PV's own default rather than aborting the load — the in-memory state becomes authoritative
//! again on the next save.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PvError;
use crate::scalar::{PvElement, ValueType};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct XmlVal {
    #[serde(rename = "i")]
    index: usize,
    #[serde(rename = "v")]
    value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct XmlVariable {
    #[serde(rename = "name")]
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(rename = "val", default)]
    vals: Vec<XmlVal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "PersistentData")]
struct XmlDocument {
    #[serde(rename = "application")]
    application: String,
    #[serde(rename = "variable", default)]
    variables: Vec<XmlVariable>,
}

#[derive(Clone, Debug)]
struct StoredVariable {
    value_type: ValueType,
    values: Vec<String>,
}

/// A sink a `Sender` can record writes into. Implemented by [`PersistenceOverlay`]; kept as a
/// trait so `pv::unidirectional` does not need to depend on the XML codec directly.
pub trait PersistenceSink<T>: Send + Sync {
    fn record(&self, name: &str, payload: &[T]);
}

/// Loads, holds, and saves the persisted values for one application.
///
/// Construction reads `<application_name>.persist` from `directory` if it exists; a missing
/// file is treated as "no prior state", not an error. [`PersistenceOverlay::save`] writes the
/// accumulated in-memory state back out, atomically (write to a temp file, then rename).
pub struct PersistenceOverlay {
    application_name: String,
    path: PathBuf,
    state: Mutex<HashMap<String, StoredVariable>>,
}

impl PersistenceOverlay {
    pub fn new(application_name: impl Into<String>, directory: impl AsRef<Path>) -> Self {
        let application_name = application_name.into();
        let path = directory.as_ref().join(format!("{application_name}.persist"));
        let state = Self::load(&path, &application_name);
        Self { application_name, path, state: Mutex::new(state) }
    }

    fn load(path: &Path, application_name: &str) -> HashMap<String, StoredVariable> {
        let mut map = HashMap::new();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = %path.display(), "no persistence file found; starting empty");
                return map;
            }
        };
        let doc: XmlDocument = match serde_xml_rs::from_str(&contents) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse persistence file; starting empty");
                return map;
            }
        };
        if doc.application != application_name {
            warn!(
                expected = application_name,
                found = %doc.application,
                "persistence file application name mismatch; loading anyway"
            );
        }
        for variable in doc.variables {
            let Some(value_type) = ValueType::from_str(&variable.type_name) else {
                warn!(variable = %variable.name, type_name = %variable.type_name, "unknown persisted type; dropping variable");
                continue;
            };
            let max_index = variable.vals.iter().map(|v| v.index).max().unwrap_or(0);
            let mut values = vec![String::new(); max_index + 1];
            for val in variable.vals {
                if let Some(slot) = values.get_mut(val.index) {
                    *slot = val.value;
                }
            }
            map.insert(variable.name.clone(), StoredVariable { value_type, values });
        }
        map
    }

    /// Records a write for later saving. Called by a `Sender`'s write path whenever a
    /// persistence overlay is attached.
    pub fn record<T: PvElement>(&self, name: &str, payload: &[T]) {
        let values = payload.iter().map(PvElement::to_wire).collect();
        let mut state = self.state.lock().expect("persistence overlay lock poisoned");
        state.insert(name.to_string(), StoredVariable { value_type: T::VALUE_TYPE, values });
    }

    /// Restores a previously persisted value for `name` into `out`, if present and
    /// type/length-compatible. Mismatches are logged and treated as "nothing to restore"
    /// rather than an error, per §4.6.
    pub fn restore<T: PvElement>(&self, name: &str, out: &mut [T]) -> bool {
        let state = self.state.lock().expect("persistence overlay lock poisoned");
        let Some(stored) = state.get(name) else {
            return false;
        };
        if stored.value_type != T::VALUE_TYPE {
            warn!(name, expected = %T::VALUE_TYPE, found = %stored.value_type, "persisted type mismatch; using defaults");
            return false;
        }
        if stored.values.len() != out.len() {
            warn!(
                name,
                expected = out.len() as u64,
                found = stored.values.len() as u64,
                "persisted length mismatch; using defaults"
            );
            return false;
        }
        let mut parsed = Vec::with_capacity(stored.values.len());
        for raw in &stored.values {
            match T::from_wire(raw) {
                Some(value) => parsed.push(value),
                None => {
                    warn!(name, raw = %raw, "unparsable persisted value; using defaults for the whole array");
                    return false;
                }
            }
        }
        out.clone_from_slice(&parsed);
        true
    }

    /// Writes the current in-memory state back to `<application_name>.persist`.
    pub fn save(&self) -> Result<(), PvError> {
        let state = self.state.lock().expect("persistence overlay lock poisoned");
        let mut variables: Vec<XmlVariable> = state
            .iter()
            .map(|(name, stored)| XmlVariable {
                name: name.clone(),
                type_name: stored.value_type.as_str().to_string(),
                vals: stored
                    .values
                    .iter()
                    .enumerate()
                    .map(|(index, value)| XmlVal { index, value: value.clone() })
                    .collect(),
            })
            .collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        let doc = XmlDocument { application: self.application_name.clone(), variables };

        let xml = serde_xml_rs::to_string(&doc).map_err(|err| PvError::PersistenceWriteFailure {
            path: self.path.display().to_string(),
            detail: err.to_string(),
        })?;

        let tmp_path = self.path.with_extension("persist.tmp");
        fs::write(&tmp_path, xml).map_err(|err| PvError::PersistenceWriteFailure {
            path: self.path.display().to_string(),
            detail: err.to_string(),
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|err| PvError::PersistenceWriteFailure {
            path: self.path.display().to_string(),
            detail: err.to_string(),
        })?;
        debug!(path = %self.path.display(), count = variables_len(&self.state) as u64, "persistence overlay saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn variables_len(state: &Mutex<HashMap<String, StoredVariable>>) -> usize {
    state.lock().expect("persistence overlay lock poisoned").len()
}

impl<T: PvElement> PersistenceSink<T> for PersistenceOverlay {
    fn record(&self, name: &str, payload: &[T]) {
        PersistenceOverlay::record(self, name, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = PersistenceOverlay::new("demo", dir.path());
        let mut out = [0i32; 3];
        assert!(!overlay.restore("x", &mut out));
    }

    #[test]
    fn round_trips_through_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let overlay = PersistenceOverlay::new("demo", dir.path());
            let values: Vec<u16> = (0..7).map(|i| 17 * i).collect();
            overlay.record("u16arr", &values);
            overlay.save().unwrap();
        }
        let overlay = PersistenceOverlay::new("demo", dir.path());
        let mut out = [0u16; 7];
        assert!(overlay.restore("u16arr", &mut out));
        assert_eq!(out, [0, 17, 34, 51, 68, 85, 102]);
    }

    #[test]
    fn type_mismatch_on_reload_is_downgraded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let overlay = PersistenceOverlay::new("demo", dir.path());
            overlay.record("x", &[1.5f32, 2.5]);
            overlay.save().unwrap();
        }
        let overlay = PersistenceOverlay::new("demo", dir.path());
        let mut out = [0i32; 2];
        assert!(!overlay.restore("x", &mut out));
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn unknown_name_on_reload_yields_no_restore() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = PersistenceOverlay::new("demo", dir.path());
        let mut out = [0i32; 1];
        assert!(!overlay.restore("never-written", &mut out));
    }

    #[test]
    fn unparsable_value_mid_array_leaves_out_untouched_rather_than_partially_restored() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = PersistenceOverlay::new("demo", dir.path());
        overlay.state.lock().unwrap().insert(
            "x".to_string(),
            StoredVariable {
                value_type: ValueType::Int32,
                values: vec!["1".to_string(), "not-a-number".to_string(), "3".to_string()],
            },
        );

        let mut out = [9i32; 3];
        assert!(!overlay.restore("x", &mut out));
        // the first element parsed fine, but the array as a whole must fall back to its
        // pre-existing contents rather than end up half-restored, half-stale.
        assert_eq!(out, [9, 9, 9]);
    }
}
