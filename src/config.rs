use crate::calc::{StudentAcademicRecord, Thresholds};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const CONFIG_KEY: &str = "config.engine";

pub const DEFAULT_SUBJECT_REGISTRY: &[&str] = &[
    "English",
    "Mathematics",
    "Science",
    "Social Studies",
    "Computer",
    "Nepali",
    "Health",
    "Art",
];

const ALLOWED_TOTAL_MARKS: [f64; 2] = [50.0, 100.0];
const MAX_SUBJECT_NAME_LEN: usize = 64;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfig {
    pub total_marks: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_core: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub subject_registry: Vec<String>,
    #[serde(default)]
    pub subjects: BTreeMap<String, SubjectConfig>,
    pub passing_threshold: f64,
    pub distinction_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            subject_registry: DEFAULT_SUBJECT_REGISTRY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            subjects: BTreeMap::new(),
            passing_threshold: thresholds.passing,
            distinction_threshold: thresholds.distinction,
        }
    }
}

fn parse_threshold(v: &Value, key: &str) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number", key))?;
    if !n.is_finite() || !(0.0..=100.0).contains(&n) {
        return Err(format!("{} must be in 0..=100", key));
    }
    Ok(n)
}

impl EngineConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            passing: self.passing_threshold,
            distinction: self.distinction_threshold,
        }
    }

    fn registry_name(&self, name: &str) -> Option<&str> {
        let t = name.trim();
        self.subject_registry
            .iter()
            .find(|r| r.eq_ignore_ascii_case(t))
            .map(|r| r.as_str())
    }

    pub fn subject(&self, name: &str) -> Option<&SubjectConfig> {
        let canonical = self.registry_name(name)?;
        self.subjects.get(canonical)
    }

    /// Check every invariant and canonicalize subject keys to the registry spelling.
    pub fn validate(self) -> Result<Self, String> {
        let mut registry: Vec<String> = Vec::with_capacity(self.subject_registry.len());
        for raw in &self.subject_registry {
            let name = raw.trim();
            if name.is_empty() {
                return Err("subjectRegistry entries must not be empty".into());
            }
            if name.len() > MAX_SUBJECT_NAME_LEN {
                return Err(format!(
                    "subject name length must be <= {}",
                    MAX_SUBJECT_NAME_LEN
                ));
            }
            if registry.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                return Err(format!("duplicate subject in registry: {}", name));
            }
            registry.push(name.to_string());
        }

        let mut out = EngineConfig {
            subject_registry: registry,
            subjects: BTreeMap::new(),
            passing_threshold: self.passing_threshold,
            distinction_threshold: self.distinction_threshold,
        };

        for (name, cfg) in self.subjects {
            let Some(canonical) = out.registry_name(&name).map(|s| s.to_string()) else {
                return Err(format!("unknown subject: {}", name));
            };
            if !ALLOWED_TOTAL_MARKS.contains(&cfg.total_marks) {
                return Err(format!(
                    "subjects.{}.totalMarks must be 50 or 100",
                    canonical
                ));
            }
            out.subjects.insert(canonical, cfg);
        }

        for (key, v) in [
            ("passingThreshold", out.passing_threshold),
            ("distinctionThreshold", out.distinction_threshold),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(format!("{} must be in 0..=100", key));
            }
        }
        if out.passing_threshold > out.distinction_threshold {
            return Err("passingThreshold must be <= distinctionThreshold".into());
        }
        Ok(out)
    }

    /// Merge a partial update. `subjects.<name>: null` removes a subject override.
    pub fn apply_patch(self, patch: &Map<String, Value>) -> Result<Self, String> {
        let mut next = self;
        for (k, v) in patch {
            match k.as_str() {
                "subjectRegistry" => {
                    next.subject_registry = serde_json::from_value(v.clone())
                        .map_err(|_| "subjectRegistry must be an array of strings".to_string())?;
                }
                "subjects" => {
                    let obj = v
                        .as_object()
                        .ok_or_else(|| "subjects must be an object".to_string())?;
                    for (name, entry) in obj {
                        let existing = next
                            .subjects
                            .keys()
                            .find(|s| s.eq_ignore_ascii_case(name.trim()))
                            .cloned();
                        if let Some(existing) = existing {
                            next.subjects.remove(&existing);
                        }
                        if entry.is_null() {
                            continue;
                        }
                        let cfg: SubjectConfig = serde_json::from_value(entry.clone())
                            .map_err(|e| format!("subjects.{}: {}", name, e))?;
                        next.subjects.insert(name.trim().to_string(), cfg);
                    }
                }
                "passingThreshold" => {
                    next.passing_threshold = parse_threshold(v, k)?;
                }
                "distinctionThreshold" => {
                    next.distinction_threshold = parse_threshold(v, k)?;
                }
                _ => return Err(format!("unknown config field: {}", k)),
            }
        }
        next.validate()
    }

    /// Apply per-subject denominators and core flags, dropping inactive subjects.
    /// Subjects the config does not mention pass through unchanged.
    pub fn apply_to_record(&self, record: &mut StudentAcademicRecord) {
        record.subjects.retain(|s| {
            self.subject(&s.subject_name)
                .map(|c| c.is_active)
                .unwrap_or(true)
        });
        for s in record.subjects.iter_mut() {
            if let Some(c) = self.subject(&s.subject_name) {
                s.total_marks = c.total_marks;
                s.is_core_subject = c.is_core;
            }
        }
    }
}

/// Defaults overlaid with the saved config. A malformed saved value is ignored.
pub fn load_config(store: &dyn Store) -> anyhow::Result<EngineConfig> {
    let Some(saved) = store.load(CONFIG_KEY)? else {
        return Ok(EngineConfig::default());
    };
    let parsed = serde_json::from_value::<EngineConfig>(saved)
        .map_err(|e| e.to_string())
        .and_then(EngineConfig::validate);
    match parsed {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            log::warn!("ignoring saved engine config: {}", e);
            Ok(EngineConfig::default())
        }
    }
}

pub fn save_config(store: &mut dyn Store, cfg: &EngineConfig) -> anyhow::Result<()> {
    store.save(CONFIG_KEY, &serde_json::to_value(cfg)?)
}
