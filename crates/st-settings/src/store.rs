//! Reading and rewriting the settings file.

use std::collections::BTreeMap;
use std::path::Path;

use crate::schema::{Formula, SettingValue, field_kind};
use crate::{SettingsError, SettingsResult};

/// Parsed settings. Keys absent from the file are absent from the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, key: &str) -> SettingsResult<&SettingValue> {
        self.values.get(key).ok_or_else(|| SettingsError::Missing {
            key: key.to_string(),
        })
    }

    fn wrong_type(key: &str, expected: &'static str) -> SettingsError {
        SettingsError::WrongType {
            key: key.to_string(),
            expected,
        }
    }

    pub fn get_str(&self, key: &str) -> SettingsResult<&str> {
        match self.require(key)? {
            SettingValue::Str(v) => Ok(v.as_str()),
            _ => Err(Self::wrong_type(key, "a string")),
        }
    }

    pub fn get_list(&self, key: &str) -> SettingsResult<&[String]> {
        match self.require(key)? {
            SettingValue::List(v) => Ok(v.as_slice()),
            _ => Err(Self::wrong_type(key, "a list")),
        }
    }

    pub fn get_formula(&self, key: &str) -> SettingsResult<&Formula> {
        match self.require(key)? {
            SettingValue::Formula(v) => Ok(v),
            _ => Err(Self::wrong_type(key, "a formula")),
        }
    }

    pub fn get_scenarios(&self, key: &str) -> SettingsResult<&[Vec<String>]> {
        match self.require(key)? {
            SettingValue::Scenarios(v) => Ok(v.as_slice()),
            _ => Err(Self::wrong_type(key, "a scenario list")),
        }
    }

    pub fn get_f64(&self, key: &str) -> SettingsResult<f64> {
        match self.require(key)? {
            SettingValue::Float(v) => Ok(*v),
            _ => Err(Self::wrong_type(key, "a number")),
        }
    }

    pub fn get_i64(&self, key: &str) -> SettingsResult<i64> {
        match self.require(key)? {
            SettingValue::Int(v) => Ok(*v),
            _ => Err(Self::wrong_type(key, "an integer")),
        }
    }

    pub fn get_bool(&self, key: &str) -> SettingsResult<bool> {
        match self.require(key)? {
            SettingValue::Bool(v) => Ok(*v),
            _ => Err(Self::wrong_type(key, "0 or 1")),
        }
    }

    /// Integer that may be left out of the file.
    pub fn get_i64_opt(&self, key: &str) -> SettingsResult<Option<i64>> {
        if self.contains(key) {
            self.get_i64(key).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn compact(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse settings text. Whitespace anywhere in a line is ignored, `#` starts a
/// comment line and keys outside the schema are skipped.
pub fn parse_settings(text: &str) -> SettingsResult<Settings> {
    let mut settings = Settings::default();
    for (n, raw) in text.lines().enumerate() {
        let line = compact(raw);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| SettingsError::MalformedLine {
                line: n + 1,
                text: raw.to_string(),
            })?;
        let Some(kind) = field_kind(key) else {
            tracing::trace!(key, "ignoring unknown setting");
            continue;
        };
        let parsed = SettingValue::parse(key, kind, value)?;
        settings.set(key, parsed);
    }
    Ok(settings)
}

pub fn read_settings(path: &Path) -> SettingsResult<Settings> {
    let text = std::fs::read_to_string(path)?;
    let settings = parse_settings(&text)?;
    tracing::debug!(path = %path.display(), keys = settings.len(), "read settings");
    Ok(settings)
}

/// Replace the value of every line whose key is in `overrides`.
///
/// Comment lines, unknown lines and the layout around `=` are left as they are.
pub fn rewrite_settings(text: &str, overrides: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    for raw in text.split_inclusive('\n') {
        let (body, ending) = match raw.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match raw.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (raw, ""),
            },
        };
        let replacement = body.split_once('=').and_then(|(key_part, value_part)| {
            let key = compact(key_part);
            if key.starts_with('#') {
                return None;
            }
            let new_value = overrides.get(&key)?;
            let gap = &value_part[..value_part.len() - value_part.trim_start().len()];
            Some(format!("{}={}{}", key_part, gap, new_value))
        });
        match replacement {
            Some(line) => out.push_str(&line),
            None => out.push_str(body),
        }
        out.push_str(ending);
    }
    out
}

pub fn write_settings(path: &Path, overrides: &BTreeMap<String, String>) -> SettingsResult<()> {
    let text = std::fs::read_to_string(path)?;
    std::fs::write(path, rewrite_settings(&text, overrides))?;
    tracing::debug!(path = %path.display(), changed = overrides.len(), "wrote settings");
    Ok(())
}
