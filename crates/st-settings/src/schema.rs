//! Fixed settings schema: every recognised key and how its value is read.

use std::fmt;

use crate::{SettingsError, SettingsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Float,
    Int,
    /// Written as 0 or 1.
    Bool,
    /// Comma separated.
    List,
    /// `lhs;rhs`, read as `lhs = rhs`.
    Formula,
    /// Semicolon separated sets of comma separated ids.
    Scenarios,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            FieldKind::Str => "a string",
            FieldKind::Float => "a number",
            FieldKind::Int => "an integer",
            FieldKind::Bool => "0 or 1",
            FieldKind::List => "a list",
            FieldKind::Formula => "lhs;rhs",
            FieldKind::Scenarios => "a;b,c scenario list",
        }
    }
}

const STRINGS: &[&str] = &[
    "input_file",
    "pollutant",
    "start_date",
    "end_date",
    "results_file",
    "outfall_node",
    "junction_suffix",
    "res_id",
    "REPORT_STEP",
    "WET_STEP",
    "DRY_STEP",
    "ROUTING_STEP",
];

const FLOATS: &[&str] = &[
    "height_offset",
    "conduit_length",
    "max_capacity",
    "coord_offset",
    "maintenance_interval",
];

const INTEGERS: &[&str] = &["number_of_scenarios", "number_of_samples", "random_seed"];

const BOOLEANS: &[&str] = &[
    "create_report",
    "restore_backup",
    "create_backup",
    "accumulative_statistics",
    "use_specific_scenarios",
    "separate_junctions",
    "create_treatment_scenarios",
    "run_simulations",
    "rank_junctions",
    "land_use_prioritization",
    "suppress_output",
];

const LISTS: &[&str] = &["preferred_land_uses", "order_criteria"];

/// Kind of a recognised key, `None` for keys outside the schema.
pub fn field_kind(key: &str) -> Option<FieldKind> {
    let kind = if STRINGS.contains(&key) {
        FieldKind::Str
    } else if FLOATS.contains(&key) {
        FieldKind::Float
    } else if INTEGERS.contains(&key) {
        FieldKind::Int
    } else if BOOLEANS.contains(&key) {
        FieldKind::Bool
    } else if LISTS.contains(&key) {
        FieldKind::List
    } else if key == "formula" {
        FieldKind::Formula
    } else if key == "user_scenarios" {
        FieldKind::Scenarios
    } else {
        return None;
    };
    Some(kind)
}

/// A treatment expression split at its equals sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub lhs: String,
    pub rhs: String,
}

impl Formula {
    /// Constant removal fraction when the right-hand side is a plain number.
    pub fn efficiency(&self) -> Option<f64> {
        self.rhs.parse::<f64>().ok()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
    Formula(Formula),
    Scenarios(Vec<Vec<String>>),
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl SettingValue {
    /// Read a raw (whitespace-free) value as `kind`.
    pub fn parse(key: &str, kind: FieldKind, raw: &str) -> SettingsResult<Self> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: kind.describe(),
        };
        let value = match kind {
            FieldKind::Str => SettingValue::Str(raw.to_string()),
            FieldKind::Float => SettingValue::Float(raw.parse().map_err(|_| invalid())?),
            FieldKind::Int => SettingValue::Int(raw.parse().map_err(|_| invalid())?),
            FieldKind::Bool => match raw {
                "0" => SettingValue::Bool(false),
                "1" => SettingValue::Bool(true),
                _ => return Err(invalid()),
            },
            FieldKind::List => SettingValue::List(split_list(raw, ',')),
            FieldKind::Formula => {
                let (lhs, rhs) = raw.split_once(';').ok_or_else(invalid)?;
                SettingValue::Formula(Formula {
                    lhs: lhs.to_string(),
                    rhs: rhs.to_string(),
                })
            }
            FieldKind::Scenarios => SettingValue::Scenarios(
                raw.split(';')
                    .map(|set| split_list(set, ','))
                    .filter(|set| !set.is_empty())
                    .collect(),
            ),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lookup() {
        assert_eq!(field_kind("max_capacity"), Some(FieldKind::Float));
        assert_eq!(field_kind("random_seed"), Some(FieldKind::Int));
        assert_eq!(field_kind("REPORT_STEP"), Some(FieldKind::Str));
        assert_eq!(field_kind("report_step"), None);
    }

    #[test]
    fn formula_and_scenarios() {
        let f = SettingValue::parse("formula", FieldKind::Formula, "R;0.8").unwrap();
        let SettingValue::Formula(formula) = f else {
            panic!("not a formula");
        };
        assert_eq!(formula.to_string(), "R = 0.8");
        assert_eq!(formula.efficiency(), Some(0.8));

        let s = SettingValue::parse("user_scenarios", FieldKind::Scenarios, "J1,J2;J3;").unwrap();
        assert_eq!(
            s,
            SettingValue::Scenarios(vec![vec!["J1".into(), "J2".into()], vec!["J3".into()]])
        );
    }

    #[test]
    fn bad_values_rejected() {
        assert!(SettingValue::parse("create_backup", FieldKind::Bool, "yes").is_err());
        assert!(SettingValue::parse("height_offset", FieldKind::Float, "x").is_err());
        assert!(SettingValue::parse("formula", FieldKind::Formula, "R=0.8").is_err());
    }
}
