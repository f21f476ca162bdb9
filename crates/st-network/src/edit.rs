//! Targeted edits of simulation options, treatment and pollutant build-up.

use crate::document::{NetworkFile, Record};
use crate::error::{NetworkError, NetworkResult};
use crate::records::{SectionRecord, Treatment};

const TREATMENT_COMMENTS: [&str; 2] = [
    ";;Node           Pollutant        Function  ",
    ";;-------------- ---------------- ----------",
];

/// Write treatment expressions into `[TREATMENT]`.
///
/// The section is created after `[WASHOFF]` when missing. With `remove_old`,
/// existing treatment records are dropped first.
pub fn set_treatment(
    file: &mut NetworkFile,
    treatments: &[Treatment],
    remove_old: bool,
) -> NetworkResult<()> {
    if !file.has_section(Treatment::SECTION) {
        file.insert_section_after("WASHOFF", Treatment::SECTION, &TREATMENT_COMMENTS)?;
    }
    let section = file.section_mut(Treatment::SECTION)?;
    if remove_old {
        section.retain_records(|_| false);
    }
    for t in treatments {
        section.push(Record::from_fields(&[
            t.node.as_str(),
            t.pollutant.as_str(),
            t.function.as_str(),
        ]));
    }
    Ok(())
}

/// Simulation time steps as written in `[OPTIONS]` (`hh:mm:ss`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSteps {
    pub report_step: String,
    pub wet_step: String,
    pub dry_step: String,
    pub routing_step: String,
}

impl TimeSteps {
    fn value_for(&self, key: &str) -> Option<&str> {
        match key {
            "REPORT_STEP" => Some(&self.report_step),
            "WET_STEP" => Some(&self.wet_step),
            "DRY_STEP" => Some(&self.dry_step),
            "ROUTING_STEP" => Some(&self.routing_step),
            _ => None,
        }
    }
}

/// Rewrite the four time-step options. Options that are not present are left out.
pub fn change_time_steps(file: &mut NetworkFile, steps: &TimeSteps) -> NetworkResult<usize> {
    let mut changed = 0;
    for record in file.section_mut("OPTIONS")?.records_mut() {
        let value = record
            .id()
            .and_then(|key| steps.value_for(&key.to_ascii_uppercase()))
            .map(str::to_string);
        if let Some(value) = value {
            record.set_field(1, &value);
            changed += 1;
        }
    }
    Ok(changed)
}

/// Set `[OPTIONS]` values, appending options that are not present yet.
pub fn set_options(file: &mut NetworkFile, options: &[(&str, &str)]) -> NetworkResult<()> {
    let section = file.section_mut("OPTIONS")?;
    for (key, value) in options {
        let existing = section
            .records_mut()
            .find(|r| r.id().is_some_and(|id| id.eq_ignore_ascii_case(key)));
        match existing {
            Some(record) => {
                record.set_field(1, value);
            }
            None => section.push(Record::from_fields(&[*key, *value])),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollutantProcess {
    Buildup,
    Washoff,
}

impl PollutantProcess {
    fn section(self) -> &'static str {
        match self {
            PollutantProcess::Buildup => "BUILDUP",
            PollutantProcess::Washoff => "WASHOFF",
        }
    }
}

/// Replace the two function coefficients (fields 4 and 5) of a land use's
/// build-up or wash-off record.
pub fn change_buildup_washoff(
    file: &mut NetworkFile,
    process: PollutantProcess,
    land_use: &str,
    coeff1: &str,
    coeff2: &str,
) -> NetworkResult<usize> {
    let section = process.section();
    let mut changed = 0;
    for record in file.section_mut(section)?.records_mut() {
        if record.id() != Some(land_use) {
            continue;
        }
        if record.field(4).is_none() {
            return Err(NetworkError::MalformedRecord {
                section,
                line: record.text().trim().to_string(),
                reason: "missing coefficients".to_string(),
            });
        }
        record.set_field(3, coeff1);
        record.set_field(4, coeff2);
        changed += 1;
    }
    Ok(changed)
}
