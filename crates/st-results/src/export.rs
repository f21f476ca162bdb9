//! Tabular export of aggregated results.
//!
//! Every table is written as one CSV file. Masses are reported in kilograms and
//! volumes in 10^6 liters; node labels have the separation suffix stripped.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use st_core::{in_megaliters, liters, mg_to_kg};

use crate::aggregate::{CumulativeStats, RankCriterion, rank};
use crate::maintenance::{MaintenanceOutcome, MaintenancePolicy, replay_all};
use crate::types::SimulationResult;
use crate::{ResultsError, ResultsResult};

const DATE_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn csv_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

impl Table {
    pub fn new(name: impl Into<String>, header: &[&str]) -> Self {
        Self {
            name: name.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn to_csv(&self) -> String {
        let mut csv = csv_line(&self.header);
        csv.push('\n');
        for row in &self.rows {
            csv.push_str(&csv_line(row));
            csv.push('\n');
        }
        csv
    }

    /// File name derived from the table name.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}.csv", stem.trim_matches('_'))
    }
}

fn kg(mass_mg: f64) -> String {
    mg_to_kg(mass_mg).to_string()
}

fn megaliters(volume_l: f64) -> String {
    in_megaliters(liters(volume_l)).to_string()
}

fn results_table(results: &[SimulationResult], criterion: RankCriterion, suffix: &str) -> Table {
    let ranked = rank(results, criterion);
    let stats = CumulativeStats::from_ranked(&ranked);
    let mut table = Table::new(
        format!("results {}", criterion),
        &[
            "rank",
            "scenario",
            "start",
            "end",
            "simulation time (s)",
            "nodes",
            "total volume (10^6 L)",
            "flow routing error (%)",
            "total pollutant (kg)",
            "quality routing error (%)",
            "removal (kg)",
            "removal (%)",
            "removal per area (mg/m2)",
            "cumulative removal (%)",
            "reversed cumulative removal (%)",
            "best - worst (%)",
            "mean cumulative removal (%)",
        ],
    );
    for (pos, r) in ranked.iter().enumerate() {
        table.push_row(vec![
            (pos + 1).to_string(),
            r.index.to_string(),
            r.start.format(DATE_FORMAT).to_string(),
            r.end.format(DATE_FORMAT).to_string(),
            r.simulation_time_s.to_string(),
            r.node_label(suffix),
            megaliters(r.total_volume),
            r.flow_error.to_string(),
            kg(r.total_pollutant),
            r.quality_error.to_string(),
            kg(r.removal_mass),
            r.removal_percent.to_string(),
            r.removal_per_area.to_string(),
            stats.best_to_worst[pos].to_string(),
            stats.worst_to_best[pos].to_string(),
            stats.difference[pos].to_string(),
            stats.mean[pos].to_string(),
        ]);
    }
    table
}

fn area_tables(results: &[SimulationResult], suffix: &str) -> (Table, Table) {
    let land_uses: BTreeSet<&str> = results
        .iter()
        .flat_map(|r| r.area_covered.by_land_use.keys().map(String::as_str))
        .collect();
    let mut header = vec!["nodes", "total"];
    header.extend(land_uses.iter().copied());

    let mut m2 = Table::new("area (m2)", &header);
    let mut percent = Table::new("area (%)", &header);
    for r in rank(results, RankCriterion::RemovalMass) {
        let area = &r.area_covered;
        let mut m2_row = vec![r.node_label(suffix), area.total.to_string()];
        let mut percent_row = vec![r.node_label(suffix), "100".to_string()];
        for lu in &land_uses {
            let value = area.by_land_use.get(*lu).copied().unwrap_or(0.0);
            m2_row.push(value.to_string());
            percent_row.push(area.share_percent(lu).to_string());
        }
        m2.push_row(m2_row);
        percent.push_row(percent_row);
    }
    (m2, percent)
}

/// Time in rows, one column per scenario.
fn series_table(
    name: &str,
    results: &[SimulationResult],
    series: impl Fn(&SimulationResult) -> &[f64],
    format: fn(f64) -> String,
) -> Table {
    let mut header = vec!["time".to_string()];
    header.extend(results.iter().map(|r| format!("scenario {}", r.index)));
    let mut table = Table {
        name: name.to_string(),
        header,
        rows: Vec::new(),
    };
    let Some(longest) = results.iter().max_by_key(|r| r.step_times.len()) else {
        return table;
    };
    for (i, t) in longest.step_times.iter().enumerate() {
        let mut row = vec![t.format(DATE_FORMAT).to_string()];
        row.extend(
            results
                .iter()
                .map(|r| series(r).get(i).map(|v| format(*v)).unwrap_or_default()),
        );
        table.push_row(row);
    }
    table
}

/// Per-criterion result tables, the area tables and, if `accumulative`, the
/// cumulative volume and pollutant time series.
pub fn results_tables(
    results: &[SimulationResult],
    criteria: &[RankCriterion],
    suffix: &str,
    accumulative: bool,
) -> ResultsResult<Vec<Table>> {
    if results.is_empty() {
        return Err(ResultsError::Empty);
    }
    let mut tables: Vec<Table> = criteria
        .iter()
        .map(|c| results_table(results, *c, suffix))
        .collect();
    let (m2, percent) = area_tables(results, suffix);
    tables.push(m2);
    tables.push(percent);
    if accumulative {
        tables.push(series_table(
            "cum Vol",
            results,
            |r| r.cumulative_volume.as_slice(),
            megaliters,
        ));
        tables.push(series_table(
            "cum TSS (kg)",
            results,
            |r| r.cumulative_pollutant.as_slice(),
            kg,
        ));
    }
    Ok(tables)
}

fn maintenance_table(
    results: &[SimulationResult],
    outcomes: &BTreeMap<usize, &MaintenanceOutcome>,
    criterion: RankCriterion,
    capacity_kg: f64,
    interval_days: f64,
    suffix: &str,
) -> Table {
    let ranked = rank(results, criterion);
    let potential = CumulativeStats::from_ranked(&ranked);
    let adjusted: Vec<f64> = ranked
        .iter()
        .map(|r| outcomes.get(&r.index).map_or(0.0, |o| o.removal_percent))
        .collect();
    let with_maintenance = CumulativeStats::from_percentages(&adjusted);

    let mut table = Table::new(
        format!("maintenance {}", criterion),
        &[
            "nodes",
            "capacity (kg)",
            "maintenance interval (days)",
            "total pollutant (kg)",
            "max potential (kg)",
            "max potential (%)",
            "with maintenance (kg)",
            "with maintenance (%)",
            "share of max potential (%)",
            "maintenance events",
            "cumulative max potential (%)",
            "cumulative mean (%)",
            "cumulative with maintenance (%)",
            "cumulative mean with maintenance (%)",
        ],
    );
    for (pos, r) in ranked.iter().enumerate() {
        let outcome = outcomes.get(&r.index);
        table.push_row(vec![
            r.node_label(suffix),
            capacity_kg.to_string(),
            interval_days.to_string(),
            kg(r.system_pollutant),
            kg(r.removal_mass),
            r.removal_percent.to_string(),
            kg(outcome.map_or(0.0, |o| o.removal_mass)),
            adjusted[pos].to_string(),
            outcome.map_or(0.0, |o| o.share_of_potential).to_string(),
            outcome.map_or(0, |o| o.maintenance_events).to_string(),
            potential.best_to_worst[pos].to_string(),
            potential.mean[pos].to_string(),
            with_maintenance.best_to_worst[pos].to_string(),
            with_maintenance.mean[pos].to_string(),
        ]);
    }
    table
}

/// Maintenance-adjusted removal tables, one per criterion. The baseline
/// (first result) is the reference for every replay.
pub fn maintenance_tables(
    results: &[SimulationResult],
    criteria: &[RankCriterion],
    capacity_kg: f64,
    interval_days: f64,
    suffix: &str,
) -> ResultsResult<Vec<Table>> {
    if results.is_empty() {
        return Err(ResultsError::Empty);
    }
    let policy = MaintenancePolicy::from_settings(capacity_kg, interval_days);
    let outcomes = replay_all(results, &policy);
    let by_index: BTreeMap<usize, &MaintenanceOutcome> =
        outcomes.iter().map(|o| (o.index, o)).collect();
    Ok(criteria
        .iter()
        .map(|c| maintenance_table(results, &by_index, *c, capacity_kg, interval_days, suffix))
        .collect())
}

/// Write each table to `<dir>/<table file name>`.
pub fn write_tables(dir: &Path, tables: &[Table]) -> ResultsResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(table.file_name());
        fs::write(&path, table.to_csv())?;
        tracing::debug!(path = %path.display(), rows = table.rows.len(), "table written");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AreaCovered;
    use chrono::{Duration, NaiveDate};

    fn result(index: usize, nodes: &[&str], removal_mass: f64) -> SimulationResult {
        let t0 = NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let per_step = (1000.0 - removal_mass) / 2.0;
        let mut by_land_use = BTreeMap::new();
        if !nodes.is_empty() {
            by_land_use.insert("roads".to_string(), 300.0);
            by_land_use.insert("roofs".to_string(), 100.0);
        }
        SimulationResult {
            index,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            start: t0,
            end: t0 + Duration::hours(1),
            simulation_time_s: 1.5,
            step_times: vec![t0, t0 + Duration::hours(1)],
            volume_per_step: vec![2.0e6, 2.0e6],
            pollutant_per_step: vec![per_step, per_step],
            node_volume_per_step: None,
            node_pollutant_per_step: None,
            cumulative_volume: vec![2.0e6, 4.0e6],
            cumulative_pollutant: vec![per_step, 2.0 * per_step],
            total_volume: 4.0e6,
            total_pollutant: 1000.0 - removal_mass,
            system_pollutant: 1000.0,
            removal_mass,
            removal_percent: removal_mass / 10.0,
            removal_per_area: 0.0,
            flow_error: 0.1,
            quality_error: 0.2,
            area_covered: AreaCovered {
                total: if nodes.is_empty() { 0.0 } else { 400.0 },
                by_land_use,
            },
        }
    }

    fn number(cell: &str) -> f64 {
        cell.parse().unwrap()
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let mut table = Table::new("results removal_mass", &["nodes", "value"]);
        table.push_row(vec!["J1, J2".to_string(), "say \"hi\"".to_string()]);
        assert_eq!(table.to_csv(), "nodes,value\n\"J1, J2\",\"say \"\"hi\"\"\"\n");
        assert_eq!(table.file_name(), "results_removal_mass.csv");
        assert_eq!(Table::new("area (m2)", &[]).file_name(), "area__m2.csv");
    }

    #[test]
    fn results_tables_ranked_with_units() {
        let results = vec![
            result(0, &[], 0.0),
            result(1, &["J1_m"], 100.0),
            result(2, &["J2_m", "J3_m"], 400.0),
        ];
        let tables = results_tables(&results, &[RankCriterion::RemovalMass], "_m", true).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["results removal_mass", "area (m2)", "area (%)", "cum Vol", "cum TSS (kg)"]
        );

        let main = &tables[0];
        assert_eq!(main.rows[0][1], "2");
        assert_eq!(main.rows[0][5], "J2, J3");
        assert!((number(&main.rows[0][6]) - 4.0).abs() < 1e-9);
        assert!((number(&main.rows[0][10]) - 4.0e-4).abs() < 1e-12);
        assert_eq!(main.rows[2][5], "");

        let percent = &tables[2];
        assert_eq!(percent.header, vec!["nodes", "total", "roads", "roofs"]);
        assert_eq!(percent.rows[0][2], "75");

        let cum_vol = &tables[3];
        assert_eq!(cum_vol.header.len(), 4);
        assert_eq!(cum_vol.rows.len(), 2);
        assert!((number(&cum_vol.rows[1][1]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn cumulative_tables_are_optional() {
        let results = vec![result(0, &[], 0.0)];
        let tables = results_tables(&results, &RankCriterion::ALL, "_m", false).unwrap();
        assert_eq!(tables.len(), RankCriterion::ALL.len() + 2);
        assert!(matches!(
            results_tables(&[], &RankCriterion::ALL, "_m", false),
            Err(ResultsError::Empty)
        ));
    }

    #[test]
    fn maintenance_table_columns() {
        let results = vec![result(0, &[], 0.0), result(1, &["J1_m"], 100.0)];
        let tables =
            maintenance_tables(&results, &[RankCriterion::RemovalMass], f64::INFINITY, 30.0, "_m")
                .unwrap();
        assert_eq!(tables.len(), 1);
        let row = &tables[0].rows[0];
        assert_eq!(row[0], "J1");
        // unbounded capacity leaves the removal untouched
        assert_eq!(row[4], row[6]);
        assert_eq!(row[8], "100");
    }

    #[test]
    fn tables_written_to_dir() {
        let dir = std::env::temp_dir().join("st_results_export_test");
        let _ = fs::remove_dir_all(&dir);
        let results = vec![result(0, &[], 0.0), result(1, &["J1_m"], 100.0)];
        let tables = results_tables(&results, &[RankCriterion::RemovalPercent], "_m", false).unwrap();
        let paths = write_tables(&dir, &tables).unwrap();
        assert_eq!(paths.len(), 3);
        let text = fs::read_to_string(&paths[0]).unwrap();
        assert!(text.starts_with("rank,scenario,start"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
