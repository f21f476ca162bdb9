//! Reader for the engine's binary results file.
//!
//! Layout (little-endian, 4-byte records):
//!   opening   magic, version, flow units, #subcatchments, #nodes, #links, #pollutants
//!   ids       length-prefixed names of every object, then pollutant unit codes
//!   props     per object kind: count, codes, values
//!   variables per object kind and the system: count, codes
//!   interval  start date (f64 days since 1899-12-30), report step (s)
//!   results   per period: date (f64), then f32 values
//!   closing   ids offset, props offset, results offset, #periods, error code, magic

use chrono::{Duration, NaiveDate, NaiveDateTime};

pub const MAGIC: i32 = 516_114_522;
const OPENING_SIZE: usize = 7 * 4;
const CLOSING_SIZE: usize = 6 * 4;

pub const NODE_LATERAL_INFLOW: i32 = 3;
pub const NODE_TOTAL_INFLOW: i32 = 4;
const NODE_QUALITY: i32 = 6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutputError {
    #[error("results file truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("results file has a bad magic number")]
    BadMagic,

    #[error("engine finished with error code {code}")]
    EngineFailed { code: i32 },

    #[error("unknown {kind} code {code}")]
    UnknownCode { kind: &'static str, code: i32 },

    #[error("{kind} {id} not in results file")]
    UnknownObject { kind: &'static str, id: String },
}

pub type OutputResult<T> = Result<T, OutputError>;

/// Flow units of the network; every flow is converted to liters per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowUnits {
    Cfs,
    Gpm,
    Mgd,
    Cms,
    Lps,
    Mld,
}

impl FlowUnits {
    fn from_code(code: i32) -> OutputResult<Self> {
        Ok(match code {
            0 => FlowUnits::Cfs,
            1 => FlowUnits::Gpm,
            2 => FlowUnits::Mgd,
            3 => FlowUnits::Cms,
            4 => FlowUnits::Lps,
            5 => FlowUnits::Mld,
            _ => {
                return Err(OutputError::UnknownCode {
                    kind: "flow unit",
                    code,
                });
            }
        })
    }

    pub fn liters_per_second(self) -> f64 {
        match self {
            FlowUnits::Cfs => 28.316_846_592,
            FlowUnits::Gpm => 0.063_090_196_4,
            FlowUnits::Mgd => 43.812_636_4,
            FlowUnits::Cms => 1000.0,
            FlowUnits::Lps => 1.0,
            FlowUnits::Mld => 11.574_074_074,
        }
    }
}

/// Factor to milligrams per liter for a pollutant unit code.
fn concentration_factor(code: i32) -> OutputResult<f64> {
    match code {
        0 => Ok(1.0),
        1 => Ok(1.0e-3),
        2 => Ok(1.0),
        _ => Err(OutputError::UnknownCode {
            kind: "concentration unit",
            code,
        }),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn take(&mut self, n: usize) -> OutputResult<&'a [u8]> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(OutputError::Truncated { offset: self.pos })?;
        self.pos = end;
        Ok(slice)
    }

    fn i32(&mut self) -> OutputResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn count(&mut self) -> OutputResult<usize> {
        let offset = self.pos;
        usize::try_from(self.i32()?).map_err(|_| OutputError::Truncated { offset })
    }

    fn f64(&mut self) -> OutputResult<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn name(&mut self) -> OutputResult<String> {
        let len = self.count()?;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn names(&mut self, n: usize) -> OutputResult<Vec<String>> {
        (0..n).map(|_| self.name()).collect()
    }

    fn codes(&mut self) -> OutputResult<Vec<i32>> {
        let n = self.count()?;
        (0..n).map(|_| self.i32()).collect()
    }

    fn skip(&mut self, n: usize) -> OutputResult<()> {
        self.take(n).map(|_| ())
    }
}

/// Days since 1899-12-30, the engine's date origin.
pub fn decode_date(days: f64) -> NaiveDateTime {
    let origin = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    origin + Duration::milliseconds((days * 86_400_000.0).round() as i64)
}

#[derive(Debug, Clone)]
pub struct OutputFile<'a> {
    bytes: &'a [u8],
    pub flow_units: FlowUnits,
    pub node_ids: Vec<String>,
    pub pollutant_ids: Vec<String>,
    concentration_factors: Vec<f64>,
    node_vars: Vec<i32>,
    pub start: NaiveDateTime,
    pub report_step_s: i32,
    results_offset: usize,
    period_size: usize,
    node_block_offset: usize,
    pub periods: usize,
}

impl<'a> OutputFile<'a> {
    pub fn parse(bytes: &'a [u8]) -> OutputResult<Self> {
        if bytes.len() < OPENING_SIZE + CLOSING_SIZE {
            return Err(OutputError::Truncated {
                offset: bytes.len(),
            });
        }
        let mut closing = Reader::at(bytes, bytes.len() - CLOSING_SIZE);
        let ids_offset = closing.count()?;
        let _props_offset = closing.count()?;
        let results_offset = closing.count()?;
        let periods = closing.count()?;
        let error_code = closing.i32()?;
        if closing.i32()? != MAGIC {
            return Err(OutputError::BadMagic);
        }
        if error_code != 0 {
            return Err(OutputError::EngineFailed { code: error_code });
        }

        let mut opening = Reader::at(bytes, 0);
        if opening.i32()? != MAGIC {
            return Err(OutputError::BadMagic);
        }
        let _version = opening.i32()?;
        let flow_units = FlowUnits::from_code(opening.i32()?)?;
        let n_subcatchments = opening.count()?;
        let n_nodes = opening.count()?;
        let n_links = opening.count()?;
        let n_pollutants = opening.count()?;

        let mut r = Reader::at(bytes, ids_offset);
        let _subcatchments = r.names(n_subcatchments)?;
        let node_ids = r.names(n_nodes)?;
        let _links = r.names(n_links)?;
        let pollutant_ids = r.names(n_pollutants)?;
        let concentration_factors = (0..n_pollutants)
            .map(|_| r.i32().and_then(concentration_factor))
            .collect::<OutputResult<Vec<_>>>()?;

        // object properties
        for count in [n_subcatchments, n_nodes, n_links] {
            let n = r.codes()?.len();
            r.skip(4 * n * count)?;
        }

        let subcatchment_vars = r.codes()?.len();
        let node_vars = r.codes()?;
        let link_vars = r.codes()?.len();
        let system_vars = r.codes()?.len();
        let start = decode_date(r.f64()?);
        let report_step_s = r.i32()?;

        let node_block_offset = 8 + 4 * n_subcatchments * subcatchment_vars;
        let period_size = node_block_offset
            + 4 * (n_nodes * node_vars.len() + n_links * link_vars + system_vars);

        Ok(Self {
            bytes,
            flow_units,
            node_ids,
            pollutant_ids,
            concentration_factors,
            node_vars,
            start,
            report_step_s,
            results_offset,
            period_size,
            node_block_offset,
            periods,
        })
    }

    pub fn node_index(&self, id: &str) -> OutputResult<usize> {
        self.node_ids
            .iter()
            .position(|n| n == id)
            .ok_or_else(|| OutputError::UnknownObject {
                kind: "node",
                id: id.to_string(),
            })
    }

    pub fn pollutant_index(&self, id: &str) -> OutputResult<usize> {
        self.pollutant_ids
            .iter()
            .position(|p| p == id)
            .ok_or_else(|| OutputError::UnknownObject {
                kind: "pollutant",
                id: id.to_string(),
            })
    }

    fn var_position(&self, code: i32) -> OutputResult<usize> {
        self.node_vars
            .iter()
            .position(|c| *c == code)
            .ok_or(OutputError::UnknownCode {
                kind: "node variable",
                code,
            })
    }

    pub fn period_time(&self, period: usize) -> OutputResult<NaiveDateTime> {
        let mut r = Reader::at(self.bytes, self.results_offset + period * self.period_size);
        Ok(decode_date(r.f64()?))
    }

    fn node_value(&self, period: usize, node: usize, code: i32) -> OutputResult<f64> {
        let var = self.var_position(code)?;
        let offset = self.results_offset
            + period * self.period_size
            + self.node_block_offset
            + 4 * (node * self.node_vars.len() + var);
        let b = Reader::at(self.bytes, offset).take(4)?;
        Ok(f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
    }

    /// Flow in liters per second; `code` selects lateral or total inflow.
    pub fn node_flow(&self, period: usize, node: usize, code: i32) -> OutputResult<f64> {
        Ok(self.node_value(period, node, code)? * self.flow_units.liters_per_second())
    }

    /// Concentration in milligrams per liter.
    pub fn node_concentration(
        &self,
        period: usize,
        node: usize,
        pollutant: usize,
    ) -> OutputResult<f64> {
        let code = NODE_QUALITY + pollutant as i32;
        let factor = self.concentration_factors.get(pollutant).copied().unwrap_or(1.0);
        Ok(self.node_value(period, node, code)? * factor)
    }
}
