//! Persistence: the intermediate hydraulics cache and the binary output
//! file.
//!
//! The cache holds one snapshot of the hydraulic state per time step so a
//! water quality run can replay a finished hydraulic solution. It lives in
//! memory and round-trips to a binary file whose records are
//! `(time i32, demand f32[N], head f32[N], flow f32[L], status f32[L],
//! setting f32[L], step i32)`, terminated by a zero-step record and an
//! end-of-file marker byte. Compatibility on reuse is checked with a magic
//! number and the object counts only.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::*;

/// Magic number identifying a hydraulics file.
const HYD_MAGIC: u32 = 0x4859_4452;
/// Magic number framing the binary output file.
const OUT_MAGIC: u32 = 0x4F55_5446;
/// Engine version stamp written to binary files.
const CODE_VERSION: u32 = 10_000;
/// End-of-file marker byte.
const EOF_MARK: u8 = 0x1A;
/// Sentinel for a missing (fixed-status) valve setting.
const MISSING: f32 = -1.0e10;

/// One hydraulic time step's worth of state.
#[derive(Debug, Clone)]
pub(crate) struct HydSnapshot {
    pub time: i64,
    pub demand: Vec<f32>,
    pub head: Vec<f32>,
    pub flow: Vec<f32>,
    pub status: Vec<f32>,
    pub setting: Vec<f32>,
    pub hydstep: i64,
}

/// In-memory intermediate hydraulics cache with a replay cursor.
#[derive(Debug, Default)]
pub(crate) struct HydCache {
    pub nnodes: usize,
    pub nlinks: usize,
    pub records: Vec<HydSnapshot>,
    cursor: usize,
}

impl HydCache {
    pub fn reset(&mut self, nnodes: usize, nlinks: usize) {
        self.nnodes = nnodes;
        self.nlinks = nlinks;
        self.records.clear();
        self.cursor = 0;
    }

    pub fn push(&mut self, snap: HydSnapshot) {
        self.records.push(snap);
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Next snapshot in replay order.
    pub fn next(&mut self) -> Option<&HydSnapshot> {
        let rec = self.records.get(self.cursor)?;
        self.cursor += 1;
        Some(rec)
    }

    /// Saves the cache to a binary hydraulics file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        put_u32(&mut buf, HYD_MAGIC);
        put_u32(&mut buf, CODE_VERSION);
        put_i32(&mut buf, self.nnodes as i32);
        put_i32(&mut buf, self.nlinks as i32);
        for rec in &self.records {
            put_i32(&mut buf, rec.time as i32);
            put_f32s(&mut buf, &rec.demand);
            put_f32s(&mut buf, &rec.head);
            put_f32s(&mut buf, &rec.flow);
            put_f32s(&mut buf, &rec.status);
            put_f32s(&mut buf, &rec.setting);
            put_i32(&mut buf, rec.hydstep as i32);
        }
        buf.push(EOF_MARK);
        std::fs::write(path, &buf).map_err(|_| EngineError::new(ERR_FILE_SAVE))
    }

    /// Loads a binary hydraulics file saved by [`HydCache::save`]. The
    /// node and link counts must match the current network.
    pub fn load(&mut self, path: &Path, nnodes: usize, nlinks: usize) -> Result<()> {
        let mut data = Vec::new();
        std::fs::File::open(path)
            .and_then(|mut f| f.read_to_end(&mut data))
            .map_err(|_| EngineError::new(ERR_HYD_FILE_OPEN))?;
        let mut pos = 0usize;
        let magic = get_u32(&data, &mut pos)?;
        let _version = get_u32(&data, &mut pos)?;
        let fnodes = get_i32(&data, &mut pos)? as usize;
        let flinks = get_i32(&data, &mut pos)? as usize;
        if magic != HYD_MAGIC || fnodes != nnodes || flinks != nlinks {
            return Err(EngineError::new(ERR_HYD_FILE_FORMAT));
        }
        self.reset(nnodes, nlinks);
        loop {
            if pos >= data.len() || data[pos] == EOF_MARK && data.len() - pos == 1 {
                break;
            }
            let time = get_i32(&data, &mut pos)? as i64;
            let demand = get_f32s(&data, &mut pos, nnodes)?;
            let head = get_f32s(&data, &mut pos, nnodes)?;
            let flow = get_f32s(&data, &mut pos, nlinks)?;
            let status = get_f32s(&data, &mut pos, nlinks)?;
            let setting = get_f32s(&data, &mut pos, nlinks)?;
            let hydstep = get_i32(&data, &mut pos)? as i64;
            self.records.push(HydSnapshot {
                time,
                demand,
                head,
                flow,
                status,
                setting,
                hydstep,
            });
            if hydstep == 0 {
                break;
            }
        }
        Ok(())
    }
}

/// Encodes an optional valve setting for a snapshot.
pub(crate) fn encode_setting(setting: Option<f64>) -> f32 {
    match setting {
        Some(v) => v as f32,
        None => MISSING,
    }
}

/// Decodes an optional valve setting from a snapshot.
pub(crate) fn decode_setting(raw: f32) -> Option<f64> {
    if raw <= MISSING / 2.0 {
        None
    } else {
        Some(raw as f64)
    }
}

/// Binary results file: header, one block of node and link variables per
/// reporting period, and a footer with reaction rates and the warning
/// flag.
#[derive(Debug, Default)]
pub(crate) struct OutputFile {
    header: Vec<u8>,
    body: Vec<u8>,
    pub periods: u32,
}

impl OutputFile {
    /// Number of f32 variables stored per node each period:
    /// demand, head, pressure, quality.
    pub const NODE_VARS: usize = 4;
    /// Number of f32 variables stored per link each period: flow,
    /// velocity, head loss, quality, status, setting, reaction rate,
    /// friction factor.
    pub const LINK_VARS: usize = 8;

    /// Starts a new output: writes the prolog with object counts, option
    /// codes, the report window and the network ID tables.
    #[allow(clippy::too_many_arguments)]
    pub fn begin(
        &mut self,
        node_ids: &[String],
        link_ids: &[String],
        counts: [i32; 5],
        option_codes: [i32; 4],
        rstart: i64,
        rstep: i64,
        duration: i64,
    ) {
        self.header.clear();
        self.body.clear();
        self.periods = 0;
        let buf = &mut self.header;
        put_u32(buf, OUT_MAGIC);
        put_u32(buf, CODE_VERSION);
        for c in counts {
            put_i32(buf, c);
        }
        for c in option_codes {
            put_i32(buf, c);
        }
        put_i32(buf, rstart as i32);
        put_i32(buf, rstep as i32);
        put_i32(buf, duration as i32);
        for id in node_ids.iter().chain(link_ids.iter()) {
            let mut field = [0u8; 32];
            let bytes = id.as_bytes();
            let n = bytes.len().min(31);
            field[..n].copy_from_slice(&bytes[..n]);
            buf.extend_from_slice(&field);
        }
    }

    /// Appends one reporting period of node and link variables.
    pub fn write_period(&mut self, node_vars: &[f32], link_vars: &[f32]) {
        put_f32s(&mut self.body, node_vars);
        put_f32s(&mut self.body, link_vars);
        self.periods += 1;
    }

    /// Writes the assembled file with its footer.
    pub fn finalize_to(&self, path: &Path, reaction_rates: [f32; 4], warnflag: i32) -> Result<()> {
        let mut file = std::fs::File::create(path).map_err(|_| EngineError::new(ERR_FILE_SAVE))?;
        let mut footer: Vec<u8> = Vec::new();
        put_f32s(&mut footer, &reaction_rates);
        put_i32(&mut footer, self.periods as i32);
        put_i32(&mut footer, warnflag);
        put_u32(&mut footer, OUT_MAGIC);
        file.write_all(&self.header)
            .and_then(|_| file.write_all(&self.body))
            .and_then(|_| file.write_all(&footer))
            .map_err(|_| EngineError::new(ERR_FILE_SAVE))
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f32s(buf: &mut Vec<u8>, vals: &[f32]) {
    for v in vals {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn get_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(*pos..*pos + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(EngineError::new(ERR_HYD_FILE_READ))?;
    *pos += 4;
    Ok(u32::from_le_bytes(bytes))
}

fn get_i32(data: &[u8], pos: &mut usize) -> Result<i32> {
    get_u32(data, pos).map(|v| v as i32)
}

fn get_f32s(data: &[u8], pos: &mut usize, n: usize) -> Result<Vec<f32>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(f32::from_le_bytes(
            data.get(*pos..*pos + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or(EngineError::new(ERR_HYD_FILE_READ))?,
        ));
        *pos += 4;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(time: i64, step: i64) -> HydSnapshot {
        HydSnapshot {
            time,
            demand: vec![1.0, 2.0],
            head: vec![10.0, 20.0],
            flow: vec![0.5],
            status: vec![3.0],
            setting: vec![MISSING],
            hydstep: step,
        }
    }

    #[test]
    fn cache_round_trips_through_a_file() {
        let dir = std::env::temp_dir().join("hydronet_cache_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("net.hyd");

        let mut cache = HydCache::default();
        cache.reset(2, 1);
        cache.push(snapshot(0, 3600));
        cache.push(snapshot(3600, 0));
        cache.save(&path).unwrap();

        let mut other = HydCache::default();
        other.load(&path, 2, 1).unwrap();
        assert_eq!(other.records.len(), 2);
        assert_eq!(other.records[0].hydstep, 3600);
        assert_eq!(other.records[1].time, 3600);
        assert_eq!(decode_setting(other.records[0].setting[0]), None);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let dir = std::env::temp_dir().join("hydronet_cache_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.hyd");

        let mut cache = HydCache::default();
        cache.reset(2, 1);
        cache.push(snapshot(0, 0));
        cache.save(&path).unwrap();

        let mut other = HydCache::default();
        let err = other.load(&path, 3, 1).unwrap_err();
        assert_eq!(err.code(), ERR_HYD_FILE_FORMAT);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn settings_encode_missing_values() {
        assert_eq!(encode_setting(None), MISSING);
        assert_eq!(decode_setting(encode_setting(Some(1.5))), Some(1.5));
    }

    #[test]
    fn output_file_counts_periods() {
        let mut out = OutputFile::default();
        out.begin(
            &["J1".to_string()],
            &["P1".to_string()],
            [1, 0, 1, 0, 0],
            [0, 0, 5, 2],
            0,
            3600,
            3600,
        );
        out.write_period(&[0.0; 4], &[0.0; 8]);
        out.write_period(&[0.0; 4], &[0.0; 8]);
        assert_eq!(out.periods, 2);
    }
}
