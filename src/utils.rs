use std::fs;
use std::path::{Path, PathBuf};

use crate::commons::{Instr, Instructions, SystemSpec};
use crate::error::TraceError;

/// Read every `<testname>*.data` file in `dir`, one instruction stream per
/// file (and so per processor), in file name order.
pub fn read_testfiles(dir: &Path, testname: &str, specs: &SystemSpec) -> Result<Vec<Instructions>, TraceError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| TraceError::Io { path, source }
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.starts_with(testname) && name.ends_with(".data")
        })
        .collect::<Vec<PathBuf>>();
    if paths.is_empty() {
        return Err(TraceError::NotFound { dir: dir.to_path_buf(), name: testname.to_string() });
    }
    paths.sort();

    let mut insts = Vec::with_capacity(paths.len());
    for path in paths {
        info!("reading file: {:?}", path);
        let s = fs::read_to_string(&path).map_err(io_err(&path))?;
        insts.push(parse_trace(&path, &s, specs)?);
    }
    Ok(insts)
}

/// Parse one trace: each line is `<code> <hex value>`, code 0 reads and
/// 1 writes the byte address `value`, code 2 computes for `value` cycles.
pub fn parse_trace(path: &Path, s: &str, specs: &SystemSpec) -> Result<Instructions, TraceError> {
    let mut insts = Instructions::new();
    for (i, line) in s.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = || TraceError::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            text: line.to_string(),
        };
        let mut parts = line.split_whitespace();
        let (Some(code), Some(val), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        let code = code.parse::<u32>().map_err(|_| malformed())?;
        let val = u32::from_str_radix(val.trim_start_matches("0x"), 16).map_err(|_| malformed())?;
        insts.push_back(match code {
            0 => Instr::Read(specs.block_of(val)),
            1 => Instr::Write(specs.block_of(val)),
            2 => Instr::Other(val),
            _ => return Err(TraceError::UnknownInstr { path: path.to_path_buf(), line: i + 1, code }),
        });
    }
    Ok(insts)
}
