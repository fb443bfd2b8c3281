use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use walkdir::WalkDir;

use super::store::Snapshot;
use super::{ErrorKind, Result, ResultExt};

/// Parse every document of a yaml stream
///
/// Empty documents (eg. a comment between two `---`) are dropped rather than returned as nulls.
pub fn parse_documents(data: &str) -> Result<Vec<Value>> {
    let mut res = vec![];
    for (i, de) in serde_yaml::Deserializer::from_str(data).enumerate() {
        let doc = Value::deserialize(de).chain_err(|| format!("yaml document {} does not parse", i))?;
        if doc.is_null() {
            trace!("dropping empty yaml document {}", i);
            continue;
        }
        res.push(doc);
    }
    Ok(res)
}

/// Read all documents of a single yaml file
pub fn read_file(pth: &Path) -> Result<Vec<Value>> {
    trace!("Reading policies from {}", pth.display());
    if !pth.is_file() {
        bail!(ErrorKind::PolicyFileMissing(pth.display().to_string()));
    }
    let mut f = File::open(pth)?;
    let mut data = String::new();
    f.read_to_string(&mut data)?;
    parse_documents(&data).chain_err(|| format!("failed to read {}", pth.display()))
}

fn is_yaml(pth: &Path) -> bool {
    match pth.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => true,
        _ => false,
    }
}

/// Expand a file or directory into the yaml files it holds
///
/// Directories are walked recursively; files are returned sorted by path.
pub fn policy_files(pth: &Path) -> Result<Vec<PathBuf>> {
    if pth.is_file() {
        return Ok(vec![pth.to_path_buf()]);
    }
    if !pth.is_dir() {
        bail!(ErrorKind::PolicyFileMissing(pth.display().to_string()));
    }
    let mut xs = vec![];
    for entry in WalkDir::new(pth).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() && is_yaml(entry.path()) {
            xs.push(entry.path().to_path_buf());
        }
    }
    xs.sort();
    debug!("Found {} policy files in {}", xs.len(), pth.display());
    Ok(xs)
}

/// Read every document under the given files and directories, in order
pub fn read_paths(paths: &[PathBuf]) -> Result<Vec<Value>> {
    let mut docs = vec![];
    for p in paths {
        for f in policy_files(p)? {
            docs.extend(read_file(&f)?);
        }
    }
    Ok(docs)
}

/// Load a snapshot from files and directories
pub fn load(paths: &[PathBuf]) -> Result<Snapshot> {
    let docs = read_paths(paths)?;
    Snapshot::load(&docs)
}
