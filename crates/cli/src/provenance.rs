use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run metadata recorded next to every artifact.
pub struct Payload {
    pub params: Value,
    /// Optional free-form run tag (`--tag`).
    pub tag: Option<String>,
    /// Further files produced by the same run (e.g. the trace CSV).
    pub extra_outputs: Vec<PathBuf>,
}

impl Payload {
    pub fn new(params: Value) -> Self {
        Self {
            params,
            tag: None,
            extra_outputs: Vec::new(),
        }
    }

    pub fn tagged(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_outputs.push(path.into());
        self
    }
}

/// Write `<artifact>.provenance.json`: code revision, solver version, callsite,
/// parameters and every output path of the run.
#[track_caller]
pub fn write_sidecar<P: AsRef<Path>>(artifact: P, payload: Payload) -> Result<PathBuf> {
    let artifact = artifact.as_ref();
    let sidecar = sidecar_path(artifact);
    if let Some(parent) = sidecar.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating provenance dir {}", parent.display()))?;
        }
    }

    let callsite = Location::caller();
    let mut outputs = vec![artifact.to_string_lossy().into_owned()];
    outputs.extend(
        payload
            .extra_outputs
            .iter()
            .map(|p| p.to_string_lossy().into_owned()),
    );
    let doc = json!({
        "code_rev": current_git_rev(),
        "hzcap_version": hzcap::VERSION,
        "callsite": {
            "file": callsite.file(),
            "line": callsite.line()
        },
        "tag": payload.tag,
        "params": payload.params,
        "outputs": outputs
    });
    fs::write(&sidecar, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", sidecar.display()))?;
    Ok(sidecar)
}

fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".provenance.json");
    artifact.with_file_name(name)
}

pub fn current_git_rev() -> String {
    if let Some(baked) = option_env!("GIT_COMMIT").filter(|s| !s.is_empty()) {
        return baked.to_string();
    }
    if let Ok(rev) = std::env::var("GIT_COMMIT") {
        if !rev.is_empty() {
            return rev;
        }
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
