//! The containerd config patcher behind `labctl containerd patch`.
//!
//! Guarantees `systemd_cgroup = true` inside the
//! `[plugins."io.containerd.runtime.v1.linux"]` section of a containerd
//! config file, optionally forcing that section's `runtime` to the nvidia
//! container runtime. Deliberately line oriented: it rewrites or inserts
//! whole lines and never parses the file as structured TOML, so formatting
//! and comments elsewhere in the file survive untouched.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

/// Header line that opens the section the patcher works on.
static TARGET_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*\[plugins\."io\.containerd\.runtime\.v1\.linux"\]"#).unwrap());

/// Header line that starts any other containerd plugin section. Anchored at
/// column 0: an indented header never closes the section.
static NEXT_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\[plugins\."io\.containerd\..*"\]"#).unwrap());

/// An existing `systemd_cgroup = ...` assignment.
static SYSTEMD_CGROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*systemd_cgroup\s*=").unwrap());

/// An existing `runtime = ...` assignment.
static RUNTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*runtime\s*=\s*").unwrap());

const SYSTEMD_CGROUP_LINE: &str = "    systemd_cgroup = true\n";
const NVIDIA_RUNTIME_LINE: &str = "    runtime = \"nvidia-container-runtime\"\n";

/// How the patcher guaranteed the `systemd_cgroup` key. Can either be:
///
/// * Rewritten - an assignment already inside the section was rewritten in place
/// * InsertedBeforeNextSection - the key was missing and a line was inserted right before the section that follows
/// * InsertedAfterHeader - the key was missing and the section runs to the end of the file; a line was inserted directly under its last header
/// * SectionNotFound - the section never appears and nothing was changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupPatch {
    Rewritten,
    InsertedBeforeNextSection,
    InsertedAfterHeader,
    SectionNotFound,
}

/// What a single patch pass did, for reporting and for tests.
#[derive(Debug, PartialEq, Eq)]
pub struct PatchReport {
    pub cgroup: CgroupPatch,
    pub runtime_rewrites: usize,
}

/// Run the patch pass over `lines`, where each line keeps its terminator.
///
/// A single forward scan rewrites assignments in place and remembers where a
/// missing key line would have to go. One finalization step then performs at
/// most one insertion: before the boundary that closed the first section
/// occurrence still missing the key, or under the last section header when
/// the section runs to the end of the file.
pub fn patch_lines(lines: &mut Vec<String>, set_nvidia_runtime: bool) -> PatchReport {
    // Index of the header that opened the section, while inside it.
    let mut open_section: Option<usize> = None;
    let mut systemd_cgroup_exists = false;
    let mut runtime_rewrites = 0usize;
    let mut insert_before: Option<usize> = None;

    for i in 0..lines.len() {
        if TARGET_SECTION.is_match(&lines[i]) {
            debug!("line {}: runtime.v1.linux section header", i + 1);
            open_section = Some(i);
        } else if NEXT_SECTION.is_match(&lines[i]) {
            if open_section.is_some() && !systemd_cgroup_exists && insert_before.is_none() {
                insert_before = Some(i);
            }
            open_section = None;
        }

        if open_section.is_some() {
            if SYSTEMD_CGROUP.is_match(&lines[i]) {
                debug!("line {}: systemd_cgroup assignment", i + 1);
                lines[i] = SYSTEMD_CGROUP_LINE.to_owned();
                systemd_cgroup_exists = true;
            } else if set_nvidia_runtime && RUNTIME.is_match(&lines[i]) {
                debug!("line {}: runtime assignment", i + 1);
                lines[i] = NVIDIA_RUNTIME_LINE.to_owned();
                runtime_rewrites += 1;
            }
        }
    }

    // At most one insertion: the recorded boundary wins, end of file is the
    // fallback when the section is still open there.
    let cgroup = match (insert_before, open_section, systemd_cgroup_exists) {
        (Some(boundary), _, _) => {
            lines.insert(boundary, SYSTEMD_CGROUP_LINE.to_owned());
            info!("inserted systemd_cgroup = true before the next plugin section");
            CgroupPatch::InsertedBeforeNextSection
        }
        (None, Some(header), false) => {
            lines.insert(header + 1, SYSTEMD_CGROUP_LINE.to_owned());
            info!("inserted systemd_cgroup = true under the section header");
            CgroupPatch::InsertedAfterHeader
        }
        (None, _, true) => CgroupPatch::Rewritten,
        (None, None, false) => CgroupPatch::SectionNotFound,
    };

    PatchReport {
        cgroup,
        runtime_rewrites,
    }
}

/// Patch the containerd config file at `path`, overwriting it in place.
pub fn patch_config_file(path: &Path, set_nvidia_runtime: bool) -> Result<PatchReport> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();

    let report = patch_lines(&mut lines, set_nvidia_runtime);

    debug!("writing {}", path.display());
    fs::write(path, lines.concat())
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(report)
}

/// Entry point for `labctl containerd patch PATH [NVIDIA]`.
pub fn run(path: &Path, nvidia: u8) -> Result<()> {
    let set_nvidia_runtime = nvidia != 0;
    let report = patch_config_file(path, set_nvidia_runtime)?;

    match report.cgroup {
        CgroupPatch::SectionNotFound => {
            println!(
                "⚠️  [plugins.\"io.containerd.runtime.v1.linux\"] not found in {}, nothing to change",
                path.display()
            );
        }
        _ => {
            println!("✅ {}: systemd_cgroup = true", path.display());
        }
    }
    if report.runtime_rewrites > 0 {
        println!(
            "✅ {}: runtime = \"nvidia-container-runtime\"",
            path.display()
        );
    }
    Ok(())
}
