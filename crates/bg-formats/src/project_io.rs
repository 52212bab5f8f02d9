//! Project files: the model as pretty-printed JSON.
//!
//! Transient playback markers are not written. Loading checks every range
//! and re-sizes patterns so each instrument has the pattern's beat count.

use std::fs;
use std::path::Path;

use bg_ir::Project;

use crate::FormatError;

pub fn to_json(project: &Project) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(project)?)
}

pub fn from_json(json: &str) -> Result<Project, FormatError> {
    let mut project: Project = serde_json::from_str(json)?;
    project.normalize()?;
    Ok(project)
}

pub fn save_project(path: &Path, project: &Project) -> Result<(), FormatError> {
    fs::write(path, to_json(project)?)?;
    log::info!(target: "formats", "saved project {} to {}", project.name(), path.display());
    Ok(())
}

pub fn load_project(path: &Path) -> Result<Project, FormatError> {
    let project = from_json(&fs::read_to_string(path)?)?;
    log::info!(
        target: "formats",
        "loaded project {} ({} patterns, {} BPM)",
        project.name(),
        project.song().len(),
        project.bpm()
    );
    Ok(project)
}
