use std::path::Path;

use usage_core::{SourceCandidate, SourceKind};
use walkdir::{DirEntry, WalkDir};

use crate::reader::is_usage_path;
use crate::types::IngestIssue;

const MAX_WALK_DEPTH: usize = 6;

/// Subdirectories walked ahead of the rest of the base directory.
pub static KNOWN_SUBDIRS: &[&str] = &["sessions", "logs", "usage", "projects", "history"];

#[derive(Debug, Clone, Default)]
pub struct SourceDiscovery {
    pub sources: Vec<SourceCandidate>,
    pub issues: Vec<IngestIssue>,
}

impl SourceDiscovery {
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .filter(|source| source.kind == SourceKind::File)
            .map(|source| source.path.as_str())
    }
}

fn is_known_subdir(entry: &DirEntry) -> bool {
    entry.depth() == 1
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| KNOWN_SUBDIRS.contains(&name))
}

/// Usage files under `dir`, sorted by path. `max_depth` is relative to `dir`.
fn walk_files(
    dir: &Path,
    max_depth: usize,
    skip_known: bool,
    issues: &mut Vec<IngestIssue>,
) -> Vec<String> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| !(skip_known && is_known_subdir(entry)));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let file_path = err
                    .path()
                    .map(|path| path.to_string_lossy().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                issues.push(IngestIssue::new(file_path, err.to_string()));
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && is_usage_path(path) {
            files.push(path.to_string_lossy().to_string());
        }
    }
    files.sort();
    files
}

/// Lists candidate usage files under `base`.
///
/// Files under the known subdirectories come first, in `KNOWN_SUBDIRS` order,
/// followed by everything else. Each group is sorted by path and the depth
/// bound is measured from `base` throughout.
pub fn discover_sources(base: &Path) -> SourceDiscovery {
    let mut discovery = SourceDiscovery::default();
    let base_str = base.to_string_lossy().to_string();
    let metadata = match std::fs::metadata(base) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            discovery
                .issues
                .push(IngestIssue::new(base_str, "usage path not found"));
            return discovery;
        }
        Err(err) => {
            discovery
                .issues
                .push(IngestIssue::new(base_str, format!("usage path unreadable: {err}")));
            return discovery;
        }
    };

    if metadata.is_file() {
        discovery.sources.push(SourceCandidate {
            path: base_str,
            kind: SourceKind::File,
        });
        return discovery;
    }

    discovery.sources.push(SourceCandidate {
        path: base_str,
        kind: SourceKind::Directory,
    });
    let mut files = Vec::new();
    for subdir in KNOWN_SUBDIRS {
        let candidate = base.join(subdir);
        if candidate.is_dir() {
            files.extend(walk_files(
                &candidate,
                MAX_WALK_DEPTH - 1,
                false,
                &mut discovery.issues,
            ));
        }
    }
    files.extend(walk_files(base, MAX_WALK_DEPTH, true, &mut discovery.issues));
    discovery
        .sources
        .extend(files.into_iter().map(|path| SourceCandidate {
            path,
            kind: SourceKind::File,
        }));
    discovery
}
