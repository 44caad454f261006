//! Job directories.
//!
//! Every transcode writes into its own directory under a jobs root, named by
//! a generated id. The id is what a later reader uses to stream the job, so
//! producer and consumer never share an implicit "current" directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::DecodeInterruption;

pub const MANIFEST_FILE: &str = "job.json";

/// Handle to one job's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
    dir: PathBuf,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn write_manifest(&self, manifest: &JobManifest) -> Result<()> {
        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(manifest).map_err(|e| Error::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| Error::Manifest {
            path,
            reason: e.to_string(),
        })
    }

    /// Manifest of a finished job. Fails with [`Error::StreamUnavailable`]
    /// when the job never completed.
    pub fn read_manifest(&self) -> Result<JobManifest> {
        let path = self.manifest_path();
        let text = fs::read_to_string(&path).map_err(|source| Error::StreamUnavailable {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| Error::Manifest {
            path,
            reason: e.to_string(),
        })
    }
}

/// Summary written next to the frames once a transcode finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub source: PathBuf,
    pub source_width: u32,
    pub source_height: u32,
    pub columns: u32,
    pub rows: u32,
    pub frames: u64,
    #[serde(default)]
    pub interruption: Option<DecodeInterruption>,
}

/// Owner of the jobs root.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jobs_root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty job directory.
    pub fn start_job(&self) -> Result<JobHandle> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir).map_err(|source| Error::JobDir {
            path: dir.clone(),
            source,
        })?;
        log::info!("started job {} in {}", id, dir.display());
        Ok(JobHandle { id, dir })
    }

    /// Look up an existing job by id.
    pub fn open_job(&self, id: &str) -> Result<JobHandle> {
        validate_id(id)?;
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(Error::StreamUnavailable {
                path: dir,
                source: io::Error::new(io::ErrorKind::NotFound, "no such job"),
            });
        }
        Ok(JobHandle {
            id: id.to_string(),
            dir,
        })
    }

    /// Every job directory under the root, sorted by id. A missing root has
    /// no jobs. Directories whose name is not a job id are left alone.
    pub fn list_jobs(&self) -> Result<Vec<JobHandle>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut jobs = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::StreamUnavailable {
                path: self.root.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str() else {
                continue;
            };
            if validate_id(id).is_ok() {
                jobs.push(JobHandle {
                    id: id.to_string(),
                    dir: entry.into_path(),
                });
            }
        }
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    /// Delete every job except `keep`. Job outputs are not additive: a new
    /// job supersedes all earlier ones.
    pub fn retire_others(&self, keep: &JobHandle) -> Result<usize> {
        let mut removed = 0;
        for job in self.list_jobs()? {
            if job.id != keep.id {
                self.remove_job(&job)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn remove_job(&self, job: &JobHandle) -> Result<()> {
        fs::remove_dir_all(&job.dir).map_err(|source| Error::JobDir {
            path: job.dir.clone(),
            source,
        })?;
        log::info!("removed job {}", job.id);
        Ok(())
    }
}

/// Ids are the 32 lowercase hex digits [`JobStore::start_job`] generates.
fn validate_id(id: &str) -> Result<()> {
    let ok = id.len() == 32
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && uuid::Uuid::try_parse(id).is_ok();
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidJobId(id.to_string()))
    }
}
