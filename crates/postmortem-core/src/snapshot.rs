//! # Snapshots
//!
//! The persisted envelope around a captured object map.
//!
//! A snapshot holds the records of every captured object, the id of the
//! innermost frame (or one frame per thread), the source text of every file
//! a captured frame was executing, an optional description and producer
//! metadata.
//!
//! ## File Format
//!
//! One JSON document. Files whose name ends in `.json` are written as plain
//! text; anything else is gzip-compressed.
//!
//! ```json
//! {
//!   "objects": { "140234": {"type": "frame", "attrs": {"f_back": "140301", ...}}, ... },
//!   "frame": "140234",
//!   "files": { "/app/main.py": ["import sys\n", ...] },
//!   "description": null,
//!   "metadata": { "version": "0.1.0", "dump_time": "2026-10-15 09:12:44", "system": {...}, ... }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::container::ObjectContainer;
use crate::error::{PostmortemError, Result};
use crate::object::{Frame, ObjRef};
use crate::support::TypeRegistry;
use crate::types::{ObjectId, ObjectMap};
use crate::value::FrameView;

/// Version of the envelope layout.
pub const FORMAT_VERSION: u32 = 1;

/// Version of this library, recorded in every snapshot it writes.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded in every snapshot this library writes.
pub const PRODUCER: &str = "postmortem-core";

/// Extra BFS levels between a frame and the values of its locals
/// (frame -> `f_locals` -> value).
const FRAME_DEPTH_OFFSET: usize = 2;

/// Platform the snapshot was produced on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemInfo
{
    pub system: String,
    pub node: String,
    pub release: String,
    #[serde(default)]
    pub machine: String,
}

impl SystemInfo
{
    /// Description of the running host.
    ///
    /// `release` comes from `/proc/sys/kernel/osrelease` and is empty on
    /// hosts without it (anything but Linux). `node` falls back from
    /// `$HOSTNAME` to `/etc/hostname` and may be empty too.
    #[must_use]
    pub fn current() -> Self
    {
        Self {
            system: std::env::consts::OS.to_string(),
            node: hostname(),
            release: read_trimmed("/proc/sys/kernel/osrelease").unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
        }
    }
}

fn hostname() -> String
{
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.is_empty())
        .or_else(|| read_trimmed("/etc/hostname"))
        .unwrap_or_default()
}

fn read_trimmed(path: &str) -> Option<String>
{
    fs::read_to_string(path).ok().map(|text| text.trim().to_string())
}

/// Who wrote a snapshot, when, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata
{
    #[serde(default)]
    pub format_version: u32,
    /// Producer version; compared against [`VERSION`] on load.
    pub version: String,
    #[serde(default)]
    pub producer: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub dump_time: String,
    pub system: SystemInfo,
}

impl Metadata
{
    /// Metadata for a snapshot taken now.
    #[must_use]
    pub fn current() -> Self
    {
        Self {
            format_version: FORMAT_VERSION,
            version: VERSION.to_string(),
            producer: PRODUCER.to_string(),
            dump_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            system: SystemInfo::current(),
        }
    }
}

/// Root frame of one captured thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord
{
    pub frame: ObjectId,
    pub name: String,
}

/// A thread's innermost frame, as handed to [`Snapshot::capture_threads`].
#[derive(Clone)]
pub struct ThreadCapture
{
    pub id: String,
    pub name: String,
    pub frame: Arc<Frame>,
}

/// Knobs for one capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions
{
    /// Free text stored alongside the objects.
    pub description: Option<String>,
    /// Levels of values to expand below each frame's locals.
    pub depth: Option<usize>,
    pub config: CaptureConfig,
}

impl CaptureOptions
{
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self
    {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self
    {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: CaptureConfig) -> Self
    {
        self.config = config;
        self
    }
}

/// A captured call stack and everything reachable from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot
{
    pub objects: ObjectMap,
    /// Innermost frame of the captured (or current) thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<ObjectId>,
    /// Thread id to root frame, for multi-thread captures.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub threads: BTreeMap<String, ThreadRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_thread: Option<String>,
    /// Absolute source path to its lines, line endings included.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    pub metadata: Metadata,
}

impl Snapshot
{
    /// Capture `frame` and every caller behind it.
    ///
    /// All frames are roots of one walk. `options.depth` counts levels below
    /// each frame's locals, so `Some(1)` records the locals' values but
    /// nothing they reference.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use postmortem_core::object::{self, Code, Dict, Frame};
    /// use postmortem_core::prelude::*;
    ///
    /// let registry = Arc::new(TypeRegistry::with_builtins(Arc::new(RedactionPolicy::new())));
    /// let locals = Dict::new(vec![(object::string("x"), object::int(142_857))]);
    /// let frame = Frame::new(Code::new("main", "main.py", 1), 3, locals, Dict::new(Vec::new()), None);
    ///
    /// let snapshot = Snapshot::capture(&registry, &frame, &CaptureOptions::default());
    /// let loaded = snapshot.load(registry);
    /// let view = loaded.frame_view().unwrap();
    /// assert_eq!(view.name().as_deref(), Some("main"));
    /// assert_eq!(view.local("x").and_then(|v| v.as_int()), Some(142_857));
    /// ```
    #[must_use]
    pub fn capture(registry: &Arc<TypeRegistry>, frame: &Arc<Frame>, options: &CaptureOptions) -> Self
    {
        let chain = frame.chain();
        let mut snapshot = Self::capture_chains(registry, &[chain], options);
        snapshot.frame = Some(ObjectId::of(&(Arc::clone(frame) as ObjRef)));
        snapshot
    }

    /// Capture several threads' stacks in one walk.
    ///
    /// `current` names the thread whose frame becomes [`Snapshot::frame`].
    #[must_use]
    pub fn capture_threads(
        registry: &Arc<TypeRegistry>,
        threads: &[ThreadCapture],
        current: Option<&str>,
        options: &CaptureOptions,
    ) -> Self
    {
        let chains: Vec<Vec<Arc<Frame>>> = threads.iter().map(|thread| thread.frame.chain()).collect();
        let mut snapshot = Self::capture_chains(registry, &chains, options);

        for thread in threads {
            let frame = ObjectId::of(&(Arc::clone(&thread.frame) as ObjRef));
            if current == Some(thread.id.as_str()) {
                snapshot.frame = Some(frame.clone());
            }
            snapshot.threads.insert(
                thread.id.clone(),
                ThreadRecord {
                    frame,
                    name: thread.name.clone(),
                },
            );
        }
        snapshot.current_thread = current.map(str::to_string);
        snapshot
    }

    fn capture_chains(registry: &Arc<TypeRegistry>, chains: &[Vec<Arc<Frame>>], options: &CaptureOptions) -> Self
    {
        let mut container = ObjectContainer::with_config(Arc::clone(registry), options.config);
        let roots: Vec<ObjRef> = chains
            .iter()
            .flatten()
            .map(|frame| Arc::clone(frame) as ObjRef)
            .collect();
        let depth = options.depth.map(|depth| depth.saturating_add(FRAME_DEPTH_OFFSET));
        container.add_objects(&roots, depth);

        let filenames: BTreeSet<&str> = chains.iter().flatten().map(|frame| frame.code().filename()).collect();
        let files = collect_files(filenames);
        debug!(objects = container.len(), frames = roots.len(), files = files.len(), "snapshot captured");

        let objects = container.get_objects().clone();
        container.clear();
        Self {
            objects,
            frame: None,
            threads: BTreeMap::new(),
            current_thread: None,
            files,
            description: options.description.clone(),
            metadata: Metadata::current(),
        }
    }

    /// Capture `frame` and write it to a file.
    ///
    /// See [`dump_path`] for how the destination is chosen. Returns the path
    /// written.
    ///
    /// ## Errors
    ///
    /// Returns an error if both `path` and `directory` are given or the file
    /// cannot be written.
    pub fn dump(
        registry: &Arc<TypeRegistry>,
        frame: &Arc<Frame>,
        options: &CaptureOptions,
        path: Option<&Path>,
        directory: Option<&Path>,
    ) -> Result<PathBuf>
    {
        let output = dump_path(frame.code().name(), path, directory)?;
        let snapshot = Self::capture(registry, frame, options);
        snapshot.write_to(&output)?;
        info!(path = %output.display(), "snapshot written");
        Ok(output)
    }

    /// Serialize to a JSON string.
    ///
    /// ## Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String>
    {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON string.
    ///
    /// ## Errors
    ///
    /// Returns [`PostmortemError::MalformedSnapshot`] if `text` is not a
    /// snapshot document.
    pub fn from_json(text: &str) -> Result<Self>
    {
        Ok(serde_json::from_str(text)?)
    }

    /// Write to `path`, creating parent directories. Gzip-compressed unless
    /// the name ends in `.json`.
    ///
    /// ## Errors
    ///
    /// Returns [`PostmortemError::Io`] if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()>
    {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = self.to_json()?;
        let file = BufWriter::new(File::create(path)?);
        if is_plain_json(path) {
            let mut file = file;
            file.write_all(json.as_bytes())?;
            file.flush()?;
        } else {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?.flush()?;
        }
        Ok(())
    }

    /// Read a snapshot file written by [`write_to`](Self::write_to).
    ///
    /// ## Errors
    ///
    /// - [`PostmortemError::Io`] if the file cannot be read or decompressed.
    /// - [`PostmortemError::MalformedSnapshot`] if it is not a snapshot.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self>
    {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut text = String::new();
        if is_plain_json(path) {
            let mut reader = reader;
            reader.read_to_string(&mut text)?;
        } else {
            GzDecoder::new(reader).read_to_string(&mut text)?;
        }
        serde_json::from_str(&text).map_err(|source| PostmortemError::MalformedSnapshot {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// `true` if this library wrote the snapshot. Logs a warning otherwise.
    pub fn check_version(&self) -> bool
    {
        if self.metadata.version == VERSION {
            return true;
        }
        warn!(
            snapshot_version = %self.metadata.version,
            current_version = VERSION,
            "snapshot was created by a different version"
        );
        false
    }

    /// Reconstruct the object graph.
    ///
    /// A version mismatch is logged and otherwise ignored.
    #[must_use]
    pub fn load(&self, registry: Arc<TypeRegistry>) -> LoadedSnapshot
    {
        self.check_version();
        let mut container = ObjectContainer::new(registry);
        container.load_objects(self.objects.clone());
        LoadedSnapshot {
            container,
            frame: self.frame.clone(),
            threads: self.threads.clone(),
            current_thread: self.current_thread.clone(),
            files: self.files.clone(),
        }
    }

    /// Summary for listing, labelled with `path`.
    #[must_use]
    pub fn summary(&self, path: impl Into<PathBuf>) -> PeekSummary
    {
        PeekSummary {
            path: path.into(),
            producer: self.metadata.producer.clone(),
            version: self.metadata.version.clone(),
            system: self.metadata.system.clone(),
            dump_time: self.metadata.dump_time.clone(),
            description: self.description.clone(),
        }
    }

    /// Read just enough of a snapshot file to describe it.
    ///
    /// ## Errors
    ///
    /// Same as [`read_from`](Self::read_from).
    pub fn peek(path: impl AsRef<Path>) -> Result<PeekSummary>
    {
        let path = path.as_ref();
        let snapshot = Self::read_from(path)?;
        snapshot.check_version();
        let absolute = absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(snapshot.summary(absolute))
    }
}

/// Where [`Snapshot::dump`] writes.
///
/// `path` is used as given; otherwise the name is
/// `postmortem_<function>_<YYYYmmdd_HHMMSS_micros>.dump`, placed in
/// `directory` or the working directory. The result is absolute.
///
/// ## Errors
///
/// - [`PostmortemError::InvalidArgument`] if both `path` and `directory` are given.
/// - [`PostmortemError::Io`] if the working directory cannot be determined.
pub fn dump_path(function: &str, path: Option<&Path>, directory: Option<&Path>) -> Result<PathBuf>
{
    if let Some(path) = path {
        if directory.is_some() {
            return Err(PostmortemError::InvalidArgument(
                "cannot specify both path and directory".to_string(),
            ));
        }
        return absolute(path);
    }

    let function = Path::new(function)
        .file_name()
        .map_or_else(|| function.to_string(), |name| name.to_string_lossy().into_owned());
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f");
    let filename = format!("postmortem_{function}_{stamp}.dump");
    match directory {
        Some(directory) => absolute(&directory.join(filename)),
        None => absolute(Path::new(&filename)),
    }
}

fn absolute(path: &Path) -> Result<PathBuf>
{
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn is_plain_json(path: &Path) -> bool
{
    path.extension().is_some_and(|ext| ext == "json")
}

fn collect_files<'a>(filenames: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, Vec<String>>
{
    let mut files = BTreeMap::new();
    for filename in filenames {
        match fs::read_to_string(filename) {
            Ok(text) => {
                let lines = text.split_inclusive('\n').map(str::to_string).collect();
                files.insert(filename.to_string(), lines);
            }
            Err(err) => debug!(filename, error = %err, "source file not collected"),
        }
    }
    files
}

/// Describe every file in `paths`, one result per file, in order.
///
/// A file that cannot be read or parsed yields an error for that entry
/// only.
pub fn peek_files<I, P>(paths: I) -> Vec<(PathBuf, Result<PeekSummary>)>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .map(|path| {
            let path = path.as_ref().to_path_buf();
            let summary = Snapshot::peek(&path);
            if let Err(err) = &summary {
                warn!(path = %path.display(), error = %err, "skipping unreadable snapshot");
            }
            (path, summary)
        })
        .collect()
}

/// One-file description printed by `peek`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekSummary
{
    pub path: PathBuf,
    pub producer: String,
    pub version: String,
    pub system: SystemInfo,
    pub dump_time: String,
    pub description: Option<String>,
}

impl fmt::Display for PeekSummary
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "{}", self.path.display())?;
        let producer = if self.producer.is_empty() { PRODUCER } else { self.producer.as_str() };
        writeln!(
            f,
            "    {producer} v{} on {} {} {}",
            self.version, self.system.system, self.system.node, self.system.release
        )?;
        write!(f, "    {}", self.dump_time)?;
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            for line in description.lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

/// A snapshot turned back into a navigable graph.
pub struct LoadedSnapshot
{
    pub container: ObjectContainer,
    pub frame: Option<ObjectId>,
    pub threads: BTreeMap<String, ThreadRecord>,
    pub current_thread: Option<String>,
    pub files: BTreeMap<String, Vec<String>>,
}

impl LoadedSnapshot
{
    /// The innermost frame of the captured (or current) thread.
    #[must_use]
    pub fn frame_view(&self) -> Option<FrameView>
    {
        self.container.frame(self.frame.as_ref()?)
    }

    /// Innermost frame of every captured thread, by thread id.
    #[must_use]
    pub fn thread_views(&self) -> Vec<(String, FrameView)>
    {
        self.threads
            .iter()
            .filter_map(|(id, thread)| self.container.frame(&thread.frame).map(|view| (id.clone(), view)))
            .collect()
    }

    /// Line `lineno` (1-based) of a captured source file, without its line
    /// ending.
    #[must_use]
    pub fn source_line(&self, filename: &str, lineno: i64) -> Option<&str>
    {
        let index = usize::try_from(lineno).ok()?.checked_sub(1)?;
        self.files
            .get(filename)?
            .get(index)
            .map(|line| line.trim_end_matches(['\r', '\n']))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_dump_path_rejects_path_and_directory()
    {
        let err = dump_path("main", Some(Path::new("a.dump")), Some(Path::new("/tmp"))).unwrap_err();
        assert!(matches!(err, PostmortemError::InvalidArgument(_)));
    }

    #[test]
    fn test_dump_path_default_name()
    {
        let path = dump_path("compute", None, Some(Path::new("/var/dumps"))).unwrap();
        assert!(path.starts_with("/var/dumps"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("postmortem_compute_"), "{name}");
        assert!(name.ends_with(".dump"));
        // YYYYmmdd_HHMMSS_micros
        let stamp = &name["postmortem_compute_".len()..name.len() - ".dump".len()];
        assert_eq!(stamp.len(), 22, "{stamp}");
    }

    #[test]
    fn test_system_info_describes_host()
    {
        let info = SystemInfo::current();
        assert_eq!(info.system, std::env::consts::OS);
        assert_eq!(info.machine, std::env::consts::ARCH);
        if !Path::new("/proc/sys/kernel/osrelease").exists() {
            assert!(info.release.is_empty());
        }
    }

    #[test]
    fn test_peek_summary_display()
    {
        let summary = PeekSummary {
            path: PathBuf::from("/tmp/a.dump"),
            producer: PRODUCER.to_string(),
            version: "0.1.0".to_string(),
            system: SystemInfo {
                system: "linux".to_string(),
                node: "box".to_string(),
                release: "6.1".to_string(),
                machine: "x86_64".to_string(),
            },
            dump_time: "2026-10-15 09:12:44".to_string(),
            description: Some("first\nsecond".to_string()),
        };
        assert_eq!(
            summary.to_string(),
            "/tmp/a.dump\n    postmortem-core v0.1.0 on linux box 6.1\n    2026-10-15 09:12:44\n    first\n    second"
        );
    }

    #[test]
    fn test_envelope_omits_empty_thread_fields()
    {
        let snapshot = Snapshot {
            objects: ObjectMap::new(),
            frame: Some(ObjectId::new("1")),
            threads: BTreeMap::new(),
            current_thread: None,
            files: BTreeMap::new(),
            description: None,
            metadata: Metadata::current(),
        };
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert!(json.get("threads").is_none());
        assert!(json.get("current_thread").is_none());
        assert_eq!(json["description"], serde_json::Value::Null);
        assert_eq!(json["metadata"]["version"], VERSION);
    }
}
