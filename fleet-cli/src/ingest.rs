//! Loading maintenance data into chunks.
//!
//! Sources are the synthetic CSV exports in the data directory, any text or
//! markdown manuals under `<data_dir>/raw`, and a built-in sample manual. A
//! source that is missing or unreadable is logged and skipped; it never aborts
//! the run.

use std::path::{Path, PathBuf};

use fleet_rag::{CharacterChunker, Chunk, Chunker, RagError, Result};
use tracing::{error, info, instrument, warn};

use crate::settings::Settings;

/// Metadata key naming the kind of document a chunk came from.
pub const DOCUMENT_TYPE_KEY: &str = "document_type";

/// CSV exports loaded by [`DocumentLoader::load_all`], with their document type.
pub const CSV_SOURCES: [(&str, &str); 3] = [
    ("synthetic_maintenance_logs.csv", "maintenance_log"),
    ("synthetic_fleet_info.csv", "fleet_info"),
    ("synthetic_obd_codes.csv", "obd_codes"),
];

const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// Source label of the built-in manual.
pub const SAMPLE_MANUAL_SOURCE: &str = "sample_maintenance_manual.txt";

const SAMPLE_MANUAL: &str = r#"# Commercial Vehicle Engine Maintenance Manual

## Chapter 1: Engine Oil System

### Oil Change Procedures
Regular oil changes are critical for engine longevity. For commercial diesel engines:
- Change interval: Every 15,000-25,000 miles or 6 months
- Oil capacity: 10-15 gallons depending on engine size
- Recommended oil: 15W-40 heavy-duty diesel engine oil

### Oil Analysis
Monitor oil condition through regular analysis:
- Metal content indicates wear patterns
- Viscosity changes suggest contamination
- Acid number indicates oxidation levels

## Chapter 2: Cooling System Maintenance

### Coolant System Inspection
The cooling system prevents engine overheating:
- Check coolant level weekly
- Inspect hoses for cracks or leaks
- Test thermostat operation at 180-195°F
- Flush system every 100,000 miles

### Common Cooling Issues
- Overheating: Check radiator, water pump, thermostat
- Coolant loss: Inspect for external leaks
- Poor heating: May indicate low coolant or air pockets

## Chapter 3: Diagnostic Trouble Codes

### OBD-II System
The On-Board Diagnostic system monitors engine performance:
- P0171: System Too Lean (Bank 1) - Check for vacuum leaks, fuel pressure
- P0300: Random Misfire - Inspect spark plugs, fuel injectors, compression
- P0420: Catalyst Efficiency Below Threshold - Replace catalytic converter
- P2002: DPF Efficiency Below Threshold - Perform DPF regeneration

### DOT Compliance Requirements
Annual inspection items required by DOT:
- Brake system operation and adjustment
- Steering and suspension components
- Lighting and electrical systems
- Engine mounting and condition
- Exhaust system integrity

## Troubleshooting Guide

### Engine Won't Start
1. Check battery voltage (12.6V minimum)
2. Verify fuel supply and quality
3. Check air intake for restrictions
4. Test glow plugs (diesel engines)
5. Examine starter motor operation

### Engine Overheating
1. Check coolant level immediately
2. Inspect radiator for blockage
3. Test thermostat operation
4. Check water pump function
5. Verify fan operation

### Low Oil Pressure
1. Check oil level immediately
2. Verify oil viscosity is correct
3. Inspect oil pump operation
4. Check for internal engine wear
5. Replace oil pressure sensor

### Poor Fuel Economy
1. Check air filter restriction
2. Verify fuel quality
3. Test fuel injectors
4. Check tire pressure
5. Evaluate driving habits
"#;

/// The built-in maintenance manual as one document.
pub fn sample_manual() -> Chunk {
    Chunk::new(SAMPLE_MANUAL)
        .with_source(SAMPLE_MANUAL_SOURCE)
        .with_metadata(DOCUMENT_TYPE_KEY, "maintenance_manual")
        .with_metadata("type", "manual")
}

/// Read `path` as one document per row.
///
/// Each row becomes `"{column}: {value}"` lines in header order, with
/// `source`, `row_index`, `type = csv_data` and `document_type` metadata.
///
/// # Errors
///
/// [`RagError::Ingestion`] on a missing file or any malformed record.
pub fn read_csv(path: &Path, document_type: &str) -> Result<Vec<Chunk>> {
    let source = path.display().to_string();
    let ingestion = |what: String| RagError::Ingestion(format!("{source}: {what}"));

    let mut reader =
        csv::Reader::from_path(path).map_err(|e| ingestion(format!("failed to open: {e}")))?;
    let headers =
        reader.headers().map_err(|e| ingestion(format!("failed to read header: {e}")))?.clone();

    let mut documents = Vec::new();
    for (row_index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ingestion(format!("malformed row {row_index}: {e}")))?;
        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| format!("{column}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        documents.push(
            Chunk::new(content)
                .with_source(source.clone())
                .with_metadata("row_index", row_index.to_string())
                .with_metadata("type", "csv_data")
                .with_metadata(DOCUMENT_TYPE_KEY, document_type),
        );
    }
    Ok(documents)
}

/// Read every `.txt`/`.md` file directly inside `dir`, one document each,
/// in file-name order.
///
/// # Errors
///
/// [`RagError::Ingestion`] when `dir` cannot be listed.
pub fn read_text_dir(dir: &Path) -> Result<Vec<Chunk>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| RagError::Ingestion(format!("failed to read {}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => documents.push(
                Chunk::new(text)
                    .with_source(path.display().to_string())
                    .with_metadata(DOCUMENT_TYPE_KEY, "manual")
                    .with_metadata("type", "manual"),
            ),
            Ok(_) => warn!(path = %path.display(), "skipping empty manual"),
            Err(e) => error!(path = %path.display(), error = %e, "failed to read manual"),
        }
    }
    Ok(documents)
}

/// Gathers every configured source and chunks it.
pub struct DocumentLoader {
    data_dir: PathBuf,
    raw_dir: PathBuf,
    chunker: Box<dyn Chunker>,
    include_sample_manual: bool,
}

impl DocumentLoader {
    pub fn new(data_dir: impl Into<PathBuf>, chunker: Box<dyn Chunker>) -> Self {
        let data_dir = data_dir.into();
        Self { raw_dir: data_dir.join("raw"), data_dir, chunker, include_sample_manual: true }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let chunker = CharacterChunker::new(settings.chunk_size, settings.chunk_overlap);
        Self::new(&settings.data_dir, Box::new(chunker))
    }

    /// Skip the built-in manual.
    pub fn without_sample_manual(mut self) -> Self {
        self.include_sample_manual = false;
        self
    }

    /// Rows of one CSV export, or nothing when it is missing or malformed.
    pub fn load_csv(&self, file_name: &str, document_type: &str) -> Vec<Chunk> {
        let path = self.data_dir.join(file_name);
        if !path.exists() {
            warn!(path = %path.display(), "CSV source not found");
            return Vec::new();
        }
        match read_csv(&path, document_type) {
            Ok(documents) => {
                info!(path = %path.display(), count = documents.len(), "loaded CSV documents");
                documents
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load CSV");
                Vec::new()
            }
        }
    }

    /// Manuals under the raw directory, or nothing when it is absent.
    pub fn load_manuals(&self) -> Vec<Chunk> {
        if !self.raw_dir.is_dir() {
            return Vec::new();
        }
        read_text_dir(&self.raw_dir).unwrap_or_else(|e| {
            error!(dir = %self.raw_dir.display(), error = %e, "failed to load manuals");
            Vec::new()
        })
    }

    /// Every source, chunked and ready for the vector store.
    #[instrument(skip_all, fields(data_dir = %self.data_dir.display()))]
    pub fn load_all(&self) -> Vec<Chunk> {
        let mut documents: Vec<Chunk> = CSV_SOURCES
            .iter()
            .flat_map(|(file, document_type)| self.load_csv(file, document_type))
            .collect();
        documents.extend(self.load_manuals());
        if self.include_sample_manual {
            documents.push(sample_manual());
        }

        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        info!(documents = documents.len(), chunks = chunks.len(), "loaded all documents");
        chunks
    }
}
