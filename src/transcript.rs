//! Append-only transcript sinks injected into the prompt assembler.
//!
//! Sinks observe rendered contributions; they never influence selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::constants::transcript::{
    ANSWER_TAG_OPEN, CRITIQUE_TAG_OPEN, ENTRY_RULE_WIDTH, SESSION_TIMESTAMP_FORMAT,
};
use crate::data::Stage;
use crate::errors::PipelineError;
use crate::types::{ContributionText, ContributorId};

/// One observation appended to a transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// A new prompt-building session began.
    SessionStarted { at: DateTime<Utc> },
    /// A sampled answer was rendered under display index `index`.
    Answer {
        stage: Stage,
        index: usize,
        contributor: ContributorId,
        text: ContributionText,
    },
    /// A sampled critique was rendered under display index `index`.
    Critique {
        stage: Stage,
        index: usize,
        contributor: ContributorId,
        text: ContributionText,
    },
}

/// Append-only destination for transcript entries.
pub trait TranscriptSink: Send + Sync {
    /// Append one entry.
    fn append(&self, entry: TranscriptEntry) -> Result<(), PipelineError>;
}

/// Sink that discards every entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTranscript;

impl TranscriptSink for NullTranscript {
    fn append(&self, _entry: TranscriptEntry) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl MemoryTranscript {
    /// Empty in-memory transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry appended so far.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl TranscriptSink for MemoryTranscript {
    fn append(&self, entry: TranscriptEntry) -> Result<(), PipelineError> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct EntryCounters {
    answers: usize,
    critiques: usize,
}

impl EntryCounters {
    /// Counters resuming after the blocks already present in `text`.
    fn resume_from(text: &str) -> Self {
        Self {
            answers: text.matches(ANSWER_TAG_OPEN).count(),
            critiques: text.matches(CRITIQUE_TAG_OPEN).count(),
        }
    }
}

#[derive(Debug)]
struct FileState {
    writer: BufWriter<File>,
    counters: EntryCounters,
}

/// Sink appending tagged, numbered blocks to a text file.
///
/// Entry numbers run per kind and continue from the blocks already in the
/// file, so reopening a transcript never repeats a number.
#[derive(Debug)]
pub struct FileTranscript {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileTranscript {
    /// Open `path` for appending, creating it when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let counters = match fs::read_to_string(&path) {
            Ok(existing) => EntryCounters::resume_from(&existing),
            Err(err) if err.kind() == io::ErrorKind::NotFound => EntryCounters::default(),
            Err(err) => return Err(err.into()),
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(FileState {
                writer: BufWriter::new(file),
                counters,
            }),
        })
    }

    /// Location of the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(entry: &TranscriptEntry, counters: &mut EntryCounters) -> String {
        match entry {
            TranscriptEntry::SessionStarted { at } => {
                format!(
                    "\n\n# New Session {}\n\n",
                    at.format(SESSION_TIMESTAMP_FORMAT)
                )
            }
            TranscriptEntry::Answer { index, text, .. } => {
                counters.answers += 1;
                format!(
                    "{ANSWER_TAG_OPEN}id=\"{index}\" entry=\"{}\">\n{}\n</therapist_answer>\n\n{}\n\n",
                    counters.answers,
                    text.trim(),
                    "-".repeat(ENTRY_RULE_WIDTH)
                )
            }
            TranscriptEntry::Critique { index, text, .. } => {
                counters.critiques += 1;
                format!(
                    "{CRITIQUE_TAG_OPEN}id=\"{index}\" entry=\"{}\">\n{text}\n</supervisor>\n\n",
                    counters.critiques
                )
            }
        }
    }
}

impl TranscriptSink for FileTranscript {
    fn append(&self, entry: TranscriptEntry) -> Result<(), PipelineError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let block = Self::render(&entry, &mut state.counters);
        state.writer.write_all(block.as_bytes())?;
        state.writer.flush()?;
        Ok(())
    }
}

/// Append a session marker stamped with the current time.
pub fn start_session(sink: &dyn TranscriptSink) -> Result<(), PipelineError> {
    sink.append(TranscriptEntry::SessionStarted { at: Utc::now() })
}
