// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data model: the entities populated and read by the build pipeline.

use crate::id::{
    AstId, ContentVersionId, FileId, LocId, PlaysetId, QueueId, RefId, RunId, SymbolId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a content version's files originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vanilla,
    Workshop,
    Local,
    Wip,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Vanilla => write!(f, "vanilla"),
            Origin::Workshop => write!(f, "workshop"),
            Origin::Local => write!(f, "local"),
            Origin::Wip => write!(f, "wip"),
        }
    }
}

/// A named snapshot of a file-producing source: `vanilla@<version>` or
/// `mod:<mod-id>@<mod-version>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub content_version_id: ContentVersionId,
    pub display_name: String,
    pub origin: Origin,
    /// 0 = vanilla, 1..N = mods in effective order.
    pub load_order: u32,
}

/// A physical file observed in some root. Identity is
/// `(content_version_id, relative_path)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub file_id: FileId,
    pub content_version_id: ContentVersionId,
    /// Root-relative, forward-slashed.
    pub relative_path: String,
    /// Hex digest of the raw bytes.
    pub content_hash: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

/// The parsed tree for a file. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub ast_id: AstId,
    pub file_id: FileId,
    pub node_count: u64,
    /// Compact canonical JSON bytes produced by `qb-ast-serde`.
    pub serialized_blob: Vec<u8>,
}

/// A named definition extracted from an AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol_id: SymbolId,
    pub file_id: FileId,
    pub content_version_id: ContentVersionId,
    /// `/`-joined structural pointer to the defining node.
    pub ast_node_path: String,
    pub line_number: u32,
    pub column_number: u32,
    pub symbol_type: String,
    pub name: String,
    pub scope: Option<String>,
    #[serde(default)]
    pub metadata_json: serde_json::Value,
}

/// Resolution state of a [`Ref`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
    Dynamic,
    Unknown,
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStatus::Resolved => write!(f, "resolved"),
            ResolutionStatus::Unresolved => write!(f, "unresolved"),
            ResolutionStatus::Dynamic => write!(f, "dynamic"),
            ResolutionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A textual reference from a location to a named symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub ref_id: RefId,
    pub file_id: FileId,
    pub content_version_id: ContentVersionId,
    pub ast_node_path: String,
    pub line_number: u32,
    pub column_number: u32,
    pub ref_type: String,
    pub name: String,
    /// The nearest enclosing effect/trigger identifier.
    pub context: Option<String>,
    pub resolution_status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_symbol_id: Option<SymbolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_json: Option<serde_json::Value>,
}

/// One key/value pair per language/version parsed from a `.yml` localization
/// file. Uniqueness: `(file_id, loc_key, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationEntry {
    pub loc_id: LocId,
    pub file_id: FileId,
    pub content_version_id: ContentVersionId,
    pub language: String,
    pub loc_key: String,
    pub version: u32,
    pub raw_value: String,
    pub plain_text: String,
}

/// One root contributing to a [`Playset`]: a content version plus whether it
/// is currently enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaysetRoot {
    pub content_version_id: ContentVersionId,
    pub root_path: String,
    pub enabled: bool,
}

/// The active ordered selection of content versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playset {
    pub playset_id: PlaysetId,
    pub name: String,
    pub root_list: Vec<PlaysetRoot>,
}

/// The canonical envelope names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    IngestOnly,
    Localization,
    ScriptNoRefs,
    ScriptFull,
    LookupEvents,
    LookupDecisions,
    LookupTitles,
    LookupTraits,
}

impl Envelope {
    /// All canonical envelope names, for startup validation of a routing
    /// table loaded from configuration.
    pub const ALL: &'static [Envelope] = &[
        Envelope::IngestOnly,
        Envelope::Localization,
        Envelope::ScriptNoRefs,
        Envelope::ScriptFull,
        Envelope::LookupEvents,
        Envelope::LookupDecisions,
        Envelope::LookupTitles,
        Envelope::LookupTraits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Envelope::IngestOnly => "INGEST_ONLY",
            Envelope::Localization => "LOCALIZATION",
            Envelope::ScriptNoRefs => "SCRIPT_NO_REFS",
            Envelope::ScriptFull => "SCRIPT_FULL",
            Envelope::LookupEvents => "LOOKUP_EVENTS",
            Envelope::LookupDecisions => "LOOKUP_DECISIONS",
            Envelope::LookupTitles => "LOOKUP_TITLES",
            Envelope::LookupTraits => "LOOKUP_TRAITS",
        }
    }

    pub fn parse(s: &str) -> Option<Envelope> {
        Some(match s {
            "INGEST_ONLY" => Envelope::IngestOnly,
            "LOCALIZATION" => Envelope::Localization,
            "SCRIPT_NO_REFS" => Envelope::ScriptNoRefs,
            "SCRIPT_FULL" => Envelope::ScriptFull,
            "LOOKUP_EVENTS" => Envelope::LookupEvents,
            "LOOKUP_DECISIONS" => Envelope::LookupDecisions,
            "LOOKUP_TITLES" => Envelope::LookupTitles,
            "LOOKUP_TRAITS" => Envelope::LookupTraits,
            _ => return None,
        })
    }

    /// The fixed step list for this envelope, per the canonical table.
    pub fn steps(&self) -> Vec<Step> {
        use Step::*;
        match self {
            Envelope::IngestOnly => vec![Ingest],
            Envelope::Localization => vec![Ingest, LocalizationStep],
            Envelope::ScriptNoRefs => vec![Ingest, Parse, Symbols],
            Envelope::ScriptFull => vec![Ingest, Parse, Symbols, Refs],
            Envelope::LookupEvents => vec![Ingest, Parse, Symbols, Refs, LookupKind("events".into())],
            Envelope::LookupDecisions => {
                vec![Ingest, Parse, Symbols, Refs, LookupKind("decisions".into())]
            }
            Envelope::LookupTitles => vec![Ingest, Parse, Symbols, Refs, LookupKind("titles".into())],
            Envelope::LookupTraits => vec![Ingest, Parse, Symbols, Refs, LookupKind("traits".into())],
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An atomic, idempotent step within an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Ingest,
    Parse,
    Symbols,
    Refs,
    #[serde(rename = "LOCALIZATION")]
    LocalizationStep,
    /// `LOOKUP_<KIND>`, e.g. `LOOKUP_EVENTS`.
    LookupKind(String),
}

impl Step {
    pub fn name(&self) -> String {
        match self {
            Step::Ingest => "INGEST".to_string(),
            Step::Parse => "PARSE".to_string(),
            Step::Symbols => "SYMBOLS".to_string(),
            Step::Refs => "REFS".to_string(),
            Step::LocalizationStep => "LOCALIZATION".to_string(),
            Step::LookupKind(kind) => format!("LOOKUP_{}", kind.to_uppercase()),
        }
    }

    /// Parses a step name as it would appear in a routing table, e.g.
    /// `"LOOKUP_EVENTS"`.
    pub fn parse(s: &str) -> Option<Step> {
        Some(match s {
            "INGEST" => Step::Ingest,
            "PARSE" => Step::Parse,
            "SYMBOLS" => Step::Symbols,
            "REFS" => Step::Refs,
            "LOCALIZATION" => Step::LocalizationStep,
            other => {
                let kind = other.strip_prefix("LOOKUP_")?;
                Step::LookupKind(kind.to_lowercase())
            }
        })
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lifecycle status of a [`QueueItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueItemStatus::Pending => write!(f, "pending"),
            QueueItemStatus::Processing => write!(f, "processing"),
            QueueItemStatus::Done => write!(f, "done"),
            QueueItemStatus::Error => write!(f, "error"),
        }
    }
}

/// A unit of build work: a file bound to an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub queue_id: QueueId,
    pub file_id: FileId,
    pub content_version_id: ContentVersionId,
    pub relative_path: String,
    pub content_hash: String,
    pub envelope: Envelope,
    pub steps: Vec<Step>,
    /// Index into `steps`.
    pub current_step: usize,
    pub status: QueueItemStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    /// The step about to execute, if any steps remain.
    pub fn pending_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, QueueItemStatus::Done | QueueItemStatus::Error)
    }

    /// The natural key used to suppress duplicate enqueues (invariant: a
    /// non-terminal item already covering this key is not re-inserted).
    pub fn natural_key(&self) -> (FileId, ContentVersionId, &str) {
        (self.file_id, self.content_version_id.clone(), self.content_hash.as_str())
    }
}

/// Overall status of a [`BuildRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildRunStatus {
    Running,
    Completed,
    Aborted,
}

impl std::fmt::Display for BuildRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildRunStatus::Running => write!(f, "running"),
            BuildRunStatus::Completed => write!(f, "completed"),
            BuildRunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// One discovery → enqueue → dispatch → drain cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRun {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: BuildRunStatus,
    pub trigger: String,
    #[serde(default)]
    pub config_snapshot: serde_json::Value,
    #[serde(default)]
    pub counters: BuildRunCounters,
}

/// Aggregate counters tracked across a [`BuildRun`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRunCounters {
    pub files_discovered: u64,
    pub items_done: u64,
    pub items_error: u64,
    pub worker_crashes: u64,
}

/// A lookup-table row produced by a `LOOKUP_<kind>` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub kind: String,
    pub name: String,
    pub symbol_id: SymbolId,
    pub file_id: FileId,
}

/// Extra fields attached to a `File` registration during content-store
/// ingest, kept separate from the durable `File` row itself.
pub type Metadata = HashMap<String, serde_json::Value>;
