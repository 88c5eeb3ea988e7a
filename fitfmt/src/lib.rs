//! # fitfmt
//!
//! Content formatting integrity engine for workout and program descriptions
//! stored as a constrained rich-text dialect (`p`, `ul`, `li`, bold and
//! underline markers, each tag carrying a style class).
//!
//! Two cooperating passes share one [`StyleGuide`]:
//!
//! - the [`Validator`] diagnoses violations and never mutates its input;
//! - the [`Repairer`] deterministically rewrites a record into canonical form.
//!   Repairing its own output reports no change.
//!
//! The [`Engine`] runs either pass over one page of a [`ContentStore`],
//! isolating per-record failures into the report.
//!
//! ## Quick Start
//!
//! ```rust
//! use fitfmt::{Category, ContentRecord, Engine, Format, MemoryStore, Page, RepairOptions};
//!
//! let mut store = MemoryStore::new(vec![ContentRecord::new(
//!     "w-1",
//!     Category::Strength,
//!     Format::Tabata,
//!     "<p class='x'>Squats 3 x 12</p><p>Lunges 10 reps</p>",
//! )]);
//!
//! let engine = Engine::standard();
//! let audit = engine.run_audit(&store, &Page::first(20)).unwrap();
//! assert_eq!(audit.violating, 1);
//!
//! let repair = engine
//!     .run_repair(&mut store, &Page::first(20), RepairOptions::default())
//!     .unwrap();
//! assert_eq!(repair.repaired_ids, ["w-1"]);
//! assert_eq!(store.get("w-1").unwrap().format, Format::RepsAndSets);
//! ```

mod batch;
mod config;
mod error;
mod fixers;
pub mod markup;
mod normalize;
pub mod output;
mod record;
mod repair;
mod report;
mod rules;
mod store;
mod style;
mod validator;
mod violation;

pub use batch::{Engine, Invocation, InvocationResponse, Mode, Page, RepairOptions};
pub use config::EngineConfig;
pub use error::{BatchError, MalformedFragment, RecordError, StoreError, StyleGuideError};
pub use fixers::{IconFixer, ListFixer};
pub use normalize::{Normalizer, Pass};
pub use record::{ContentRecord, RecordKind};
pub use repair::{RepairOutcome, RepairStats, Repairer};
pub use report::{AuditReport, RecordNote, RecordViolations, RepairReport};
pub use rules::{FormatDecision, FormatRules, FormatSuggestion};
pub use store::{ContentStore, MemoryStore, PageQuery, RecordUpdate};
pub use style::{Category, Format, SectionSpec, StyleClasses, StyleGuide};
pub use validator::Validator;
pub use violation::{Confidence, Violation, ViolationKind};
