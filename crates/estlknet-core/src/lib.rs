//! # EstlKnet Core
//!
//! Rewrites CAM-generated G-code for machines with several independently
//! addressable motion cores (IDEX-style dual carriages and similar).
//!
//! Embedded comments describe each core's axis letter and park position.
//! The rewriter tracks the active core, remaps `X` on motion lines to the
//! active core's letter, parks the outgoing core on every tool change, and
//! can split the output into one file per tool-change segment.

pub mod core_config;
pub mod directive;
pub mod error;
pub mod file_io;
pub mod machine;
pub mod rewriter;
pub mod run_context;
pub mod segmenter;

pub use core_config::{parse_core_config, sanitize_fragment, CoreConfig, CANONICAL_AXIS};
pub use directive::{classify, remap_axis, tool_change_target, Directive};
pub use error::{ConfigError, ConfigResult, KnetError, KnetResult};
pub use file_io::{process_file, rewrite_lines, rewrite_str, RunOptions, RunStats};
pub use machine::MachineState;
pub use rewriter::{RewriteStats, Rewriter, SegmentState};
pub use run_context::{RunContext, Segment, OUTPUT_SUFFIX};
pub use segmenter::{FileSink, MemorySink, MemoryWriter, OutputSegmenter, SegmentSink};
