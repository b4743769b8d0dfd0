//! Streaming rewriter
//!
//! Consumes one source line at a time, updates the machine and segment state,
//! and writes the rewritten output through an [`OutputSegmenter`]:
//!
//! 1. `(SplitByTool: ...)` may switch output to segment 0
//! 2. `(Core: ...)` registers a core config
//! 3. `(Tool Change ... [id])` parks the outgoing core and selects `id`,
//!    starting a new segment when splitting is enabled
//! 4. `G...` lines get `X` remapped to the active core's axis letter
//! 5. everything else passes through untouched

use std::borrow::Cow;
use std::io;

use crate::core_config::parse_core_config;
use crate::directive::{classify, remap_axis, Directive};
use crate::error::KnetError;
use crate::machine::MachineState;
use crate::run_context::Segment;
use crate::segmenter::{OutputSegmenter, SegmentSink};

/// Tool-change segmentation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentState {
    /// Set by the first truthy `SplitByTool` directive
    pub split_by_tool: bool,
    /// Index of the current split segment
    pub segment_index: usize,
}

/// Counters collected while rewriting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub lines_read: u64,
    pub parks_inserted: u64,
    pub axis_rewrites: u64,
    pub tool_changes: u64,
    pub config_warnings: u64,
}

/// Per-run rewriting state machine.
#[derive(Debug, Clone, Default)]
pub struct Rewriter {
    machine: MachineState,
    segments: SegmentState,
    stats: RewriteStats,
}

impl Rewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn machine(&self) -> &MachineState {
        &self.machine
    }

    pub fn segment_state(&self) -> SegmentState {
        self.segments
    }

    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }

    /// Process one source line, writing its output (and any inserted park
    /// command) to the segmenter.
    ///
    /// # Errors
    /// Only I/O failures on the output are returned; malformed config
    /// comments are logged and passed through.
    pub fn process_line<S: SegmentSink>(
        &mut self,
        line: &str,
        out: &mut OutputSegmenter<S>,
    ) -> io::Result<()> {
        self.process(line, line.as_bytes(), out)
    }

    /// Process one source line given as raw bytes (line ending stripped).
    ///
    /// The line is classified on its lossy UTF-8 decoding. Lines that are
    /// passed through are written back byte for byte, and motion lines only
    /// have their `X` bytes replaced.
    pub fn process_raw<S: SegmentSink>(
        &mut self,
        raw: &[u8],
        out: &mut OutputSegmenter<S>,
    ) -> io::Result<()> {
        let text = String::from_utf8_lossy(raw);
        if matches!(text, Cow::Owned(_)) {
            tracing::debug!("Line {} is not valid UTF-8: {}", self.stats.lines_read + 1, text);
        }
        self.process(&text, raw, out)
    }

    fn process<S: SegmentSink>(
        &mut self,
        line: &str,
        raw: &[u8],
        out: &mut OutputSegmenter<S>,
    ) -> io::Result<()> {
        self.stats.lines_read += 1;

        match classify(line) {
            Directive::SplitByTool { enabled } => {
                if enabled && !self.segments.split_by_tool {
                    self.segments = SegmentState {
                        split_by_tool: true,
                        segment_index: 0,
                    };
                    tracing::info!(
                        "SplitByTool enabled. Separate output files will be generated for each Tool Change."
                    );
                    out.switch_to(Segment::Split(0))?;
                } else if enabled {
                    tracing::debug!("SplitByTool already enabled, ignoring: {}", line);
                }
                out.write_bytes(raw)
            }
            Directive::CoreConfig => {
                self.load_core_config(line);
                out.write_bytes(raw)
            }
            Directive::ToolChange { core } => self.tool_change(line, raw, core, out),
            Directive::Motion => match self.machine.active_config() {
                Some(config) => {
                    let rewritten = remap_axis(raw, config.axis);
                    if matches!(rewritten, Cow::Owned(_)) {
                        self.stats.axis_rewrites += 1;
                        tracing::trace!(
                            "Remapped X to {}: {}",
                            config.axis,
                            String::from_utf8_lossy(&rewritten)
                        );
                    }
                    out.write_bytes(&rewritten)
                }
                None => out.write_bytes(raw),
            },
            Directive::Other => out.write_bytes(raw),
        }
    }

    fn load_core_config(&mut self, line: &str) {
        match parse_core_config(line) {
            Ok(Some(config)) => {
                tracing::info!(
                    "Loaded config for core {}: Axis {}, Park {}, Feed {}",
                    config.id,
                    config.axis,
                    config.park,
                    config.feed
                );
                let id = config.id.clone();
                if self.machine.insert_config(config) {
                    tracing::info!("Default active core set to {}", id);
                }
            }
            Ok(None) => {
                tracing::debug!("Core config without a Core id ignored: {}", line);
            }
            Err(source) => {
                self.stats.config_warnings += 1;
                let err = KnetError::ConfigDecode {
                    line: line.to_string(),
                    source,
                };
                tracing::warn!("{}", err);
            }
        }
    }

    fn tool_change<S: SegmentSink>(
        &mut self,
        line: &str,
        raw: &[u8],
        core: Option<&str>,
        out: &mut OutputSegmenter<S>,
    ) -> io::Result<()> {
        self.stats.tool_changes += 1;

        match core {
            Some(new_core) if self.machine.contains(new_core) => {
                let outgoing = self
                    .machine
                    .active_core()
                    .filter(|active| !active.is_empty() && *active != new_core)
                    .and_then(|active| self.machine.config(active));

                if let Some(outgoing) = outgoing {
                    let park = outgoing.park_command();
                    tracing::info!("Parking core {} with command: {}", outgoing.id, park);
                    out.write_line(&park)?;
                    self.stats.parks_inserted += 1;
                }

                self.machine.set_active_core(new_core);
            }
            Some(unknown) => {
                tracing::warn!("Tool change to unknown core '{}', active core unchanged", unknown);
            }
            None => {
                tracing::debug!("Tool change without core id: {}", line);
            }
        }

        if self.segments.split_by_tool {
            self.segments.segment_index += 1;
            let segment = Segment::Split(self.segments.segment_index);
            tracing::info!("Starting {} at tool change", segment);
            out.switch_to(segment)?;
        }
        out.write_bytes(raw)
    }
}
