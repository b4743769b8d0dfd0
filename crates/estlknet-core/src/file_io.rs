//! Source reading and the per-run driver loop
//!
//! The source program is streamed line by line through a [`Rewriter`]; no
//! output file is created until the source is known to exist.
//!
//! Lines are read as raw bytes. CAM output is often written in a legacy
//! code page, so a line that is not valid UTF-8 is classified on its lossy
//! decoding and otherwise copied through unchanged. A UTF-8 byte order mark
//! at the start of the file is dropped.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{KnetError, KnetResult};
use crate::rewriter::{RewriteStats, Rewriter};
use crate::run_context::{RunContext, Segment};
use crate::segmenter::{FileSink, MemorySink, OutputSegmenter, SegmentSink};

/// Buffer size for reading the source program (256 KB)
const READ_BUFFER_SIZE: usize = 256 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Options for one rewriting run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The CAM-generated program to rewrite
    pub source: PathBuf,
}

impl RunOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Counters from the rewriter
    pub rewrite: RewriteStats,
    /// Lines written across all outputs, park commands included
    pub lines_written: u64,
    /// Output files in creation order
    pub outputs: Vec<PathBuf>,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines in, {} lines out, {} file(s), {} park move(s), {} config warning(s) in {} ms",
            self.rewrite.lines_read,
            self.lines_written,
            self.outputs.len(),
            self.rewrite.parks_inserted,
            self.rewrite.config_warnings,
            self.elapsed_ms
        )
    }
}

/// Strip a trailing `\n` or `\r\n`.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => line,
    }
}

/// Stream every line of `reader` through `rewriter` into `out`.
///
/// # Errors
/// Returns the first read or write failure; output written so far is kept.
pub fn rewrite_lines<R: BufRead, S: SegmentSink>(
    mut reader: R,
    rewriter: &mut Rewriter,
    out: &mut OutputSegmenter<S>,
) -> KnetResult<()> {
    let mut buf = Vec::new();
    let mut first_line = true;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let mut line = trim_line_ending(&buf);
        if first_line {
            line = line.strip_prefix(UTF8_BOM).unwrap_or(line);
            first_line = false;
        }
        rewriter.process_raw(line, out)?;
    }
    Ok(())
}

/// Rewrite a program held in memory, returning each segment's text.
///
/// Useful for previews; nothing touches the filesystem.
pub fn rewrite_str(program: &str) -> KnetResult<Vec<(Segment, String)>> {
    let sink = MemorySink::new();
    let mut out = OutputSegmenter::new(sink.clone());
    let mut rewriter = Rewriter::new();
    rewrite_lines(program.as_bytes(), &mut rewriter, &mut out)?;
    out.finish()?;
    Ok(sink.segments())
}

fn check_source(path: &Path) -> KnetResult<()> {
    if !path.is_file() {
        return Err(KnetError::SourceNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Rewrite the source program into `_knet` files beside it.
///
/// # Errors
/// Returns [`KnetError::SourceNotFound`] without creating any output if the
/// source does not exist, or the first I/O failure otherwise.
pub fn process_file(options: &RunOptions) -> KnetResult<RunStats> {
    let start = Instant::now();
    let source = options.source.as_path();
    check_source(source)?;

    let context = RunContext::from_source(source)?;
    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(source)?);
    tracing::info!("Processing {}", source.display());

    let mut out = OutputSegmenter::new(FileSink::new(context));
    let mut rewriter = Rewriter::new();
    rewrite_lines(reader, &mut rewriter, &mut out)?;

    let lines_written = out.lines_written();
    let sink = out.finish()?;

    let stats = RunStats {
        rewrite: rewriter.stats().clone(),
        lines_written,
        outputs: sink.into_created(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    tracing::info!("Processing complete: {}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};

    use crate::segmenter::MemoryWriter;

    #[test]
    fn test_rewrite_str() {
        let program = "(Core: {Core: A; X-Axis: X; Park: 0})\n\
                       (Core: {Core: B; X-Axis: U; Park: 300; Feed: 800})\n\
                       (Tool Change [B])\r\n\
                       G1 X5\n";
        let segments = rewrite_str(program).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, Segment::Default);
        assert!(segments[0]
            .1
            .ends_with("G00 X0.000\n(Tool Change [B])\nG1 U5\n"));
    }

    #[test]
    fn test_empty_program_yields_empty_default() {
        let segments = rewrite_str("").unwrap();
        assert_eq!(segments, vec![(Segment::Default, String::new())]);
    }

    #[test]
    fn test_byte_order_mark_is_dropped() {
        let segments =
            rewrite_str("\u{FEFF}(Core : {Core: B; X-Axis: U; Park: 1})\n(Tool Change [B])\nG0 X1\n")
                .unwrap();
        assert_eq!(
            segments,
            vec![(
                Segment::Default,
                "(Core : {Core: B; X-Axis: U; Park: 1})\n(Tool Change [B])\nG0 U1\n".to_string()
            )]
        );
    }

    #[test]
    fn test_split_directive_after_byte_order_mark() {
        let segments =
            rewrite_str("\u{FEFF}(SplitByTool: true)\n(Tool Change [A])\nG0 X1\n").unwrap();
        let kinds: Vec<Segment> = segments.iter().map(|(segment, _)| *segment).collect();
        assert_eq!(kinds, vec![Segment::Split(0), Segment::Split(1)]);
        assert_eq!(segments[0].1, "(SplitByTool: true)\n");
    }

    #[test]
    fn test_byte_order_mark_only_stripped_on_first_line() {
        let segments = rewrite_str("G21\n\u{FEFF}M5\n").unwrap();
        assert_eq!(segments[0].1, "G21\n\u{FEFF}M5\n");
    }

    #[test]
    fn test_invalid_utf8_is_passed_through() {
        let sink = MemorySink::new();
        let mut out = OutputSegmenter::new(sink.clone());
        let mut rewriter = Rewriter::new();
        let source: &[u8] = b"G21\r\n(Werkzeug: Fr\xe4ser 3mm)\nG0 X1\nM5\nG0 X2";

        rewrite_lines(source, &mut rewriter, &mut out).unwrap();
        out.finish().unwrap();

        assert_eq!(rewriter.stats().lines_read, 5);
        assert_eq!(
            sink.segment_bytes(),
            vec![(
                Segment::Default,
                b"G21\n(Werkzeug: Fr\xe4ser 3mm)\nG0 X1\nM5\nG0 X2\n".to_vec()
            )]
        );
    }

    /// Sink that fails to open one segment or to write one line.
    struct FailingSink {
        inner: MemorySink,
        fail_open: Option<Segment>,
        fail_write: Option<&'static [u8]>,
    }

    struct FailingWriter {
        inner: MemoryWriter,
        fail_write: Option<&'static [u8]>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_write.is_some_and(|line| buf == line) {
                return Err(io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl SegmentSink for FailingSink {
        type Writer = FailingWriter;

        fn open(&mut self, segment: Segment) -> io::Result<Self::Writer> {
            if self.fail_open == Some(segment) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            Ok(FailingWriter {
                inner: self.inner.open(segment)?,
                fail_write: self.fail_write,
            })
        }
    }

    const SPLIT_PROGRAM: &str = "(SplitByTool: true)\n\
                                 (Core: {Core: A; X-Axis: X; Park: 10})\n\
                                 (Core: {Core: B; X-Axis: U; Park: 290})\n\
                                 G0 X1\n\
                                 (Tool Change [B])\n\
                                 G0 X2\n\
                                 (Tool Change [A])\n\
                                 G0 X3\n";

    fn run_failing(sink: FailingSink) -> (KnetResult<()>, MemorySink) {
        let memory = sink.inner.clone();
        let mut out = OutputSegmenter::new(sink);
        let mut rewriter = Rewriter::new();
        let result = rewrite_lines(SPLIT_PROGRAM.as_bytes(), &mut rewriter, &mut out);
        (result, memory)
    }

    #[test]
    fn test_write_failure_aborts_and_keeps_earlier_segments() {
        let (result, memory) = run_failing(FailingSink {
            inner: MemorySink::new(),
            fail_open: None,
            fail_write: Some(b"G0 X3"),
        });

        assert!(matches!(result, Err(KnetError::Io(_))));
        let segments = memory.segments();
        assert_eq!(segments.len(), 3);
        assert!(segments[0].1.ends_with("G0 X1\nG00 X10.000\n"));
        assert_eq!(segments[1].1, "(Tool Change [B])\nG0 U2\nG00 U290.000\n");
        assert_eq!(segments[2].1, "(Tool Change [A])\n");
    }

    #[test]
    fn test_open_failure_aborts_at_tool_change() {
        let (result, memory) = run_failing(FailingSink {
            inner: MemorySink::new(),
            fail_open: Some(Segment::Split(1)),
            fail_write: None,
        });

        match result {
            Err(KnetError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected an I/O error, got {:?}", other),
        }
        let segments = memory.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, Segment::Split(0));
        assert!(segments[0].1.ends_with("G0 X1\nG00 X10.000\n"));
    }

    #[test]
    fn test_run_stats_summary() {
        let stats = RunStats {
            rewrite: RewriteStats {
                lines_read: 12,
                parks_inserted: 2,
                config_warnings: 1,
                ..RewriteStats::default()
            },
            lines_written: 14,
            outputs: vec![PathBuf::from("a_knet_0.nc"), PathBuf::from("a_knet_1.nc")],
            elapsed_ms: 7,
        };
        assert_eq!(
            stats.to_string(),
            "12 lines in, 14 lines out, 2 file(s), 2 park move(s), 1 config warning(s) in 7 ms"
        );
    }

    #[test]
    fn test_missing_source() {
        let options = RunOptions::new("/definitely/not/here.gcode");
        assert!(matches!(
            process_file(&options),
            Err(KnetError::SourceNotFound(_))
        ));
    }
}
