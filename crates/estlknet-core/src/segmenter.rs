//! Output segmenter
//!
//! Owns the single open output stream. Switching segment always closes the
//! previous stream before the next one is opened, and lines are written
//! through to the stream that is current at the time of the call.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use crate::run_context::{RunContext, Segment};

/// Factory for segment output streams
pub trait SegmentSink {
    type Writer: Write;

    /// Open (create or truncate) the stream for a segment
    fn open(&mut self, segment: Segment) -> io::Result<Self::Writer>;
}

/// Writes segments as files beside the source program.
#[derive(Debug)]
pub struct FileSink {
    context: RunContext,
    created: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(context: RunContext) -> Self {
        Self {
            context,
            created: Vec::new(),
        }
    }

    /// Files created so far, in creation order
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    pub fn into_created(self) -> Vec<PathBuf> {
        self.created
    }
}

impl SegmentSink for FileSink {
    type Writer = BufWriter<File>;

    fn open(&mut self, segment: Segment) -> io::Result<Self::Writer> {
        let path = self.context.output_path(segment);
        let file = File::create(&path)?;
        tracing::debug!("Opened {} output {}", segment, path.display());
        self.created.push(path);
        Ok(BufWriter::new(file))
    }
}

/// In-memory sink, mainly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    segments: Rc<RefCell<Vec<(Segment, Vec<u8>)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every segment opened so far with its raw bytes
    pub fn segment_bytes(&self) -> Vec<(Segment, Vec<u8>)> {
        self.segments.borrow().clone()
    }

    /// Snapshot of every segment opened so far with its text
    pub fn segments(&self) -> Vec<(Segment, String)> {
        self.segments
            .borrow()
            .iter()
            .map(|(segment, bytes)| (*segment, String::from_utf8_lossy(bytes).into_owned()))
            .collect()
    }
}

/// Writer handed out by [`MemorySink`]
#[derive(Debug)]
pub struct MemoryWriter {
    index: usize,
    segments: Rc<RefCell<Vec<(Segment, Vec<u8>)>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.segments.borrow_mut()[self.index].1.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SegmentSink for MemorySink {
    type Writer = MemoryWriter;

    fn open(&mut self, segment: Segment) -> io::Result<Self::Writer> {
        let mut segments = self.segments.borrow_mut();
        segments.push((segment, Vec::new()));
        Ok(MemoryWriter {
            index: segments.len() - 1,
            segments: Rc::clone(&self.segments),
        })
    }
}

/// Holds the current output stream and switches between segments.
pub struct OutputSegmenter<S: SegmentSink> {
    sink: S,
    current: Option<(Segment, S::Writer)>,
    segments_opened: usize,
    lines_written: u64,
}

impl<S: SegmentSink> OutputSegmenter<S> {
    /// Create a segmenter; the default stream is opened on first write
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            current: None,
            segments_opened: 0,
            lines_written: 0,
        }
    }

    /// Segment currently receiving writes, if any stream is open
    pub fn current_segment(&self) -> Option<Segment> {
        self.current.as_ref().map(|(segment, _)| *segment)
    }

    pub fn segments_opened(&self) -> usize {
        self.segments_opened
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Write one line to the current stream
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_bytes(line.as_bytes())
    }

    /// Write one line given as raw bytes, terminated with `\n`.
    ///
    /// Bytes are copied as-is, so lines in a legacy encoding survive.
    pub fn write_bytes(&mut self, line: &[u8]) -> io::Result<()> {
        if self.current.is_none() {
            self.open(Segment::Default)?;
        }
        if let Some((_, writer)) = self.current.as_mut() {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
            self.lines_written += 1;
        }
        Ok(())
    }

    /// Close the current stream and open the one for `segment`
    pub fn switch_to(&mut self, segment: Segment) -> io::Result<()> {
        self.close_current()?;
        self.open(segment)
    }

    /// Close the last stream and hand back the sink.
    ///
    /// If nothing was ever written the default stream is still created.
    pub fn finish(mut self) -> io::Result<S> {
        if self.segments_opened == 0 {
            self.open(Segment::Default)?;
        }
        self.close_current()?;
        Ok(self.sink)
    }

    fn open(&mut self, segment: Segment) -> io::Result<()> {
        let writer = self.sink.open(segment)?;
        self.current = Some((segment, writer));
        self.segments_opened += 1;
        Ok(())
    }

    fn close_current(&mut self) -> io::Result<()> {
        if let Some((_, mut writer)) = self.current.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
