//! # Recorded motion vector streams
//!
//! Streams are a sequence of frame records. Each record starts with the frame's byte length as a
//! 32-bit LE integer, followed by the raw encoder vectors.

use crate::error::{Error, Result};
use log::*;
use std::io::{ErrorKind, Read, Write};

/// Open a recorded stream.
///
/// `-` reads from standard input, anything else is a file path.
pub fn open_input(input: &str) -> Result<Box<dyn Read + Send>> {
    if input == "-" {
        debug!("Reading vector stream from stdin");
        return Ok(Box::new(std::io::stdin()));
    }

    std::fs::File::open(input)
        .map(|i| Box::new(i) as _)
        .map_err(Into::into)
}

/// Reads frame records from a stream.
pub struct FrameReader<T> {
    reader: T,
    max_frame_len: usize,
}

impl<T: Read> FrameReader<T> {
    /// Largest frame accepted by default. A 4K frame has well under 40000 macroblocks.
    pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 20;

    pub fn new(reader: T) -> Self {
        Self {
            reader,
            max_frame_len: Self::DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Read the next frame into `buf`.
    ///
    /// Returns `Ok(false)` at a clean end of stream. The buffer is cleared first.
    pub fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();

        let mut len = [0u8; std::mem::size_of::<u32>()];

        // Only the very first byte of a record may hit the end of the stream.
        match self.reader.read(&mut len[..1]) {
            Ok(0) => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return self.read_frame(buf),
            Err(e) => return Err(e.into()),
        }

        self.reader.read_exact(&mut len[1..])?;
        let len = u32::from_le_bytes(len) as usize;

        if len > self.max_frame_len {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {} byte limit", self.max_frame_len),
            )));
        }

        buf.try_reserve_exact(len)
            .map_err(|_| Error::Allocation(len))?;
        buf.resize(len, 0);
        self.reader.read_exact(buf)?;

        Ok(true)
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = vec![];
        match self.read_frame(&mut buf) {
            Ok(true) => Some(Ok(buf)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Writes frame records to a stream.
pub struct FrameWriter<T> {
    writer: T,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(writer: T) -> Self {
        Self { writer }
    }

    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let len = u32::try_from(frame.len())
            .map_err(|_| Error::Config(format!("frame of {} bytes is too big", frame.len())))?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(frame)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(Into::into)
    }

    pub fn into_inner(self) -> T {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_then_read() {
        let mut writer = FrameWriter::new(vec![]);
        writer.write_frame(&[1, 2, 3, 4]).unwrap();
        writer.write_frame(&[]).unwrap();
        writer.write_frame(&[5, 6, 7, 8, 9, 10, 11, 12]).unwrap();

        let data = writer.into_inner();
        assert_eq!(&data[..8], &[4, 0, 0, 0, 1, 2, 3, 4]);

        let frames = FrameReader::new(Cursor::new(data))
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(
            frames,
            vec![vec![1, 2, 3, 4], vec![], vec![5, 6, 7, 8, 9, 10, 11, 12]]
        );
    }

    #[test]
    fn truncated_record() {
        let mut reader = FrameReader::new(Cursor::new(vec![8, 0, 0, 0, 1, 2, 3]));
        let mut buf = vec![];
        assert!(matches!(reader.read_frame(&mut buf), Err(Error::Io(_))));

        let mut reader = FrameReader::new(Cursor::new(vec![8, 0]));
        assert!(matches!(reader.read_frame(&mut buf), Err(Error::Io(_))));
    }

    #[test]
    fn oversized_record() {
        let mut reader = FrameReader::new(Cursor::new(vec![0, 0, 0, 1])).with_max_frame_len(1024);
        let mut buf = vec![];
        assert!(matches!(reader.read_frame(&mut buf), Err(Error::Io(_))));
    }

    #[test]
    fn open_missing_file() {
        assert!(matches!(
            open_input("/nonexistent/vectors.mvraw"),
            Err(Error::Io(_))
        ));
        // Addresses are plain paths, there is no network input.
        assert!(matches!(open_input("tcp://localhost:1234"), Err(Error::Io(_))));
    }
}
