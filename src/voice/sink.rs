//! Frame destinations for [`PacedTransport`](super::PacedTransport).

use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::audio::constants::{FRAME_SIZE_BYTES, Frame, MIXER_CHANNELS, TARGET_SAMPLE_RATE};

pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()>;

    /// Flushes and finalizes. Further writes are ignored.
    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Discards audio.
#[derive(Debug, Default)]
pub struct NullSink {
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &Frame) -> std::io::Result<()> {
        self.frames += 1;
        Ok(())
    }
}

const WAV_HEADER_LEN: u32 = 44;

/// 16-bit stereo 48 kHz RIFF/WAVE capture. Size fields are patched in
/// [`finish`](FrameSink::finish).
pub struct WavSink {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    data_len: u32,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        write_header(&mut out, 0)?;
        Ok(Self {
            path,
            out: Some(out),
            data_len: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_header(w: &mut impl Write, data_len: u32) -> std::io::Result<()> {
    let channels = MIXER_CHANNELS as u16;
    let block_align = channels * 2;
    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(WAV_HEADER_LEN - 8 + data_len)?;
    w.write_all(b"WAVEfmt ")?;
    w.write_u32::<LittleEndian>(16)?;
    w.write_u16::<LittleEndian>(1)?;
    w.write_u16::<LittleEndian>(channels)?;
    w.write_u32::<LittleEndian>(TARGET_SAMPLE_RATE)?;
    w.write_u32::<LittleEndian>(TARGET_SAMPLE_RATE * block_align as u32)?;
    w.write_u16::<LittleEndian>(block_align)?;
    w.write_u16::<LittleEndian>(16)?;
    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(data_len)
}

impl FrameSink for WavSink {
    fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        for &sample in frame.iter() {
            out.write_i16::<LittleEndian>(sample)?;
        }
        self.data_len = self.data_len.saturating_add(FRAME_SIZE_BYTES as u32);
        Ok(())
    }

    fn finish(&mut self) -> std::io::Result<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        out.flush()?;
        let mut file = out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        write_header(&mut file, self.data_len)?;
        file.flush()
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("Failed to finalize {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::FrameSink;
    use crate::audio::constants::Frame;

    /// Keeps the first sample of every frame.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub heads: Arc<Mutex<Vec<i16>>>,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
            self.heads.lock().push(frame[0]);
            Ok(())
        }
    }
}
