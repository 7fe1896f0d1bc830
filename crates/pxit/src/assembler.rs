//! Consumer side: frames in, reassembled files out.
//!
//! The assembler is a small state machine keyed on the file length carried
//! by every packet. Frames may arrive in any order, repeated, or not at all;
//! a frame whose packet fails verification is dropped. A verified packet
//! announcing a different file length starts a new transfer.
//!
//! ```text
//!           first verified packet
//!   Idle ---------------------------> Receiving ----------> Complete
//!                                        |   all blocks        |
//!                                        |                     |
//!                    sink failure        v     length change   |
//!                                    Abandoned <---------------+
//!                                   (any state, new length => Receiving)
//! ```

use std::io;

use log::{debug, info, warn};

use crate::checksum::Checksum;
use crate::geometry::{Geometry, HEADER_SIZE};
use crate::packet::PacketHeader;
use crate::raster::PixelBuffer;
use crate::sampler::{ColorSampler, Thresholds};
use crate::sink::{BlockSink, SinkFactory};
use crate::symbol::symbols_to_bytes;
use crate::{PxitError, Result};

/// Where the assembler is in the life of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No verified packet seen yet
    Idle,
    Receiving,
    /// Every block of the current file length has been written
    Complete,
    /// The sink failed; waiting for a different file length
    Abandoned,
}

/// The result of feeding one frame to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome<T> {
    /// Nothing changed
    Ignored,
    /// The frame did not verify while a transfer was underway
    ChecksumFailedMidStream,
    /// A new block was written
    BlockAccepted,
    /// The last missing block was written and the sink closed
    TransferComplete(T),
}

/// Reassembly bookkeeping for one file length.
#[derive(Debug)]
pub struct TransferSession<S> {
    file_length: usize,
    block_count: usize,
    last_block_size: usize,
    received: Vec<bool>,
    received_count: usize,
    sink: Option<S>,
}

impl<S> TransferSession<S> {
    fn new(geometry: &Geometry, file_length: usize) -> Self {
        let block_count = geometry.blocks_needed(file_length);
        Self {
            file_length,
            block_count,
            last_block_size: geometry.last_block_size(file_length),
            received: vec![false; block_count],
            received_count: 0,
            sink: None,
        }
    }

    pub fn file_length(&self) -> usize {
        self.file_length
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Number of meaningful bytes in the final block.
    pub fn last_block_size(&self) -> usize {
        self.last_block_size
    }

    /// Distinct blocks written so far.
    pub fn received_count(&self) -> usize {
        self.received_count
    }

    pub fn has_block(&self, sequence: usize) -> bool {
        self.received.get(sequence).copied().unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.received_count == self.block_count
    }

    /// Sequence numbers that have not arrived yet.
    pub fn missing_blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.received
            .iter()
            .enumerate()
            .filter_map(|(sequence, &present)| (!present).then_some(sequence))
    }
}

/// Turns a stream of frames into reassembled files.
///
/// One assembler serves a single consumer; it holds no locks.
pub struct FrameAssembler<F: SinkFactory> {
    geometry: Geometry,
    sampler: ColorSampler,
    checksum: Checksum,
    factory: F,
    state: AssemblerState,
    session: Option<TransferSession<F::Sink>>,
}

impl<F: SinkFactory> FrameAssembler<F> {
    /// Creates an assembler with the default classification thresholds.
    ///
    /// # Errors
    /// Returns `PxitError::InvalidGeometry` if the geometry is inconsistent.
    pub fn new(geometry: Geometry, factory: F) -> Result<Self> {
        Self::with_thresholds(geometry, Thresholds::default(), factory)
    }

    pub fn with_thresholds(geometry: Geometry, thresholds: Thresholds, factory: F) -> Result<Self> {
        Ok(Self {
            geometry,
            sampler: ColorSampler::new(geometry, thresholds)?,
            checksum: Checksum::new(),
            factory,
            state: AssemblerState::Idle,
            session: None,
        })
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// The current transfer, if any verified packet has been seen.
    pub fn session(&self) -> Option<&TransferSession<F::Sink>> {
        self.session.as_ref()
    }

    pub fn sampler(&self) -> &ColorSampler {
        &self.sampler
    }

    /// Drops the current transfer and returns to `Idle`.
    pub fn reset(&mut self) {
        self.session = None;
        self.state = AssemblerState::Idle;
    }

    /// Samples, decodes and verifies one frame, then feeds its packet to
    /// the reassembly state machine.
    ///
    /// # Errors
    /// * `PxitError::FrameSize` - the frame does not match the geometry
    /// * `PxitError::Sink` - the sink could not be opened, written or closed;
    ///   the transfer is abandoned
    pub fn process_frame(
        &mut self,
        frame: &PixelBuffer,
    ) -> Result<FrameOutcome<<F::Sink as BlockSink>::Output>> {
        match self.sampler.read_symbols(frame)? {
            Some(symbols) => self.process_packet(&symbols_to_bytes(&symbols)),
            None => {
                debug!("Frame has unclassifiable cells");
                Ok(self.corrupted())
            }
        }
    }

    /// Feeds raw packet bytes, as read off a frame, to the state machine.
    pub fn process_packet(
        &mut self,
        bytes: &[u8],
    ) -> Result<FrameOutcome<<F::Sink as BlockSink>::Output>> {
        if bytes.len() != self.geometry.packet_size || !self.checksum.verify(bytes) {
            debug!("Packet failed verification");
            return Ok(self.corrupted());
        }

        let header = PacketHeader::read(bytes);
        if header.file_length == 0 {
            debug!("Ignoring verified packet announcing an empty file");
            return Ok(FrameOutcome::Ignored);
        }

        let current = self.session.as_ref().map(|session| session.file_length);
        if current != Some(header.file_length) {
            self.start_session(header.file_length)?;
        }

        if self.state != AssemblerState::Receiving {
            return Ok(FrameOutcome::Ignored);
        }
        self.accept_block(header.sequence as usize, bytes)
    }

    fn corrupted(&self) -> FrameOutcome<<F::Sink as BlockSink>::Output> {
        match self.state {
            AssemblerState::Receiving | AssemblerState::Complete => {
                FrameOutcome::ChecksumFailedMidStream
            }
            AssemblerState::Idle | AssemblerState::Abandoned => FrameOutcome::Ignored,
        }
    }

    fn start_session(&mut self, file_length: usize) -> Result<()> {
        if let Some(previous) = self.session.take() {
            if self.state == AssemblerState::Receiving {
                warn!(
                    "File length changed to {} bytes, discarding transfer of {} bytes ({}/{} blocks)",
                    file_length,
                    previous.file_length,
                    previous.received_count,
                    previous.block_count
                );
            }
        }

        let mut session = TransferSession::new(&self.geometry, file_length);
        info!(
            "Receiving {} bytes in {} blocks",
            file_length, session.block_count
        );

        match self.factory.open(file_length) {
            Ok(sink) => {
                session.sink = Some(sink);
                self.session = Some(session);
                self.state = AssemblerState::Receiving;
                Ok(())
            }
            Err(e) => {
                self.session = Some(session);
                Err(self.abandon(e))
            }
        }
    }

    fn accept_block(
        &mut self,
        sequence: usize,
        bytes: &[u8],
    ) -> Result<FrameOutcome<<F::Sink as BlockSink>::Output>> {
        let payload_size = self.geometry.payload_size();
        let Some(session) = self.session.as_mut() else {
            return Ok(FrameOutcome::Ignored);
        };

        if sequence >= session.block_count {
            debug!(
                "Block {} out of range for {} blocks",
                sequence, session.block_count
            );
            return Ok(FrameOutcome::Ignored);
        }
        if session.received[sequence] {
            return Ok(FrameOutcome::Ignored);
        }

        let len = if sequence + 1 == session.block_count {
            session.last_block_size
        } else {
            payload_size
        };
        let offset = (sequence * payload_size) as u64;
        let written = match session.sink.as_mut() {
            Some(sink) => sink.write_at(offset, &bytes[HEADER_SIZE..HEADER_SIZE + len]),
            None => Err(io::Error::other("sink is not open")),
        };
        if let Err(e) = written {
            return Err(self.abandon(e));
        }

        session.received[sequence] = true;
        session.received_count += 1;
        debug!(
            "Accepted block {} ({}/{})",
            sequence, session.received_count, session.block_count
        );

        if !session.is_complete() {
            return Ok(FrameOutcome::BlockAccepted);
        }

        let closed = match session.sink.take() {
            Some(sink) => sink.close(),
            None => Err(io::Error::other("sink is not open")),
        };
        match closed {
            Ok(output) => {
                info!("Transfer of {} bytes complete", session.file_length);
                self.state = AssemblerState::Complete;
                Ok(FrameOutcome::TransferComplete(output))
            }
            Err(e) => Err(self.abandon(e)),
        }
    }

    fn abandon(&mut self, error: io::Error) -> PxitError {
        if let Some(session) = self.session.as_mut() {
            warn!(
                "Abandoning transfer of {} bytes: {}",
                session.file_length, error
            );
            session.sink = None;
        }
        self.state = AssemblerState::Abandoned;
        PxitError::Sink(error)
    }
}

impl<F: SinkFactory> std::fmt::Debug for FrameAssembler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAssembler")
            .field("geometry", &self.geometry)
            .field("state", &self.state)
            .field(
                "session",
                &self
                    .session
                    .as_ref()
                    .map(|s| (s.file_length, s.received_count, s.block_count)),
            )
            .finish()
    }
}
