//! Segmented request stack for circular dependency detection.

use smallvec::SmallVec;

use crate::registration::RegistrationId;

/// One in-flight request frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub(crate) registration: RegistrationId,
    pub(crate) service: &'static str,
}

/// The resolve operation's request stack, divided into segments.
///
/// Cycle and depth checks only look at frames in the current segment, so a
/// collaborator that legitimately resolves the same registration repeatedly
/// (resolving every implementation of a service, applying decorators) opens
/// a fresh segment around each nested resolution instead of tripping the
/// detector. Depth counts the whole stack; a runaway graph is runaway no
/// matter how it is segmented.
#[derive(Default)]
pub(crate) struct SegmentedStack {
    frames: SmallVec<[Frame; 8]>,
    // Start index of each open segment; the active segment begins at the
    // last entry (or 0 when none are open).
    bases: SmallVec<[usize; 2]>,
}

impl SegmentedStack {
    /// Total frames across all segments.
    #[inline(always)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn segment_start(&self) -> usize {
        self.bases.last().copied().unwrap_or(0)
    }

    /// True if `registration` already has a frame in the current segment.
    pub(crate) fn contains(&self, registration: RegistrationId) -> bool {
        self.frames[self.segment_start()..]
            .iter()
            .any(|f| f.registration == registration)
    }

    pub(crate) fn push(&mut self, registration: RegistrationId, service: &'static str) {
        self.frames.push(Frame { registration, service });
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        debug_assert!(self.frames.len() > self.segment_start());
        self.frames.pop()
    }

    /// Renders the request chain in the current segment, ending with a
    /// repeat of `registration`'s first frame to close the cycle visually.
    pub(crate) fn cycle_chain(&self, registration: RegistrationId) -> Vec<&'static str> {
        let segment = &self.frames[self.segment_start()..];
        let start = segment
            .iter()
            .position(|f| f.registration == registration)
            .unwrap_or(0);
        let mut chain: Vec<&'static str> = segment[start..].iter().map(|f| f.service).collect();
        if let Some(first) = chain.first().copied() {
            chain.push(first);
        }
        chain
    }

    /// The full request chain, for depth-limit diagnostics.
    pub(crate) fn full_chain(&self) -> Vec<&'static str> {
        self.frames.iter().map(|f| f.service).collect()
    }

    /// Opens a segment at the current top of stack.
    pub(crate) fn enter_segment(&mut self) {
        self.bases.push(self.frames.len());
    }

    /// Closes the innermost segment. The caller must have popped every frame
    /// it pushed inside the segment; anything else is a bookkeeping defect.
    pub(crate) fn exit_segment(&mut self) {
        let base = self
            .bases
            .pop()
            .unwrap_or_else(|| panic!("exit_segment without matching enter_segment"));
        assert!(
            self.frames.len() == base,
            "segment exited with {} frame(s) still in flight",
            self.frames.len() - base
        );
    }
}
