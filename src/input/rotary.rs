//! Rotary encoder quadrature decoding
//!
//! Both encoder lines interrupt on rising edges. Each handler reads both line
//! levels; a delivery whose `(A, B)` pair equals the last remembered pair is
//! bounce and ignored. When a sequence completes on `A=1, B=1`, the line that
//! raised the edge gives the direction of rotation.

use parking_lot::Mutex;

/// Encoder line that raised an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotaryLine {
    A,
    B,
}

/// Last known line levels and the pending pulse count
#[derive(Debug)]
struct RotaryState {
    a: bool,
    b: bool,
    pulses: i32,
}

/// Quadrature decoder shared between the two edge handlers and the poll loop
///
/// The lock is held only for the compare/increment or the drain, never
/// across I/O.
pub struct RotaryDecoder {
    state: Mutex<RotaryState>,
}

impl RotaryDecoder {
    /// Create a decoder assuming the encoder is at rest (both lines high)
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RotaryState {
                a: true,
                b: true,
                pulses: 0,
            }),
        }
    }

    /// Record an edge raised by `line`, with the levels read in the handler
    ///
    /// Returns true when the edge completed a detent and moved the counter.
    pub fn on_edge(&self, line: RotaryLine, a: bool, b: bool) -> bool {
        let mut state = self.state.lock();
        if state.a == a && state.b == b {
            return false;
        }
        state.a = a;
        state.b = b;

        if !(a && b) {
            return false;
        }
        match line {
            RotaryLine::B => state.pulses += 1,
            RotaryLine::A => state.pulses -= 1,
        }
        true
    }

    /// Take the accumulated pulse count, resetting it to zero atomically
    pub fn drain(&self) -> i32 {
        std::mem::take(&mut self.state.lock().pulses)
    }
}

impl Default for RotaryDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Volume delta for a drained pulse count
///
/// Quadratic so a fast turn covers more range than the same number of
/// slow detents.
pub fn volume_delta(pulses: i32) -> i32 {
    pulses.saturating_mul(pulses.saturating_abs())
}
