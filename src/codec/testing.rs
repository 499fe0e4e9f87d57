//! Deterministic codec stand-ins for unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};

use crate::codec::{Codec, Encoded};
use crate::core::{EncodeOptions, ResizeSpec};
use crate::utils::{CodecError, OutputFormat};

type SizeFn = dyn Fn(u8) -> Result<u64, CodecError> + Send + Sync;

/// Codec whose output size is a pure function of quality.
pub(crate) struct ScriptedCodec {
    sizes: Box<SizeFn>,
    calls: AtomicU32,
    qualities: Mutex<Vec<u8>>,
}

impl ScriptedCodec {
    pub fn new(sizes: impl Fn(u8) -> Result<u64, CodecError> + Send + Sync + 'static) -> Self {
        Self {
            sizes: Box::new(sizes),
            calls: AtomicU32::new(0),
            qualities: Mutex::new(Vec::new()),
        }
    }

    /// Linear size curve: `base + quality * step`.
    pub fn linear(base: u64, step: u64) -> Self {
        Self::new(move |q| Ok(base + q as u64 * step))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn qualities(&self) -> Vec<u8> {
        self.qualities.lock().clone()
    }
}

/// Piecewise-linear curve through q10=20k, q30=45k, q50=60k, q100=200k.
pub(crate) fn reference_curve(quality: u8) -> u64 {
    let q = quality as i64;
    let size = match q {
        _ if q <= 30 => 20_000 + (q - 10) * 1_250,
        _ if q <= 50 => 45_000 + (q - 30) * 750,
        _ => 60_000 + (q - 50) * 2_800,
    };
    size.max(1) as u64
}

impl Codec for ScriptedCodec {
    type Source = ();

    fn decode(&self, _data: &[u8]) -> Result<(), CodecError> {
        Ok(())
    }

    fn dimensions(&self, _source: &()) -> (u32, u32) {
        (640, 480)
    }

    fn encode(
        &self,
        _source: &(),
        resize: &ResizeSpec,
        quality: u8,
        _format: OutputFormat,
        _options: &EncodeOptions,
    ) -> Result<Encoded, CodecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.qualities.lock().push(quality);
        let size = (self.sizes)(quality)?;
        Ok(Encoded {
            bytes: vec![0; size as usize],
            dimensions: resize.target_dimensions(640, 480),
        })
    }
}

#[derive(Default)]
struct GateState {
    open: bool,
    entered: u32,
}

/// Codec whose `encode` blocks until the test opens the gate.
pub(crate) struct GatedCodec {
    inner: ScriptedCodec,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GatedCodec {
    pub fn new(inner: ScriptedCodec) -> Self {
        Self { inner, state: Mutex::new(GateState::default()), changed: Condvar::new() }
    }

    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }

    /// Blocks until `count` encode calls have reached the gate.
    pub fn wait_entered(&self, count: u32) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut state = self.state.lock();
        while state.entered < count {
            assert!(Instant::now() < deadline, "codec never reached the gate");
            self.changed.wait_for(&mut state, Duration::from_millis(50));
        }
    }

    pub fn calls(&self) -> u32 {
        self.inner.calls()
    }
}

impl Codec for GatedCodec {
    type Source = ();

    fn decode(&self, data: &[u8]) -> Result<(), CodecError> {
        self.inner.decode(data)
    }

    fn dimensions(&self, source: &()) -> (u32, u32) {
        self.inner.dimensions(source)
    }

    fn encode(
        &self,
        source: &(),
        resize: &ResizeSpec,
        quality: u8,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Encoded, CodecError> {
        {
            let mut state = self.state.lock();
            state.entered += 1;
            self.changed.notify_all();
            while !state.open {
                self.changed.wait(&mut state);
            }
        }
        self.inner.encode(source, resize, quality, format, options)
    }
}
