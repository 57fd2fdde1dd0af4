/// Sound engine: procedural 8-bit style sound effects via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    const SAMPLE_RATE: u32 = 22050;

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_flip: Arc<Vec<u8>>,
        sfx_match: Arc<Vec<u8>>,
        sfx_mismatch: Arc<Vec<u8>>,
        sfx_clear: Arc<Vec<u8>>,
        sfx_fail: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;

            let sfx_flip = Arc::new(make_wav(&gen_flip()));
            let sfx_match = Arc::new(make_wav(&gen_match()));
            let sfx_mismatch = Arc::new(make_wav(&gen_mismatch()));
            let sfx_clear = Arc::new(make_wav(&gen_clear()));
            let sfx_fail = Arc::new(make_wav(&gen_fail()));

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_flip,
                sfx_match,
                sfx_mismatch,
                sfx_clear,
                sfx_fail,
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        /// Combo-aware match chime: pitch rises with the multiplier.
        pub fn play_match_combo(&self, multiplier: u32) {
            if multiplier <= 1 {
                self.play(&self.sfx_match);
                return;
            }
            let base = 1047.0 * 1.0595_f32.powi((multiplier.min(8) - 1) as i32);
            let buf = make_wav(&gen_chime(base));
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf);
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }

        pub fn play_flip(&self) { self.play(&self.sfx_flip); }
        pub fn play_mismatch(&self) { self.play(&self.sfx_mismatch); }
        pub fn play_clear(&self) { self.play(&self.sfx_clear); }
        pub fn play_fail(&self) { self.play(&self.sfx_fail); }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators — all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    /// Card flip: short noisy snap with a descending tone
    fn gen_flip() -> Vec<f32> {
        let duration = 0.06;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut rng: u32 = 12345;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 900.0 - t * 500.0;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let tone = (ti * freq * 2.0 * std::f32::consts::PI).sin();
                // Simple LCG noise
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (1.0 - t).powf(1.2);
                (tone * 0.6 + noise * 0.4) * env * 0.2
            })
            .collect()
    }

    /// Match: quick ascending arpeggio C6→E6→G6
    fn gen_match() -> Vec<f32> {
        let notes = [1047.0_f32, 1319.0, 1568.0]; // C6, E6, G6
        let note_dur = 0.045;
        let mut samples = Vec::new();
        for &freq in &notes {
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                // Square-ish wave (sine + 3rd harmonic) for retro feel
                let wave = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.7
                    + (t * freq * 3.0 * 2.0 * std::f32::consts::PI).sin() * 0.3;
                samples.push(wave * env * 0.25);
            }
        }
        samples
    }

    /// Single bright chime at the given frequency (combo variant).
    fn gen_chime(freq: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.14) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                let wave = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.7
                    + (t * freq * 2.0 * 2.0 * std::f32::consts::PI).sin() * 0.3;
                wave * env * 0.25
            })
            .collect()
    }

    /// Mismatch: flat buzzy double thud
    fn gen_mismatch() -> Vec<f32> {
        let notes = [220.0_f32, 185.0]; // A3, F#3
        let note_dur = 0.09;
        let mut samples = Vec::new();
        for &freq in &notes {
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.5;
                // Clipped sine sounds buzzier
                let wave = ((t * freq * 2.0 * std::f32::consts::PI).sin() * 1.8)
                    .clamp(-1.0, 1.0);
                samples.push(wave * env * 0.22);
            }
        }
        samples
    }

    /// Level clear: victory ascending fanfare
    fn gen_clear() -> Vec<f32> {
        let notes = [523.0_f32, 659.0, 784.0, 1047.0]; // C5→E5→G5→C6
        let note_dur = 0.1;
        let mut samples = Vec::new();
        for &freq in &notes {
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.3;
                let wave = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.6
                    + (t * freq * 2.0 * 2.0 * std::f32::consts::PI).sin() * 0.3
                    + (t * freq * 3.0 * 2.0 * std::f32::consts::PI).sin() * 0.1;
                samples.push(wave * env * 0.3);
            }
        }
        // Sustain the last note
        let last_freq = 1047.0_f32;
        let n = (SAMPLE_RATE as f32 * 0.25) as usize;
        for i in 0..n {
            let t = i as f32 / SAMPLE_RATE as f32;
            let env = 1.0 - (i as f32 / n as f32);
            let wave = (t * last_freq * 2.0 * std::f32::consts::PI).sin();
            samples.push(wave * env * 0.3);
        }
        samples
    }

    /// Time up: sad descending tone
    fn gen_fail() -> Vec<f32> {
        let notes = [440.0_f32, 370.0, 311.0, 261.0]; // A4→F#4→Eb4→C4
        let note_dur = 0.12;
        let mut samples = Vec::new();
        for &freq in &notes {
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.3;
                let wave = (t * freq * 2.0 * std::f32::consts::PI).sin();
                samples.push(wave * env * 0.3);
            }
        }
        // Final fade
        let fade_len = samples.len() / 4;
        let total = samples.len();
        for i in (total - fade_len)..total {
            let ratio = (total - i) as f32 / fade_len as f32;
            samples[i] *= ratio;
        }
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder — wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2; // 16-bit = 2 bytes per sample
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        // fmt chunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        // data chunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let clamped = s.max(-1.0).min(1.0);
            let val = (clamped * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }
}

// ════════════════════════════════════════════════════════════
//  Public API — compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_match_combo(&self, _multiplier: u32) {}
    pub fn play_flip(&self) {}
    pub fn play_mismatch(&self) {}
    pub fn play_clear(&self) {}
    pub fn play_fail(&self) {}
}
