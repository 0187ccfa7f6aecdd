// Mel-frequency cepstral coefficients
// Slaney mel filterbank over a power spectrum, dB compression, orthonormal DCT-II

/// Coefficients reported per segment
pub const N_MFCC: usize = 13;

/// Triangular mel filters spanning 0 Hz to Nyquist
const N_MELS: usize = 40;

/// Power floor before the dB conversion, so silence stays finite
const POWER_FLOOR: f32 = 1e-10;

/// Precomputed filterbank and DCT basis for one FFT size and sample rate
///
/// Built once per extractor and shared read-only across rayon workers.
pub struct MfccBank {
    /// Row per FFT bin, column per mel filter
    filters: Vec<[f32; N_MELS]>,

    /// Row per coefficient, column per mel filter
    dct: Vec<[f32; N_MELS]>,
}

impl MfccBank {
    pub fn new(bin_count: usize, sample_rate: u32) -> Self {
        MfccBank {
            filters: mel_filter_bank(bin_count, sample_rate as f64 / 2.0),
            dct: dct_basis(),
        }
    }

    /// Cepstral coefficients of one frame's power spectrum
    ///
    /// `power` must have the bin count the bank was built for; extra bins are
    /// ignored and missing ones count as zero.
    pub fn coefficients(&self, power: &[f32]) -> [f32; N_MFCC] {
        let mut mel = [0.0f32; N_MELS];
        for (row, &p) in self.filters.iter().zip(power.iter()) {
            for (acc, &w) in mel.iter_mut().zip(row.iter()) {
                *acc += w * p;
            }
        }

        let log_mel = mel.map(|m| 10.0 * m.max(POWER_FLOOR).log10());

        let mut out = [0.0f32; N_MFCC];
        for (coef, basis) in out.iter_mut().zip(self.dct.iter()) {
            *coef = basis.iter().zip(log_mel.iter()).map(|(b, m)| b * m).sum();
        }
        out
    }
}

fn hertz_to_mel_slaney(freq: f64) -> f64 {
    let min_log_hertz = 1000.0;
    let min_log_mel = 15.0;
    let logstep = 27.0 / 6.4_f64.ln();
    if freq >= min_log_hertz {
        min_log_mel + (freq / min_log_hertz).ln() * logstep
    } else {
        3.0 * freq / 200.0
    }
}

fn mel_to_hertz_slaney(mels: f64) -> f64 {
    let min_log_hertz = 1000.0;
    let min_log_mel = 15.0;
    let logstep = 6.4_f64.ln() / 27.0;
    if mels >= min_log_mel {
        min_log_hertz * (logstep * (mels - min_log_mel)).exp()
    } else {
        200.0 * mels / 3.0
    }
}

/// Area-normalized triangular filters, evenly spaced on the Slaney mel scale
fn mel_filter_bank(bin_count: usize, nyquist: f64) -> Vec<[f32; N_MELS]> {
    let mel_max = hertz_to_mel_slaney(nyquist);
    let edges: Vec<f64> = (0..N_MELS + 2)
        .map(|i| mel_to_hertz_slaney(mel_max * i as f64 / (N_MELS + 1) as f64))
        .collect();

    let bin_freq = |i: usize| {
        if bin_count > 1 {
            nyquist * i as f64 / (bin_count - 1) as f64
        } else {
            0.0
        }
    };

    (0..bin_count)
        .map(|bin| {
            let freq = bin_freq(bin);
            let mut row = [0.0f32; N_MELS];
            for (m, w) in row.iter_mut().enumerate() {
                let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
                let down = (freq - left) / (center - left);
                let up = (right - freq) / (right - center);
                let enorm = 2.0 / (right - left);
                *w = (down.min(up).max(0.0) * enorm) as f32;
            }
            row
        })
        .collect()
}

/// Orthonormal DCT-II rows for the first N_MFCC coefficients
fn dct_basis() -> Vec<[f32; N_MELS]> {
    let n = N_MELS as f64;
    (0..N_MFCC)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            let mut row = [0.0f32; N_MELS];
            for (i, b) in row.iter_mut().enumerate() {
                let angle = std::f64::consts::PI * k as f64 * (i as f64 + 0.5) / n;
                *b = (scale * angle.cos()) as f32;
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_conversion_roundtrip() {
        for freq in [0.0, 440.0, 1000.0, 8000.0] {
            let back = mel_to_hertz_slaney(hertz_to_mel_slaney(freq));
            assert!((back - freq).abs() < 1e-6, "{} -> {}", freq, back);
        }
    }

    #[test]
    fn test_flat_log_spectrum_has_only_c0() {
        let bank = MfccBank::new(1025, 44100);
        let coefs = bank.coefficients(&vec![0.0; 1025]);

        // Every mel band sits on the floor (-100 dB)
        let expected_c0 = -100.0 * (N_MELS as f32).sqrt();
        assert!((coefs[0] - expected_c0).abs() < 1e-2, "c0 {}", coefs[0]);
        assert!(coefs[1..].iter().all(|c| c.abs() < 1e-2));
    }

    #[test]
    fn test_filters_cover_the_spectrum() {
        let filters = mel_filter_bank(1025, 22050.0);
        for m in 0..N_MELS {
            assert!(filters.iter().any(|row| row[m] > 0.0), "empty filter {}", m);
        }
    }

    #[test]
    fn test_low_energy_raises_c1() {
        let bank = MfccBank::new(1025, 44100);
        let mut low = vec![0.0f32; 1025];
        let mut high = vec![0.0f32; 1025];
        low[..40].iter_mut().for_each(|p| *p = 1.0);
        high[600..].iter_mut().for_each(|p| *p = 1.0);

        assert!(bank.coefficients(&low)[1] > bank.coefficients(&high)[1]);
    }
}
