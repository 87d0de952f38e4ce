//! Scalar FFT kernels with cached twiddle tables.
//!
//! A [`FftPlanner`] caches per-stage twiddle factors and Bluestein chirps so
//! repeated transforms of the same length reuse them. Power-of-two lengths
//! run an iterative radix-2 Cooley–Tukey pass; every other length goes
//! through Bluestein's chirp-z convolution on the next power of two.
//!
//! Inverse transforms are unnormalized; callers apply their own scale.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::num::{Complex, Float};

type BluesteinPair<T> = (Arc<[Complex<T>]>, Arc<[Complex<T>]>);

/// `exp(-2πi * k / n)` evaluated in double precision and narrowed to `T`.
fn unit_root<T: Float>(k: u64, n: u64) -> Complex<T> {
    let angle = -2.0 * core::f64::consts::PI * (k as f64) / (n as f64);
    let (sin, cos) = libm::sincos(angle);
    Complex::new(T::from_f64(cos), T::from_f64(sin))
}

pub struct FftPlanner<T: Float> {
    /// Twiddle tables keyed by butterfly size `len`; each holds `len/2`
    /// factors `exp(-2πi k / len)`.
    cache: HashMap<usize, Arc<[Complex<T>]>>,
    /// Chirp and transformed convolution kernel keyed by transform length.
    bluestein_cache: HashMap<usize, BluesteinPair<T>>,
}

impl<T: Float> Default for FftPlanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> FftPlanner<T> {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            bluestein_cache: HashMap::new(),
        }
    }

    /// Retrieve the twiddle table for stage size `n` (length `n/2`).
    pub fn get_twiddles(&mut self, n: usize) -> Arc<[Complex<T>]> {
        Arc::clone(self.cache.entry(n).or_insert_with(|| {
            let table: Vec<Complex<T>> = (0..n / 2)
                .map(|k| unit_root(k as u64, n as u64))
                .collect();
            Arc::from(table)
        }))
    }

    fn get_bluestein(&mut self, n: usize) -> BluesteinPair<T> {
        if let Some((chirp, kernel)) = self.bluestein_cache.get(&n) {
            return (Arc::clone(chirp), Arc::clone(kernel));
        }
        let m = (2 * n - 1).next_power_of_two();
        let two_n = 2 * n as u64;
        // exp(-iπ k²/n) == exp(-2πi (k² mod 2n) / 2n)
        let chirp: Vec<Complex<T>> = (0..n as u64)
            .map(|k| unit_root((k * k) % two_n, two_n))
            .collect();
        let mut kernel = vec![Complex::zero(); m];
        for (i, c) in chirp.iter().enumerate() {
            kernel[i] = c.conj();
            if i > 0 {
                kernel[m - i] = c.conj();
            }
        }
        self.radix2(&mut kernel);
        let pair: BluesteinPair<T> = (Arc::from(chirp), Arc::from(kernel));
        self.bluestein_cache
            .insert(n, (Arc::clone(&pair.0), Arc::clone(&pair.1)));
        pair
    }

    /// In-place iterative radix-2 transform. `data.len()` must be a power of two.
    fn radix2(&mut self, data: &mut [Complex<T>]) {
        let n = data.len();
        if n < 2 {
            return;
        }
        let bits = n.trailing_zeros();
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - bits);
            if j > i {
                data.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let twiddles = self.get_twiddles(len);
            let half = len / 2;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let a = data[start + k];
                    let b = data[start + k + half] * twiddles[k];
                    data[start + k] = a + b;
                    data[start + k + half] = a - b;
                }
            }
            len <<= 1;
        }
    }

    fn bluestein(&mut self, data: &mut [Complex<T>]) {
        let n = data.len();
        let (chirp, kernel) = self.get_bluestein(n);
        let m = kernel.len();
        let mut work = vec![Complex::zero(); m];
        for (w, (x, c)) in work.iter_mut().zip(data.iter().zip(chirp.iter())) {
            *w = *x * *c;
        }
        self.radix2(&mut work);
        for (w, k) in work.iter_mut().zip(kernel.iter()) {
            *w = (*w * *k).conj();
        }
        self.radix2(&mut work);
        let inv_m = T::from_f64(1.0 / m as f64);
        for (x, (w, c)) in data.iter_mut().zip(work.iter().zip(chirp.iter())) {
            *x = w.conj().scale(inv_m) * *c;
        }
    }

    /// Forward transform of one contiguous line.
    pub fn fft(&mut self, data: &mut [Complex<T>]) {
        match data.len() {
            0 | 1 => {}
            n if n.is_power_of_two() => self.radix2(data),
            _ => self.bluestein(data),
        }
    }

    /// Unnormalized inverse transform of one contiguous line.
    pub fn ifft(&mut self, data: &mut [Complex<T>]) {
        for x in data.iter_mut() {
            *x = x.conj();
        }
        self.fft(data);
        for x in data.iter_mut() {
            *x = x.conj();
        }
    }

    /// Transform every axis of a packed N-dimensional block whose first
    /// axis varies fastest.
    pub fn fft_nd(&mut self, data: &mut [Complex<T>], shape: &[usize], inverse: bool) {
        let total = data.len();
        let mut stride = 1;
        let mut line = Vec::new();
        for &n in shape {
            if n > 1 {
                line.resize(n, Complex::zero());
                let block = stride * n;
                for outer in (0..total).step_by(block) {
                    for inner in 0..stride {
                        let base = outer + inner;
                        for (i, v) in line.iter_mut().enumerate() {
                            *v = data[base + i * stride];
                        }
                        if inverse {
                            self.ifft(&mut line);
                        } else {
                            self.fft(&mut line);
                        }
                        for (i, v) in line.iter().enumerate() {
                            data[base + i * stride] = *v;
                        }
                    }
                }
            }
            stride *= n;
        }
    }
}
