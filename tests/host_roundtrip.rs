#![cfg(feature = "host")]

use std::f64::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stridefft::config::HostConfig;
use stridefft::host::{HostBackend, HostBuffer, HostContext, HostQueue};
use stridefft::{
    ArrayDescriptor, BackendError, Callback, CallbackPhase, Complex32, Complex64, DType, Fft,
    FftError, FftOptions, TransformKind,
};

const SINGLE_TOL: f32 = 1e-3;
const DOUBLE_TOL: f64 = 1e-8;

fn backend() -> Arc<HostBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(
        HostBackend::with_config(HostConfig {
            threads: 2,
            debug: true,
        })
        .unwrap(),
    )
}

fn random_c32(rng: &mut StdRng, n: usize) -> Vec<Complex32> {
    (0..n)
        .map(|_| Complex32::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

fn random_c64(rng: &mut StdRng, n: usize) -> Vec<Complex64> {
    (0..n)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

/// Naive DFT over every axis of a row-major block.
fn naive_dft(data: &[Complex64], shape: &[usize]) -> Vec<Complex64> {
    let total: usize = shape.iter().product();
    let unravel = |mut i: usize| {
        let mut idx = vec![0usize; shape.len()];
        for (k, &n) in idx.iter_mut().zip(shape).rev() {
            *k = i % n;
            i /= n;
        }
        idx
    };
    (0..total)
        .map(|k| {
            let ki = unravel(k);
            let (mut re, mut im) = (0.0, 0.0);
            for (j, x) in data.iter().enumerate() {
                let ji = unravel(j);
                let phase: f64 = ki
                    .iter()
                    .zip(&ji)
                    .zip(shape)
                    .map(|((&a, &b), &n)| (a * b) as f64 / n as f64)
                    .sum();
                let (s, c) = (-2.0 * PI * phase).sin_cos();
                re += x.re * c - x.im * s;
                im += x.re * s + x.im * c;
            }
            Complex64::new(re, im)
        })
        .collect()
}

fn assert_close32(a: &[Complex32], b: &[Complex32], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!(
            (x.re - y.re).abs() < tol && (x.im - y.im).abs() < tol,
            "element {i}: {x:?} vs {y:?}"
        );
    }
}

fn assert_close64(a: &[Complex64], b: &[Complex64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!(
            (x.re - y.re).abs() < tol && (x.im - y.im).abs() < tol,
            "element {i}: {x:?} vs {y:?}"
        );
    }
}

fn complex_roundtrip(shape: &[usize], axes: &[isize]) {
    let mut rng = StdRng::seed_from_u64(7);
    let n: usize = shape.iter().product();
    let original = random_c32(&mut rng, n);
    let input = HostBuffer::from_complex32(&original);
    let spectrum = HostBuffer::zeroed(n * 8);
    let restored = HostBuffer::zeroed(n * 8);
    let desc = |buf: &HostBuffer| {
        ArrayDescriptor::contiguous(buf.clone(), shape.to_vec(), DType::Complex64).unwrap()
    };

    let fft = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        desc(&input),
        Some(desc(&spectrum)),
        FftOptions::new().axes(axes),
    )
    .unwrap();
    assert_eq!(fft.plan().kind(), TransformKind::ComplexToComplex);
    assert_eq!(fft.plan().batch_size(), shape[0]);
    let events = fft.enqueue(true, &[]).unwrap();
    assert!(events.iter().all(|e| e.is_complete()));
    fft.enqueue_arrays(Some(&desc(&spectrum)), Some(&desc(&restored)), false, &events)
        .unwrap();

    assert_close32(&restored.to_complex32_vec(), &original, SINGLE_TOL);
    assert_eq!(input.to_complex32_vec(), original);
}

/// Four 1024x1024 images transformed along their last two axes and back.
#[test]
#[cfg_attr(debug_assertions, ignore = "large transform, run with --release")]
fn complex_batch_roundtrip_large() {
    complex_roundtrip(&[4, 1024, 1024], &[1, 2]);
}

#[test]
fn complex_batch_roundtrip_small() {
    complex_roundtrip(&[4, 64, 48], &[1, 2]);
}

/// Mixed power-of-two and Bluestein lengths agree with a naive DFT.
#[test]
fn complex_matches_naive_dft() {
    let mut rng = StdRng::seed_from_u64(11);
    let shape = [3, 5, 4];
    let values = random_c64(&mut rng, 60);
    let buf = HostBuffer::from_complex64(&values);
    let data = ArrayDescriptor::contiguous(buf.clone(), shape.to_vec(), DType::Complex128).unwrap();
    let fft = Fft::new(backend(), &HostContext, HostQueue, data, None, FftOptions::new()).unwrap();
    assert!(fft.plan().in_place());
    fft.enqueue(true, &[]).unwrap();
    assert_close64(&buf.to_complex64_vec(), &naive_dft(&values, &shape), 1e-9);
}

fn real_roundtrip_f32(rows: usize, n: usize) {
    let mut rng = StdRng::seed_from_u64(3);
    let original: Vec<f32> = (0..rows * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let h = n / 2 + 1;
    let real = HostBuffer::from_f32(&original);
    let spectrum = HostBuffer::zeroed(rows * h * 8);
    let restored = HostBuffer::zeroed(rows * n * 4);
    let real_desc = |b: &HostBuffer| {
        ArrayDescriptor::contiguous(b.clone(), vec![rows, n], DType::Real32).unwrap()
    };
    let spec_desc =
        ArrayDescriptor::contiguous(spectrum.clone(), vec![rows, h], DType::Complex64).unwrap();

    let forward = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        real_desc(&real),
        Some(spec_desc.clone()),
        FftOptions::new().axes(&[1]),
    )
    .unwrap();
    assert_eq!(forward.plan().kind(), TransformKind::RealToComplex);
    assert!(forward.plan().real_inferred());
    forward.enqueue(true, &[]).unwrap();

    let bins = spectrum.to_complex32_vec();
    for r in 0..rows {
        let row: Vec<Complex64> = original[r * n..(r + 1) * n]
            .iter()
            .map(|&x| Complex64::new(x as f64, 0.0))
            .collect();
        let expected = naive_dft(&row, &[n]);
        for k in 0..h {
            let got = bins[r * h + k];
            assert!((got.re as f64 - expected[k].re).abs() < 1e-3);
            assert!((got.im as f64 - expected[k].im).abs() < 1e-3);
        }
    }

    let inverse = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        spec_desc,
        Some(real_desc(&restored)),
        FftOptions::new().axes(&[1]),
    )
    .unwrap();
    assert_eq!(inverse.plan().kind(), TransformKind::ComplexToReal);
    inverse.enqueue(false, &[]).unwrap();
    for (a, b) in restored.to_f32_vec().iter().zip(&original) {
        assert!((a - b).abs() < SINGLE_TOL, "{a} vs {b}");
    }
}

#[test]
fn real_roundtrip_single_even() {
    real_roundtrip_f32(5, 16);
}

#[test]
fn real_roundtrip_single_odd() {
    real_roundtrip_f32(3, 15);
}

/// Double-precision real transform over both axes of a 2-D array.
#[test]
fn real_roundtrip_double_2d() {
    let mut rng = StdRng::seed_from_u64(5);
    let (rows, cols) = (6, 10);
    let original: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let real = HostBuffer::from_f64(&original);
    let spectrum = HostBuffer::zeroed(rows * 6 * 16);
    let restored = HostBuffer::zeroed(rows * cols * 8);
    let spec_desc =
        ArrayDescriptor::contiguous(spectrum.clone(), vec![rows, 6], DType::Complex128).unwrap();

    let forward = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        ArrayDescriptor::contiguous(real, vec![rows, cols], DType::Real64).unwrap(),
        Some(spec_desc.clone()),
        FftOptions::new(),
    )
    .unwrap();
    assert_eq!(forward.plan().transform_axes(), &[1, 0]);
    forward.enqueue(true, &[]).unwrap();

    let full: Vec<Complex64> = original.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let expected = naive_dft(&full, &[rows, cols]);
    let bins = spectrum.to_complex64_vec();
    for r in 0..rows {
        for k in 0..6 {
            let (got, want) = (bins[r * 6 + k], expected[r * cols + k]);
            assert!((got.re - want.re).abs() < 1e-9 && (got.im - want.im).abs() < 1e-9);
        }
    }

    let inverse = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        spec_desc,
        Some(ArrayDescriptor::contiguous(restored.clone(), vec![rows, cols], DType::Real64).unwrap()),
        FftOptions::new(),
    )
    .unwrap();
    inverse.enqueue(false, &[]).unwrap();
    for (a, b) in restored.to_f64_vec().iter().zip(&original) {
        assert!((a - b).abs() < DOUBLE_TOL, "{a} vs {b}");
    }
}

/// Rows of 6 reals padded to 8 transform in place and back.
#[test]
fn real_in_place_padded_roundtrip() {
    let (rows, n, pitch) = (3, 6, 8);
    let mut rng = StdRng::seed_from_u64(13);
    let mut padded = vec![0.0f64; rows * pitch];
    for r in 0..rows {
        for c in 0..n {
            padded[r * pitch + c] = rng.gen_range(-1.0..1.0);
        }
    }
    let buf = HostBuffer::from_f64(&padded);
    let real = ArrayDescriptor::new(
        buf.clone(),
        vec![rows, n],
        vec![(pitch * 8) as isize, 8],
        DType::Real64,
    )
    .unwrap();
    let forward = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        real,
        None,
        FftOptions::new().axes(&[1]),
    )
    .unwrap();
    assert!(forward.plan().in_place());
    assert_eq!(forward.plan().output_shape(), &[rows, 4]);
    forward.enqueue(true, &[]).unwrap();

    let bins = buf.to_complex64_vec();
    for r in 0..rows {
        let row: Vec<Complex64> = padded[r * pitch..r * pitch + n]
            .iter()
            .map(|&x| Complex64::new(x, 0.0))
            .collect();
        assert_close64(&bins[r * 4..r * 4 + 4], &naive_dft(&row, &[n])[..4], 1e-9);
    }

    let complex = ArrayDescriptor::new(buf.clone(), vec![rows, 4], vec![64, 16], DType::Complex128)
        .unwrap();
    let inverse = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        complex,
        None,
        FftOptions::new().axes(&[1]).real(true).fft_shape(&[rows, n]),
    )
    .unwrap();
    assert_eq!(inverse.plan().kind(), TransformKind::ComplexToReal);
    inverse.enqueue(false, &[]).unwrap();
    let restored = buf.to_f64_vec();
    for r in 0..rows {
        for c in 0..n {
            let (a, b) = (restored[r * pitch + c], padded[r * pitch + c]);
            assert!((a - b).abs() < DOUBLE_TOL, "row {r} col {c}: {a} vs {b}");
        }
    }
}

/// A single unpadded line has no room for its hermitian bins.
#[test]
fn real_in_place_single_line_capacity() {
    let short = HostBuffer::from_f64(&[0.0; 6]);
    let desc = ArrayDescriptor::contiguous(short, vec![6], DType::Real64).unwrap();
    let err = Fft::new(backend(), &HostContext, HostQueue, desc, None, FftOptions::new())
        .err()
        .unwrap();
    assert_eq!(
        err,
        FftError::InsufficientPadding {
            found: 6,
            required: 8
        }
    );

    let roomy = HostBuffer::from_f64(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let desc = ArrayDescriptor::contiguous(roomy.clone(), vec![6], DType::Real64).unwrap();
    let fft = Fft::new(backend(), &HostContext, HostQueue, desc, None, FftOptions::new()).unwrap();
    fft.enqueue(true, &[]).unwrap();
    for bin in roomy.to_complex64_vec() {
        assert!((bin.re - 1.0).abs() < DOUBLE_TOL && bin.im.abs() < DOUBLE_TOL);
    }
}

/// Arrays starting partway into their buffer leave the prefix untouched.
#[test]
fn offset_views() {
    let mut rng = StdRng::seed_from_u64(17);
    let values = random_c64(&mut rng, 24);
    let buf = HostBuffer::from_complex64(&values);
    let data = ArrayDescriptor::contiguous(buf.clone(), vec![16], DType::Complex128)
        .unwrap()
        .with_offset(8 * 16);
    let fft = Fft::new(backend(), &HostContext, HostQueue, data, None, FftOptions::new()).unwrap();
    fft.enqueue(true, &[]).unwrap();
    let after = buf.to_complex64_vec();
    assert_eq!(&after[..8], &values[..8]);
    assert_close64(&after[8..], &naive_dft(&values[8..], &[16]), 1e-9);
}

/// A plan runs on other buffers with the same layout, and refuses others.
#[test]
fn enqueue_on_other_arrays() {
    let mut rng = StdRng::seed_from_u64(19);
    let first = random_c32(&mut rng, 32);
    let second = random_c32(&mut rng, 32);
    let desc = |b: &HostBuffer| {
        ArrayDescriptor::contiguous(b.clone(), vec![4, 8], DType::Complex64).unwrap()
    };
    let (a, b) = (HostBuffer::from_complex32(&first), HostBuffer::from_complex32(&second));
    let (out_a, out_b) = (HostBuffer::zeroed(256), HostBuffer::zeroed(256));
    let fft = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        desc(&a),
        Some(desc(&out_a)),
        FftOptions::new().axes(&[-1]),
    )
    .unwrap();
    fft.enqueue(true, &[]).unwrap();
    fft.enqueue_arrays(Some(&desc(&b)), Some(&desc(&out_b)), true, &[])
        .unwrap();
    let widen = |v: &[Complex32]| -> Vec<Complex64> {
        v.iter().map(|c| Complex64::new(c.re as f64, c.im as f64)).collect()
    };
    for (src, out) in [(&first, &out_a), (&second, &out_b)] {
        let got = widen(&out.to_complex32_vec());
        for r in 0..4 {
            let want = naive_dft(&widen(&src[r * 8..r * 8 + 8]), &[8]);
            assert_close64(&got[r * 8..r * 8 + 8], &want, 1e-4);
        }
    }

    let wrong = ArrayDescriptor::contiguous(b.clone(), vec![8, 4], DType::Complex64).unwrap();
    assert_eq!(
        fft.enqueue_arrays(Some(&wrong), None, true, &[]).err(),
        Some(FftError::ArrayMismatch {
            array: "data",
            field: "shape"
        })
    );
    let transposed =
        ArrayDescriptor::new(out_b.clone(), vec![4, 8], vec![8, 32], DType::Complex64).unwrap();
    assert_eq!(
        fft.enqueue_arrays(None, Some(&transposed), true, &[]).err(),
        Some(FftError::ArrayMismatch {
            array: "result",
            field: "strides"
        })
    );
}

#[test]
fn custom_scales() {
    let buf = HostBuffer::from_complex64(&[Complex64::new(1.0, 0.0); 4]);
    let data = ArrayDescriptor::contiguous(buf.clone(), vec![4], DType::Complex128).unwrap();
    let fft = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        data,
        None,
        FftOptions::new().scale_forward(0.5).scale_backward(1.0),
    )
    .unwrap();
    fft.enqueue(true, &[]).unwrap();
    let mut impulse = [Complex64::new(0.0, 0.0); 4];
    impulse[0] = Complex64::new(2.0, 0.0);
    assert_close64(&buf.to_complex64_vec(), &impulse, 1e-12);
    // Unnormalized inverse spreads the single bin back over every sample.
    fft.enqueue(false, &[]).unwrap();
    assert_close64(&buf.to_complex64_vec(), &[Complex64::new(2.0, 0.0); 4], 1e-12);
}

/// Kernel callbacks need a device compiler, which the host backend lacks.
#[test]
fn host_rejects_callbacks() {
    let buf = HostBuffer::zeroed(64);
    let data = ArrayDescriptor::contiguous(buf, vec![8], DType::Complex64).unwrap();
    let backend = backend();
    let err = Fft::new(
        backend.clone(),
        &HostContext,
        HostQueue,
        data,
        None,
        FftOptions::new().callback(Callback::new("pre", "float2 pre() {}", CallbackPhase::Pre)),
    )
    .err()
    .unwrap();
    assert!(matches!(err, FftError::Backend(BackendError::Unsupported(_))));
    assert_eq!(backend.live_plans(), 0);
}

/// Real plans run in their own direction only.
#[test]
fn real_plans_refuse_the_other_direction() {
    let values = [1.0f32, 2.0, 3.0, 4.0];
    let real = HostBuffer::from_f32(&values);
    let spectrum = HostBuffer::zeroed(3 * 8);
    let fft = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        ArrayDescriptor::contiguous(real.clone(), vec![4], DType::Real32).unwrap(),
        Some(ArrayDescriptor::contiguous(spectrum.clone(), vec![3], DType::Complex64).unwrap()),
        FftOptions::new(),
    )
    .unwrap();
    assert!(matches!(
        fft.enqueue(false, &[]),
        Err(FftError::Backend(BackendError::Unsupported(_)))
    ));
    assert_eq!(spectrum.to_complex32_vec(), vec![Complex32::new(0.0, 0.0); 3]);

    let restored = HostBuffer::zeroed(4 * 4);
    let inverse = Fft::new(
        backend(),
        &HostContext,
        HostQueue,
        ArrayDescriptor::contiguous(spectrum, vec![3], DType::Complex64).unwrap(),
        Some(ArrayDescriptor::contiguous(restored.clone(), vec![4], DType::Real32).unwrap()),
        FftOptions::new(),
    )
    .unwrap();
    assert!(matches!(
        inverse.enqueue(true, &[]),
        Err(FftError::Backend(BackendError::Unsupported(_)))
    ));
    assert_eq!(restored.to_f32_vec(), vec![0.0; 4]);
    assert_eq!(real.to_f32_vec(), values);
}

#[test]
fn plans_release_on_drop() {
    let backend = backend();
    let buf = HostBuffer::zeroed(64);
    let data = ArrayDescriptor::contiguous(buf, vec![8], DType::Complex64).unwrap();
    let fft = Fft::new(backend.clone(), &HostContext, HostQueue, data, None, FftOptions::new())
        .unwrap();
    assert_eq!(backend.live_plans(), 1);
    drop(fft);
    assert_eq!(backend.live_plans(), 0);
}

/// The shared backend lives while a plan holds it and is rebuilt afterwards.
#[test]
fn shared_backend_lifecycle() {
    let a = HostBackend::shared().unwrap();
    let b = HostBackend::shared().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    let data = ArrayDescriptor::contiguous(HostBuffer::zeroed(64), vec![8], DType::Complex64)
        .unwrap();
    let fft = Fft::new(a, &HostContext, HostQueue, data, None, FftOptions::new()).unwrap();
    drop(b);
    assert!(HostBackend::shared_is_live());
    drop(fft);
    assert!(!HostBackend::shared_is_live());
    let _again = HostBackend::shared().unwrap();
    assert!(HostBackend::shared_is_live());
}
