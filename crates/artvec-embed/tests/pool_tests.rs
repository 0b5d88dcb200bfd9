use candle_core::{Device, Tensor};
use artvec_embed::l2_normalize;
use artvec_embed::pool::rows_to_vecs;

#[test]
fn l2_normalize_rows() {
    let dev = Device::Cpu;
    let t = Tensor::from_slice(&[3.0f32, 4.0, 0.0, 0.0,   // row 0
                                 1.0, 2.0, 3.0, 4.0],     // row 1
                               (2, 4), &dev).unwrap();
    let out = rows_to_vecs(&l2_normalize(&t).unwrap()).unwrap();

    let expected0 = [0.6f32, 0.8, 0.0, 0.0];
    for (a, b) in out[0].iter().cloned().zip(expected0) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
    let norm1: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected1 = [1.0 / norm1, 2.0 / norm1, 3.0 / norm1, 4.0 / norm1];
    for (a, b) in out[1].iter().cloned().zip(expected1) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn l2_normalize_rejects_wrong_rank() {
    let t = Tensor::zeros((1, 2, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
    assert!(l2_normalize(&t).is_err());
}
