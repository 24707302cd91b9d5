use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use style_layers::backprop::gram;
use style_layers::gradcheck::GradientChecker;
use style_layers::{Blob, Float, GramLayer, Layer, Tensor};

const EXPECTED: [f64; 18] = [
    0.247, 0.627, 1.007, 0.627, 1.807, 2.987, 1.007, 2.987, 4.967, //
    9.727, 12.507, 15.287, 12.507, 16.087, 19.667, 15.287, 19.667, 24.047,
];

fn ramp<T: Float>(shape: &[usize], step: f64) -> Blob<T> {
    let count = shape.iter().product::<usize>();
    let data = (0..count).map(|i| T::from_f64(i as f64 * step)).collect();
    Blob::new(Tensor::new(shape.to_vec(), data))
}

fn random<T: Float>(shape: &[usize], seed: u64) -> Blob<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = shape.iter().product::<usize>();
    let data = (0..count)
        .map(|_| T::from_f64(rng.random_range(-1.0..1.0)))
        .collect();
    Blob::new(Tensor::new(shape.to_vec(), data))
}

fn check_reference<T: Float>(tolerance: f64) {
    let mut layer = GramLayer::new(&style_layers::config::LayerParameter::new("Gram")).unwrap();
    assert_eq!(layer.axis(), 2);
    let bottom = ramp::<T>(&[2, 3, 4, 5], 0.01);
    let mut top = Blob::zeros(vec![0]);
    layer.setup(&bottom, &mut top).unwrap();
    layer.forward(&bottom, &mut top).unwrap();

    assert_eq!(top.shape(), &[2, 3, 3]);
    for (i, (&got, &want)) in top.value.data.iter().zip(EXPECTED.iter()).enumerate() {
        let got = got.into_f64();
        assert!(
            (got - want).abs() <= tolerance * want.abs().max(1.0),
            "top[{i}] = {got}, expected {want}"
        );
    }
}

#[test]
fn test_forward_reference_f32() {
    check_reference::<f32>(1e-4);
}

#[test]
fn test_forward_reference_f64() {
    check_reference::<f64>(1e-9);
}

#[test]
fn test_negative_axis_matches_positive() {
    let bottom = random::<f64>(&[2, 3, 4, 5], 3);
    let mut positive = GramLayer::with_axis(2).unwrap();
    let mut negative = GramLayer::with_axis(-2).unwrap();
    let mut top_pos = Blob::zeros(vec![0]);
    let mut top_neg = Blob::zeros(vec![0]);
    positive.setup(&bottom, &mut top_pos).unwrap();
    negative.setup(&bottom, &mut top_neg).unwrap();
    positive.forward(&bottom, &mut top_pos).unwrap();
    negative.forward(&bottom, &mut top_neg).unwrap();
    assert_eq!(top_pos.value, top_neg.value);
}

#[test]
fn test_output_is_symmetric_and_nonnegative_on_diagonal() {
    let bottom = random::<f64>(&[3, 4, 5, 6], 11);
    let mut layer = GramLayer::with_axis(2).unwrap();
    let mut top = Blob::zeros(vec![0]);
    layer.setup(&bottom, &mut top).unwrap();
    layer.forward(&bottom, &mut top).unwrap();
    assert_eq!(top.shape(), &[3, 4, 4]);

    for g in top.value.data.chunks_exact(16) {
        for i in 0..4 {
            assert!(g[i * 4 + i] >= 0.0);
            for j in 0..4 {
                assert_eq!(g[i * 4 + j], g[j * 4 + i]);
            }
        }
    }
}

#[test]
fn test_reshape_follows_new_input_shape() {
    let mut layer = GramLayer::with_axis(2).unwrap();
    let mut top = Blob::<f32>::zeros(vec![0]);
    layer.setup(&Blob::zeros(vec![2, 3, 4, 5]), &mut top).unwrap();
    assert_eq!(top.shape(), &[2, 3, 3]);
    layer.setup(&Blob::zeros(vec![1, 6, 7]), &mut top).unwrap();
    assert_eq!(top.shape(), &[1, 6, 6]);
    let dims = layer.dims().unwrap();
    assert_eq!((dims.groups, dims.rows, dims.features), (1, 6, 7));
}

#[test]
fn test_gradient_f64() {
    let mut layer = GramLayer::with_axis(2).unwrap();
    let mut bottom = random::<f64>(&[2, 3, 4, 5], 42);
    let mut top = Blob::zeros(vec![0]);
    GradientChecker::new(1e-2, 1e-3)
        .check_exhaustive(&mut layer, &mut bottom, &mut top)
        .unwrap();
}

#[test]
fn test_gradient_f32() {
    let mut layer = GramLayer::with_axis(2).unwrap();
    let mut bottom = random::<f32>(&[2, 3, 4, 5], 7);
    let mut top = Blob::zeros(vec![0]);
    GradientChecker::new(1e-2, 1e-3)
        .check_exhaustive(&mut layer, &mut bottom, &mut top)
        .unwrap();
}

#[test]
fn test_gradient_negative_axis() {
    let mut layer = GramLayer::with_axis(-1).unwrap();
    let mut bottom = random::<f64>(&[2, 3, 4], 5);
    let mut top = Blob::zeros(vec![0]);
    GradientChecker::new(1e-2, 1e-3)
        .check_exhaustive(&mut layer, &mut bottom, &mut top)
        .unwrap();
}

#[test]
fn test_functional_api_matches_layer() {
    let bottom = random::<f64>(&[2, 3, 4, 5], 19);
    let upstream = random::<f64>(&[2, 3, 3], 23).value;

    let (out, back) = gram(&bottom, 2).unwrap();
    let grad = back(&upstream);

    let mut layer = GramLayer::with_axis(2).unwrap();
    let mut top = Blob::zeros(vec![0]);
    layer.setup(&bottom, &mut top).unwrap();
    layer.forward(&bottom, &mut top).unwrap();
    assert_eq!(out, top.value);

    top.grad = upstream;
    let mut bottom_copy = bottom.clone();
    layer.backward(&top, true, &mut bottom_copy).unwrap();
    assert_eq!(grad, bottom_copy.grad);
    assert_eq!(grad.shape, vec![2, 3, 4, 5]);
}
