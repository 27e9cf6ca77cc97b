//! Integration tests for the wrap protocol on user-defined entities.

use adtensors::autodiff::{
    DiffOptions, Differentiable, Differentiator, TrackedTensor, WrapFn, check_structure,
    reverse_derivative,
};
use adtensors::{Shape, Tensor, TensorError, differentiable};

#[derive(Debug, Clone)]
struct Affine {
    weight: TrackedTensor,
    bias: TrackedTensor,
}

differentiable!(Affine { weight, bias });

#[derive(Debug, Clone)]
struct Mlp {
    layers: Vec<Affine>,
    scale: Option<TrackedTensor>,
    name: String,
    steps: usize,
}

differentiable!(Mlp { layers, scale } keep { name, steps });

fn affine(rows: usize, cols: usize, fill: f64) -> Affine {
    Affine {
        weight: Tensor::full([rows, cols], fill).into(),
        bias: Tensor::zeros([rows, 1]).into(),
    }
}

fn mlp() -> Mlp {
    Mlp {
        layers: vec![affine(3, 2, 0.5), affine(1, 3, -1.0)],
        scale: Some(TrackedTensor::from(2.0)),
        name: "mlp".to_string(),
        steps: 7,
    }
}

impl Mlp {
    fn apply(&self, x: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        let mut h = x.clone();
        for layer in &self.layers {
            h = layer.weight.matmul(&h)?.add(&layer.bias)?.relu()?;
        }
        match &self.scale {
            Some(s) => h.mul(s),
            None => Ok(h),
        }
    }
}

#[test]
fn test_identity_wrap_is_idempotent() {
    let a = affine(2, 2, 1.5);
    let once = a.wrap(&mut |leaf| Ok(leaf.clone())).unwrap();
    let twice = once.wrap(&mut |leaf| Ok(leaf.clone())).unwrap();
    check_structure(&a, &twice).unwrap();
    assert_eq!(twice.weight.value(), a.weight.value());
    assert_eq!(twice.bias.value(), a.bias.value());
}

#[test]
fn test_kept_fields_survive_wrap() {
    let m = mlp();
    assert_eq!(m.leaf_count(), 5);
    assert_eq!(
        m.leaf_shapes(),
        vec![
            Shape::from([3, 2]),
            Shape::from([3, 1]),
            Shape::from([1, 3]),
            Shape::from([1, 1]),
            Shape::scalar(),
        ]
    );
    let zeroed = m
        .wrap(&mut |leaf| Ok(Tensor::zeros(leaf.shape()).into()))
        .unwrap();
    assert_eq!(zeroed.name, "mlp");
    assert_eq!(zeroed.steps, 7);
    assert!(zeroed.leaves().iter().all(|l| l.value().iter().all(|v| v == 0.0)));
}

#[test]
fn test_gradient_mirrors_nested_structure() {
    let x = TrackedTensor::from(Tensor::from_vec(vec![1.0, 2.0], [2, 1]).unwrap());
    let mut m = mlp();
    // second layer weights of -1 would kill every unit under relu
    m.layers[1] = affine(1, 3, 1.0);

    let grad = reverse_derivative(&m, |m| m.apply(&x)?.sum()).unwrap();
    assert_eq!(grad.name, "mlp");
    assert_eq!(grad.layers.len(), 2);
    check_structure(&m, &grad).unwrap();

    // h1 = relu(W1 x) = [1.5; 1.5; 1.5], out = s * sum(W2 h1) = 2 * 4.5
    let ds = grad.scale.as_ref().map(|s| s.value().item().unwrap());
    assert_eq!(ds, Some(4.5));
    assert_eq!(grad.layers[1].weight.value().to_vec(), vec![3.0, 3.0, 3.0]);
    assert_eq!(grad.layers[1].bias.value().to_vec(), vec![2.0]);
    assert_eq!(
        grad.layers[0].weight.value().to_vec(),
        vec![2.0, 4.0, 2.0, 4.0, 2.0, 4.0]
    );
}

#[test]
fn test_absent_optional_leaf() {
    let mut m = mlp();
    m.scale = None;
    assert_eq!(m.leaf_count(), 4);
    let x = TrackedTensor::from(Tensor::ones([2, 1]));
    let grad = reverse_derivative(&m, |m| m.apply(&x)?.sum()).unwrap();
    assert!(grad.scale.is_none());
}

/// Returns the same leaf for both fields, so the rebuilt value has the
/// wrong shapes.
#[derive(Debug)]
struct Aliasing {
    a: TrackedTensor,
    b: TrackedTensor,
}

impl Differentiable for Aliasing {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        let a = f(&self.a)?;
        let _ = f(&self.b)?;
        Ok(Aliasing { b: a.clone(), a })
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        f(&self.a);
        f(&self.b);
    }
}

#[test]
fn test_inconsistent_wrap_is_reported() {
    let input = Aliasing {
        a: Tensor::ones([2]).into(),
        b: Tensor::ones([3]).into(),
    };
    let checked = Differentiator::new(DiffOptions::default().with_check_structure(true));
    let err = checked
        .reverse_derivative(&input, |x| x.a.sum())
        .unwrap_err();
    assert!(matches!(err, TensorError::StructuralWrapMismatch { .. }));
}

/// Rebuilds its two fields in swapped order.
#[derive(Debug)]
struct Swapped {
    w: TrackedTensor,
    b: TrackedTensor,
}

impl Differentiable for Swapped {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        Ok(Swapped {
            w: f(&self.b)?,
            b: f(&self.w)?,
        })
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        f(&self.w);
        f(&self.b);
    }
}

#[test]
fn test_reordering_wrap_is_reported() {
    let input = Swapped {
        w: TrackedTensor::from(3.0),
        b: TrackedTensor::from(10.0),
    };
    let checked = Differentiator::new(DiffOptions::default().with_check_structure(true));
    let err = checked
        .reverse_derivative(&input, |s| s.w.pow(2.0))
        .unwrap_err();
    assert!(matches!(err, TensorError::StructuralWrapMismatch { .. }));
}

#[test]
fn test_in_order_wrap_passes_order_check() {
    let input = Affine {
        weight: TrackedTensor::from(3.0),
        bias: TrackedTensor::from(10.0),
    };
    let checked = Differentiator::new(DiffOptions::default().with_check_structure(true));
    let grad = checked
        .reverse_derivative(&input, |a| a.weight.pow(2.0))
        .unwrap();
    assert_eq!(grad.weight.value().item().unwrap(), 6.0);
    assert_eq!(grad.bias.value().item().unwrap(), 0.0);
}
