//! Structural wrap protocol.
//!
//! A [`Differentiable`] value is a [`TrackedTensor`] leaf or an aggregate of
//! them. `wrap` rebuilds a structurally identical value with every leaf
//! replaced by the wrapper's result, in a fixed order; `visit_leaves` walks
//! the leaves in that same order. The engine relies on this correspondence
//! to install tracked leaves and to match adjoints back to fields.
//!
//! User aggregates implement the trait by hand or with [`differentiable!`]:
//!
//! ```
//! use adtensors::{Tensor, differentiable};
//! use adtensors::autodiff::{Differentiable, TrackedTensor};
//!
//! #[derive(Debug, Clone)]
//! struct Linear {
//!     weight: TrackedTensor,
//!     bias: TrackedTensor,
//! }
//!
//! differentiable!(Linear { weight, bias });
//!
//! let layer = Linear {
//!     weight: Tensor::ones([2, 2]).into(),
//!     bias: Tensor::zeros([2]).into(),
//! };
//! assert_eq!(layer.leaf_count(), 2);
//! ```

use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::shape::Shape;

/// Leaf wrapper passed to [`Differentiable::wrap`].
pub type WrapFn<'f> = dyn FnMut(&TrackedTensor) -> Result<TrackedTensor, TensorError> + 'f;

/// A value whose tensor leaves can be replaced while keeping its structure.
pub trait Differentiable: Sized {
    /// Rebuild `self` with each leaf replaced by `f(leaf)`.
    ///
    /// Implementations must call `f` exactly once per leaf, in the order
    /// [`visit_leaves`](Self::visit_leaves) reports them, and must not
    /// change the number of leaves.
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError>;

    /// Visit every leaf in wrap order.
    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor));

    fn leaf_count(&self) -> usize {
        let mut n = 0;
        self.visit_leaves(&mut |_| n += 1);
        n
    }

    fn leaf_shapes(&self) -> Vec<Shape> {
        let mut shapes = Vec::new();
        self.visit_leaves(&mut |leaf| shapes.push(leaf.shape().clone()));
        shapes
    }

    fn leaves(&self) -> Vec<&TrackedTensor> {
        let mut leaves = Vec::new();
        self.visit_leaves(&mut |leaf| leaves.push(leaf));
        leaves
    }

    /// Rebuild with leaves taken from `replacements`, in wrap order.
    ///
    /// # Errors
    ///
    /// `StructuralWrapMismatch` if the number of replacements differs from
    /// the number of leaves.
    fn rebuild(&self, replacements: Vec<TrackedTensor>) -> Result<Self, TensorError> {
        let expected = self.leaf_count();
        if replacements.len() != expected {
            return Err(TensorError::StructuralWrapMismatch {
                expected: format!("{expected} leaves"),
                actual: format!("{} leaves", replacements.len()),
            });
        }
        let mut it = replacements.into_iter();
        self.wrap(&mut |_| {
            it.next()
                .ok_or_else(|| TensorError::StructuralWrapMismatch {
                    expected: format!("{expected} leaves"),
                    actual: "a wrap visiting more leaves".to_string(),
                })
        })
    }
}

/// Check that `after` has the same leaf count and shapes as `before`.
pub fn check_structure<T: Differentiable>(before: &T, after: &T) -> Result<(), TensorError> {
    let expected = before.leaf_shapes();
    let actual = after.leaf_shapes();
    if expected != actual {
        return Err(TensorError::StructuralWrapMismatch {
            expected: describe(&expected),
            actual: describe(&actual),
        });
    }
    Ok(())
}

/// Check that installing leaves into `input` kept their order.
///
/// Leaf identities are issued in call order, so the i-th leaf of `wrapped`
/// must carry identity i and hold the value of the i-th leaf of `input`.
pub(crate) fn check_leaf_order<T: Differentiable>(
    input: &T,
    wrapped: &T,
) -> Result<(), TensorError> {
    let before = input.leaves();
    let after = wrapped.leaves();
    for (position, (old, new)) in before.iter().zip(&after).enumerate() {
        let in_place = new.id().map(|id| id.index()) == Some(position)
            && new.value().shares_storage_with(old.value());
        if !in_place {
            return Err(TensorError::StructuralWrapMismatch {
                expected: format!("leaf {position} installed in place"),
                actual: match new.id() {
                    Some(id) => format!("leaf {position} holding installed value {}", id.index()),
                    None => format!("leaf {position} untracked"),
                },
            });
        }
    }
    Ok(())
}

fn describe(shapes: &[Shape]) -> String {
    let parts: Vec<String> = shapes.iter().map(Shape::to_string).collect();
    format!("[{}]", parts.join(", "))
}

impl Differentiable for TrackedTensor {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        f(self)
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        f(self)
    }
}

impl<T: Differentiable> Differentiable for Vec<T> {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        self.iter().map(|item| item.wrap(f)).collect()
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        for item in self {
            item.visit_leaves(f);
        }
    }
}

impl<T: Differentiable> Differentiable for Option<T> {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        self.as_ref().map(|item| item.wrap(f)).transpose()
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        if let Some(item) = self {
            item.visit_leaves(f);
        }
    }
}

impl<T: Differentiable> Differentiable for Box<T> {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        Ok(Box::new(self.as_ref().wrap(f)?))
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        self.as_ref().visit_leaves(f);
    }
}

impl<T: Differentiable, const N: usize> Differentiable for [T; N] {
    fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
        let items = self
            .iter()
            .map(|item| item.wrap(f))
            .collect::<Result<Vec<T>, _>>()?;
        items
            .try_into()
            .map_err(|items: Vec<T>| TensorError::StructuralWrapMismatch {
                expected: format!("{N} elements"),
                actual: format!("{} elements", items.len()),
            })
    }

    fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
        for item in self {
            item.visit_leaves(f);
        }
    }
}

macro_rules! impl_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Differentiable),+> Differentiable for ($($name,)+) {
            fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
                Ok(($(self.$idx.wrap(f)?,)+))
            }

            fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
                $(self.$idx.visit_leaves(f);)+
            }
        }
    };
}

impl_tuple!(A: 0);
impl_tuple!(A: 0, B: 1);
impl_tuple!(A: 0, B: 1, C: 2);
impl_tuple!(A: 0, B: 1, C: 2, D: 3);

/// Implement [`Differentiable`] for a struct by listing its fields.
///
/// Listed fields are wrapped in the order given. Fields after `keep` are
/// not differentiable and are cloned into the rebuilt value.
///
/// ```
/// use adtensors::{Tensor, differentiable};
/// use adtensors::autodiff::{Differentiable, TrackedTensor};
///
/// #[derive(Debug, Clone)]
/// struct Dense {
///     weight: TrackedTensor,
///     bias: Option<TrackedTensor>,
///     name: String,
/// }
///
/// differentiable!(Dense { weight, bias } keep { name });
///
/// let layer = Dense {
///     weight: Tensor::ones([3, 2]).into(),
///     bias: None,
///     name: "dense".into(),
/// };
/// assert_eq!(layer.leaf_count(), 1);
/// ```
#[macro_export]
macro_rules! differentiable {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        $crate::differentiable!($name { $($field),+ } keep {});
    };
    ($name:ident { $($field:ident),+ $(,)? } keep { $($kept:ident),* $(,)? }) => {
        impl $crate::autodiff::Differentiable for $name {
            fn wrap(
                &self,
                f: &mut $crate::autodiff::WrapFn<'_>,
            ) -> ::std::result::Result<Self, $crate::TensorError> {
                ::std::result::Result::Ok($name {
                    $($field: $crate::autodiff::Differentiable::wrap(&self.$field, f)?,)+
                    $($kept: ::std::clone::Clone::clone(&self.$kept),)*
                })
            }

            fn visit_leaves<'a>(
                &'a self,
                f: &mut dyn FnMut(&'a $crate::autodiff::TrackedTensor),
            ) {
                $($crate::autodiff::Differentiable::visit_leaves(&self.$field, f);)+
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[derive(Debug, Clone)]
    struct Pair {
        a: TrackedTensor,
        b: Vec<TrackedTensor>,
    }

    differentiable!(Pair { a, b });

    fn pair() -> Pair {
        Pair {
            a: Tensor::ones([2]).into(),
            b: vec![Tensor::zeros([3]).into(), TrackedTensor::from(1.0)],
        }
    }

    #[test]
    fn test_identity_wrap_is_structurally_equal() {
        let p = pair();
        let q = p.wrap(&mut |leaf| Ok(leaf.clone())).unwrap();
        assert_eq!(q.a.value(), p.a.value());
        assert_eq!(q.b.len(), 2);
        assert_eq!(q.leaf_shapes(), p.leaf_shapes());
        check_structure(&p, &q).unwrap();
    }

    #[test]
    fn test_wrap_order_matches_visit_order() {
        let p = pair();
        let mut seen = Vec::new();
        let _ = p
            .wrap(&mut |leaf| {
                seen.push(leaf.shape().clone());
                Ok(leaf.clone())
            })
            .unwrap();
        assert_eq!(seen, p.leaf_shapes());
        assert_eq!(
            seen,
            vec![Shape::from([2]), Shape::from([3]), Shape::scalar()]
        );
    }

    #[test]
    fn test_wrap_does_not_mutate_original() {
        let p = pair();
        let q = p
            .wrap(&mut |leaf| Ok(Tensor::full(leaf.shape(), 5.0).into()))
            .unwrap();
        assert_eq!(p.a.value().to_vec(), vec![1.0, 1.0]);
        assert_eq!(q.a.value().to_vec(), vec![5.0, 5.0]);
    }

    #[test]
    fn test_rebuild() {
        let p = pair();
        let replacements = vec![
            TrackedTensor::from(2.0),
            TrackedTensor::from(3.0),
            TrackedTensor::from(4.0),
        ];
        let q = p.rebuild(replacements).unwrap();
        assert_eq!(q.a.value().item().unwrap(), 2.0);
        assert_eq!(q.b[1].value().item().unwrap(), 4.0);
        assert!(matches!(
            p.rebuild(vec![TrackedTensor::from(2.0)]),
            Err(TensorError::StructuralWrapMismatch { .. })
        ));
    }

    #[test]
    fn test_containers() {
        let t: (TrackedTensor, Option<TrackedTensor>, [TrackedTensor; 2], Box<TrackedTensor>) = (
            TrackedTensor::from(1.0),
            None,
            [TrackedTensor::from(2.0), TrackedTensor::from(3.0)],
            Box::new(TrackedTensor::from(4.0)),
        );
        assert_eq!(t.leaf_count(), 4);
        let doubled = t
            .wrap(&mut |leaf| Ok((leaf.value().item()? * 2.0).into()))
            .unwrap();
        let values: Vec<f64> = doubled
            .leaves()
            .iter()
            .map(|l| l.value().item().unwrap())
            .collect();
        assert_eq!(values, vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[derive(Debug)]
    struct Lossy {
        a: TrackedTensor,
        b: TrackedTensor,
    }

    // Drops a field on rebuild.
    impl Differentiable for Lossy {
        fn wrap(&self, f: &mut WrapFn<'_>) -> Result<Self, TensorError> {
            let a = f(&self.a)?;
            Ok(Lossy {
                b: a.clone(),
                a,
            })
        }

        fn visit_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a TrackedTensor)) {
            f(&self.a);
            f(&self.b);
        }
    }

    #[test]
    fn test_check_structure_detects_changed_shapes() {
        let l = Lossy {
            a: Tensor::ones([2]).into(),
            b: Tensor::ones([5]).into(),
        };
        let w = l.wrap(&mut |leaf| Ok(leaf.clone())).unwrap();
        assert!(matches!(
            check_structure(&l, &w),
            Err(TensorError::StructuralWrapMismatch { .. })
        ));
    }
}
