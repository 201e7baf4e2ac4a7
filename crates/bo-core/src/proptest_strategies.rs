use crate::{Shape, Tensor};
use proptest::prelude::*;

pub fn arb_shape() -> impl Strategy<Value = Shape> {
    prop::collection::vec(1_u32..5, 1..5).prop_map(Shape::new)
}

pub fn arb_f64_tensor() -> impl Strategy<Value = Tensor> {
    arb_shape().prop_flat_map(|shape| {
        let count = shape.element_count().unwrap_or(0) as usize;
        prop::collection::vec(-1.0e6_f64..1.0e6, count).prop_map(move |values| {
            Tensor::from_f64(shape.clone(), &values).expect("strategy sizes match the shape")
        })
    })
}
