//! CPU Backend for lf_tensor.
//!
//! Dense, contiguous, row-major storage generic over the element type.

use std::marker::PhantomData;

use lf_tensor::prelude::*;
use lf_tensor::scalar;

/// CPU tensor storage.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuTensor<T: Element> {
    data: Vec<T>,
    shape: Shape,
}

impl<T: Element> CpuTensor<T> {
    /// Create a new CPU tensor from data and shape.
    pub fn new(data: Vec<T>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(Error::shape_mismatch(
                "CpuTensor::new",
                &shape,
                &Shape::new(vec![data.len()]),
            ));
        }
        Ok(CpuTensor { data, shape })
    }

    /// Build from data whose length already matches `shape`.
    fn from_parts(data: Vec<T>, shape: Shape) -> Self {
        debug_assert_eq!(data.len(), shape.numel());
        CpuTensor { data, shape }
    }

    /// Consume the tensor and return its row-major data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Element> TensorData for CpuTensor<T> {
    type Elem = T;

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Iterator over all multi-dimensional indices of a shape.
struct TensorIndices<'a> {
    shape: &'a Shape,
    current: Vec<usize>,
    done: bool,
}

impl<'a> TensorIndices<'a> {
    fn new(shape: &'a Shape) -> Self {
        TensorIndices {
            shape,
            current: vec![0; shape.ndim()],
            done: shape.numel() == 0,
        }
    }
}

impl Iterator for TensorIndices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        if self.shape.ndim() == 0 {
            self.done = true;
            return Some(result);
        }

        // Increment indices (rightmost first, like odometer)
        let mut i = self.shape.ndim() - 1;
        loop {
            self.current[i] += 1;
            if self.current[i] < self.shape.dim(i) {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
        }

        Some(result)
    }
}

/// CPU backend marker type.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend<T = f64>(PhantomData<T>);

impl<T: Element> Backend for CpuBackend<T> {
    type Elem = T;
    type Tensor = CpuTensor<T>;

    // === Creation ===

    fn zeros(shape: &Shape) -> CpuTensor<T> {
        CpuTensor::from_parts(vec![T::zero(); shape.numel()], shape.clone())
    }

    fn full(shape: &Shape, value: T) -> CpuTensor<T> {
        CpuTensor::from_parts(vec![value; shape.numel()], shape.clone())
    }

    fn from_vec(data: Vec<T>, shape: Shape) -> Result<CpuTensor<T>> {
        CpuTensor::new(data, shape)
    }

    // === Unary element-wise ===

    fn neg(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| -v)
    }

    fn abs(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.abs())
    }

    fn signum(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, scalar::sign)
    }

    fn exp(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.exp())
    }

    fn log(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.ln())
    }

    fn ln_1p(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.ln_1p())
    }

    fn cosh(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.cosh())
    }

    fn tanh(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.tanh())
    }

    fn sigmoid(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, scalar::sigmoid)
    }

    fn sqrt(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v.sqrt())
    }

    fn square(x: &CpuTensor<T>) -> CpuTensor<T> {
        unary_op(x, |v| v * v)
    }

    fn map<F>(x: &CpuTensor<T>, f: F) -> CpuTensor<T>
    where
        F: Fn(T) -> T,
    {
        unary_op(x, f)
    }

    // === Binary element-wise with broadcasting ===

    fn add(a: &CpuTensor<T>, b: &CpuTensor<T>) -> Result<CpuTensor<T>> {
        binary_op_broadcast("add", a, b, |x, y| x + y)
    }

    fn sub(a: &CpuTensor<T>, b: &CpuTensor<T>) -> Result<CpuTensor<T>> {
        binary_op_broadcast("sub", a, b, |x, y| x - y)
    }

    fn mul(a: &CpuTensor<T>, b: &CpuTensor<T>) -> Result<CpuTensor<T>> {
        binary_op_broadcast("mul", a, b, |x, y| x * y)
    }

    fn div(a: &CpuTensor<T>, b: &CpuTensor<T>) -> Result<CpuTensor<T>> {
        binary_op_broadcast("div", a, b, |x, y| x / y)
    }

    fn maximum(a: &CpuTensor<T>, b: &CpuTensor<T>) -> Result<CpuTensor<T>> {
        binary_op_broadcast("maximum", a, b, |x, y| x.max(y))
    }

    fn zip_map<F>(a: &CpuTensor<T>, b: &CpuTensor<T>, f: F) -> Result<CpuTensor<T>>
    where
        F: Fn(T, T) -> T,
    {
        binary_op_broadcast("zip_map", a, b, f)
    }

    // === Scalar ===

    fn scale(x: &CpuTensor<T>, factor: T) -> CpuTensor<T> {
        unary_op(x, |v| v * factor)
    }

    fn add_scalar(x: &CpuTensor<T>, value: T) -> CpuTensor<T> {
        unary_op(x, |v| v + value)
    }

    // === Reductions ===

    fn sum(x: &CpuTensor<T>) -> T {
        x.data.iter().copied().sum()
    }

    fn mean(x: &CpuTensor<T>) -> T {
        if x.data.is_empty() {
            return T::zero();
        }
        Self::sum(x) / T::constant(x.data.len() as f64)
    }

    fn dot(a: &CpuTensor<T>, b: &CpuTensor<T>) -> Result<T> {
        if a.shape != b.shape {
            return Err(Error::shape_mismatch("dot", &a.shape, &b.shape));
        }
        Ok(a.data.iter().zip(b.data.iter()).map(|(&x, &y)| x * y).sum())
    }

    // === Shape operations ===

    fn reshape(x: &CpuTensor<T>, shape: &Shape) -> Result<CpuTensor<T>> {
        if x.shape.numel() != shape.numel() {
            return Err(Error::shape_mismatch("reshape", shape, &x.shape));
        }
        Ok(CpuTensor::from_parts(x.data.clone(), shape.clone()))
    }

    fn split_rows(x: &CpuTensor<T>, at: usize) -> Result<(CpuTensor<T>, CpuTensor<T>)> {
        let rows = x.shape.rows();
        if x.shape.is_scalar() || at > rows {
            return Err(Error::shape_mismatch(
                "split_rows",
                &x.shape.with_leading(at),
                &x.shape,
            ));
        }
        let offset = at * x.shape.cols();
        let head = CpuTensor::from_parts(x.data[..offset].to_vec(), x.shape.with_leading(at));
        let tail = CpuTensor::from_parts(
            x.data[offset..].to_vec(),
            x.shape.with_leading(rows - at),
        );
        Ok((head, tail))
    }

    fn concat_rows(parts: &[&CpuTensor<T>]) -> Result<CpuTensor<T>> {
        let Some(first) = parts.first() else {
            return Ok(CpuTensor::from_parts(vec![], Shape::new(vec![0])));
        };

        let mut rows = 0;
        let mut data = Vec::with_capacity(parts.iter().map(|p| p.data.len()).sum());
        for part in parts {
            if part.shape.is_scalar() || part.shape.dims()[1..] != first.shape.dims()[1..] {
                return Err(Error::shape_mismatch(
                    "concat_rows",
                    &first.shape.with_leading(part.shape.rows()),
                    &part.shape,
                ));
            }
            rows += part.shape.rows();
            data.extend_from_slice(&part.data);
        }

        Ok(CpuTensor::from_parts(data, first.shape.with_leading(rows)))
    }

    // === Accumulation ===

    fn accumulate(dst: &mut CpuTensor<T>, src: &CpuTensor<T>) -> Result<()> {
        if dst.shape != src.shape {
            return Err(Error::shape_mismatch("accumulate", &dst.shape, &src.shape));
        }
        for (d, &s) in dst.data.iter_mut().zip(src.data.iter()) {
            *d = *d + s;
        }
        Ok(())
    }
}

/// Element-wise unary operation.
fn unary_op<T, F>(x: &CpuTensor<T>, op: F) -> CpuTensor<T>
where
    T: Element,
    F: Fn(T) -> T,
{
    let data: Vec<T> = x.data.iter().map(|&v| op(v)).collect();
    CpuTensor::from_parts(data, x.shape.clone())
}

/// Binary operation with broadcasting.
fn binary_op_broadcast<T, F>(
    op_name: &'static str,
    a: &CpuTensor<T>,
    b: &CpuTensor<T>,
    op: F,
) -> Result<CpuTensor<T>>
where
    T: Element,
    F: Fn(T, T) -> T,
{
    if a.shape == b.shape {
        let data: Vec<T> = a
            .data
            .iter()
            .zip(b.data.iter())
            .map(|(&x, &y)| op(x, y))
            .collect();
        return Ok(CpuTensor::from_parts(data, a.shape.clone()));
    }

    let out_shape = a
        .shape
        .broadcast_with(&b.shape)
        .ok_or_else(|| Error::shape_mismatch(op_name, &a.shape, &b.shape))?;

    let a_broadcast = broadcast_to(a, &out_shape);
    let b_broadcast = broadcast_to(b, &out_shape);

    let data: Vec<T> = a_broadcast
        .iter()
        .zip(b_broadcast.iter())
        .map(|(&x, &y)| op(x, y))
        .collect();

    Ok(CpuTensor::from_parts(data, out_shape))
}

/// Expand `x` to `shape`, which must be a broadcast of `x.shape`.
fn broadcast_to<T: Element>(x: &CpuTensor<T>, shape: &Shape) -> Vec<T> {
    if &x.shape == shape {
        return x.data.clone();
    }

    let offset = shape.ndim() - x.shape.ndim();
    let in_strides = x.shape.contiguous_strides();
    let mut data = Vec::with_capacity(shape.numel());

    for out_idx in TensorIndices::new(shape) {
        // Map output index to input index (accounting for broadcasting)
        let in_flat: usize = (0..x.shape.ndim())
            .map(|i| {
                if x.shape.dim(i) == 1 {
                    0
                } else {
                    out_idx[offset + i] * in_strides[i]
                }
            })
            .sum();
        data.push(x.data[in_flat]);
    }

    data
}
