// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the adcodegen project (compiled derivative kernels).

use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::debug;

use super::{check_buffer, unavailable, Artifact, LoadError};
use crate::evaluator::EvalError;
use crate::order::DerivativeOrder;
use crate::paths::{dynamic_library_extension, is_valid_model_name, with_extension_suffix};

type SizeFn = unsafe extern "C" fn() -> usize;
type OrderFn = unsafe extern "C" fn() -> c_int;
type KernelFn = unsafe extern "C" fn(*const f64, *mut f64);
type WeightedKernelFn = unsafe extern "C" fn(*const f64, *const f64, *mut f64);

/// A shared library produced by the native backend.
pub struct NativeLibrary {
    path: PathBuf,
    input_size: usize,
    output_size: usize,
    order: DerivativeOrder,
    forward_zero: KernelFn,
    jacobian: Option<KernelFn>,
    hessian: Option<WeightedKernelFn>,
    // Keeps the code behind the function pointers mapped.
    _library: Library,
}

impl NativeLibrary {
    /// Open `<generic_path><platform extension>` and bind the kernels of
    /// `model_name`.
    pub fn open(model_name: &str, generic_path: &Path) -> Result<Self, LoadError> {
        if !is_valid_model_name(model_name) {
            return Err(LoadError::InvalidModelName(model_name.to_string()));
        }
        let path = with_extension_suffix(generic_path, &dynamic_library_extension());
        if !path.is_file() {
            return Err(LoadError::NotFound(path));
        }

        // SAFETY: generated libraries have no initializers with side effects.
        let library = unsafe { Library::new(&path) }.map_err(|source| LoadError::Open {
            path: path.clone(),
            source,
        })?;

        // SAFETY: the signatures below match the exports emitted by codegen.
        let (input_size, output_size, raw_order) = unsafe {
            let input_size = bind::<SizeFn>(&library, &path, model_name, "input_size")?;
            let output_size = bind::<SizeFn>(&library, &path, model_name, "output_size")?;
            let order = bind::<OrderFn>(&library, &path, model_name, "derivative_order")?;
            (input_size(), output_size(), order())
        };

        let order = u8::try_from(raw_order)
            .ok()
            .and_then(DerivativeOrder::from_u8)
            .ok_or_else(|| LoadError::InvalidMetadata(format!("derivative order {raw_order}")))?;
        if input_size == 0 || output_size == 0 {
            return Err(LoadError::InvalidMetadata(format!(
                "dimensions {input_size} -> {output_size}"
            )));
        }

        // SAFETY: as above.
        let (forward_zero, jacobian, hessian) = unsafe {
            let forward = bind::<KernelFn>(&library, &path, model_name, "forward_zero")?;
            let jacobian = if order.includes_jacobian() {
                Some(bind::<KernelFn>(&library, &path, model_name, "jacobian")?)
            } else {
                None
            };
            let hessian = if order.includes_hessian() {
                Some(bind::<WeightedKernelFn>(
                    &library, &path, model_name, "hessian",
                )?)
            } else {
                None
            };
            (forward, jacobian, hessian)
        };

        debug!(
            "loaded {} ({input_size} inputs, {output_size} outputs, order {order})",
            path.display()
        );

        Ok(Self {
            path,
            input_size,
            output_size,
            order,
            forward_zero,
            jacobian,
            hessian,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Look up `<model_name>_<kernel>` and copy the function pointer out.
///
/// # Safety
///
/// `T` must be the exact type of the exported symbol.
unsafe fn bind<T: Copy>(
    library: &Library,
    path: &Path,
    model_name: &str,
    kernel: &str,
) -> Result<T, LoadError> {
    let symbol_name = format!("{model_name}_{kernel}");
    let symbol: Symbol<'_, T> =
        library
            .get(symbol_name.as_bytes())
            .map_err(|source| LoadError::MissingSymbol {
                path: path.to_path_buf(),
                symbol: symbol_name.clone(),
                source,
            })?;
    Ok(*symbol)
}

impl Artifact for NativeLibrary {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn order(&self) -> DerivativeOrder {
        self.order
    }

    fn forward_zero(&self, x: &[f64], y: &mut [f64]) -> Result<(), EvalError> {
        check_buffer("input", self.input_size, x.len())?;
        check_buffer("output", self.output_size, y.len())?;
        // SAFETY: both buffers have the lengths the kernel was generated for.
        unsafe { (self.forward_zero)(x.as_ptr(), y.as_mut_ptr()) };
        Ok(())
    }

    fn jacobian(&self, x: &[f64], jac: &mut [f64]) -> Result<(), EvalError> {
        let kernel = self
            .jacobian
            .ok_or_else(|| unavailable("jacobian", DerivativeOrder::First, self.order))?;
        check_buffer("input", self.input_size, x.len())?;
        check_buffer("jacobian", self.output_size * self.input_size, jac.len())?;
        // SAFETY: as in forward_zero.
        unsafe { kernel(x.as_ptr(), jac.as_mut_ptr()) };
        Ok(())
    }

    fn hessian(&self, x: &[f64], w: &[f64], hess: &mut [f64]) -> Result<(), EvalError> {
        let kernel = self
            .hessian
            .ok_or_else(|| unavailable("hessian", DerivativeOrder::Second, self.order))?;
        check_buffer("input", self.input_size, x.len())?;
        check_buffer("weight", self.output_size, w.len())?;
        check_buffer("hessian", self.input_size * self.input_size, hess.len())?;
        // SAFETY: as in forward_zero.
        unsafe { kernel(x.as_ptr(), w.as_ptr(), hess.as_mut_ptr()) };
        Ok(())
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("input_size", &self.input_size)
            .field("output_size", &self.output_size)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
