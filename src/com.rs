//! Live backend: drives VibrationVIEW through COM late binding (`IDispatch`).
//!
//! Only built on Windows with the `com` feature. Member names are resolved with
//! `GetIDsOfNames` on first use and cached per endpoint.
//!
//! ## Argument marshalling
//!
//! Scalars are passed by value. Arrays are passed by reference
//! (`VT_BYREF | VT_VARIANT`) so the server can fill caller-allocated buffers;
//! after the call the referenced variants are converted back into the caller's
//! `&mut [Value]`. Arrays travel as `SAFEARRAY`s of `VARIANT`.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::mem::ManuallyDrop;

use tracing::debug;
use windows::core::{BSTR, GUID, HSTRING, PCWSTR};
use windows::Win32::Foundation::{DISP_E_EXCEPTION, VARIANT_BOOL};
use windows::Win32::System::Com::{
    CLSIDFromProgID, CoCreateInstance, CoInitializeEx, CoUninitialize, IDispatch, CLSCTX_LOCAL_SERVER,
    COINIT_APARTMENTTHREADED, DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT,
    DISPPARAMS, EXCEPINFO, SAFEARRAY, SAFEARRAYBOUND,
};
use windows::Win32::System::Ole::{
    SafeArrayCreate, SafeArrayDestroy, SafeArrayGetDim, SafeArrayGetElement, SafeArrayGetLBound,
    SafeArrayGetUBound, SafeArrayPutElement, DISPID_PROPERTYPUT,
};
use windows::Win32::System::Variant::{
    VariantClear, VARENUM, VARIANT, VARIANT_0_0, VT_ARRAY, VT_BOOL, VT_BSTR, VT_BYREF, VT_EMPTY, VT_I2, VT_I4,
    VT_INT, VT_NULL, VT_R4, VT_R8, VT_UI1, VT_UI2, VT_UI4, VT_VARIANT,
};

use crate::endpoint::{Connector, Endpoint, Value};
use crate::error::{RemoteError, RemoteResult};

/// Source component reported for transport-level failures.
const TRANSPORT_SOURCE: &str = "COM";
const LOCALE_USER_DEFAULT: u32 = 0x0400;

/// [`Connector`] backed by the Windows COM runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComConnector;

impl ComConnector {
    /// Create the connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for ComConnector {
    fn initialize_thread(&self) -> RemoteResult<()> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(transport_error)
    }

    fn uninitialize_thread(&self) {
        unsafe { CoUninitialize() };
    }

    fn dispatch(&self, prog_id: &str) -> RemoteResult<Box<dyn Endpoint>> {
        let name = HSTRING::from(prog_id);
        let clsid = unsafe { CLSIDFromProgID(PCWSTR(name.as_ptr())) }.map_err(transport_error)?;
        let dispatch: IDispatch =
            unsafe { CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER) }.map_err(transport_error)?;
        debug!(prog_id, "IDispatch created");
        Ok(Box::new(ComEndpoint {
            dispatch,
            ids: RefCell::new(HashMap::new()),
        }))
    }
}

/// Handle on a running VibrationVIEW instance.
pub struct ComEndpoint {
    dispatch: IDispatch,
    ids: RefCell<HashMap<String, i32>>,
}

impl ComEndpoint {
    fn dispid(&self, member: &str) -> RemoteResult<i32> {
        if let Some(id) = self.ids.borrow().get(member) {
            return Ok(*id);
        }
        let name = HSTRING::from(member);
        let names = [PCWSTR(name.as_ptr())];
        let mut id = 0i32;
        unsafe {
            self.dispatch
                .GetIDsOfNames(&GUID::zeroed(), names.as_ptr(), 1, LOCALE_USER_DEFAULT, &mut id)
        }
        .map_err(transport_error)?;
        self.ids.borrow_mut().insert(member.to_string(), id);
        Ok(id)
    }

    /// Invoke `member`, writing array arguments back into `args`.
    fn invoke(
        &self,
        member: &str,
        flags: DISPATCH_FLAGS,
        args: &mut [Value],
        put_value: Option<&Value>,
    ) -> RemoteResult<Value> {
        let dispid = self.dispid(member)?;

        // Owned argument storage, in caller order.
        let mut owned: Vec<OwnedVariant> = args.iter().map(OwnedVariant::from_value).collect::<RemoteResult<_>>()?;

        // rgvarg is right-to-left; arrays go by reference to the owned storage.
        let mut rgvarg: Vec<VARIANT> = Vec::with_capacity(owned.len() + 1);
        let put = put_value.map(OwnedVariant::from_value).transpose()?;
        if let Some(put) = &put {
            rgvarg.push(put.shallow_copy());
        }
        for (value, slot) in args.iter().zip(owned.iter_mut()).rev() {
            rgvarg.push(if is_array(value) {
                slot.by_ref()
            } else {
                slot.shallow_copy()
            });
        }

        let mut named = DISPID_PROPERTYPUT;
        let params = DISPPARAMS {
            rgvarg: rgvarg.as_mut_ptr(),
            rgdispidNamedArgs: if put.is_some() {
                &mut named
            } else {
                std::ptr::null_mut()
            },
            cArgs: rgvarg.len() as u32,
            cNamedArgs: u32::from(put.is_some()),
        };

        let mut result = OwnedVariant::empty();
        let mut excep = EXCEPINFO::default();
        let mut arg_err = 0u32;
        let outcome = unsafe {
            self.dispatch.Invoke(
                dispid,
                &GUID::zeroed(),
                LOCALE_USER_DEFAULT,
                flags,
                &params,
                Some(&mut result.0),
                Some(&mut excep),
                Some(&mut arg_err),
            )
        };
        // rgvarg entries are shallow copies or references; never cleared here.
        drop(rgvarg);

        if let Err(e) = outcome {
            return Err(invoke_error(e, &excep));
        }

        for (value, slot) in args.iter_mut().zip(owned.iter()) {
            if is_array(value) {
                *value = slot.to_value()?;
            }
        }
        result.to_value()
    }
}

impl Endpoint for ComEndpoint {
    fn get(&self, member: &str, args: &[Value]) -> RemoteResult<Value> {
        let mut args = args.to_vec();
        self.invoke(member, DISPATCH_PROPERTYGET | DISPATCH_METHOD, &mut args, None)
    }

    fn put(&self, member: &str, args: &[Value], value: Value) -> RemoteResult<()> {
        let mut args = args.to_vec();
        self.invoke(member, DISPATCH_PROPERTYPUT, &mut args, Some(&value))
            .map(|_| ())
    }

    fn call(&self, member: &str, args: &mut [Value]) -> RemoteResult<Value> {
        self.invoke(member, DISPATCH_METHOD | DISPATCH_PROPERTYGET, args, None)
    }
}

fn is_array(value: &Value) -> bool {
    matches!(
        value,
        Value::FloatArray(_) | Value::FloatMatrix(_) | Value::StrMatrix(_)
    )
}

/// A `VARIANT` cleared on drop.
struct OwnedVariant(VARIANT);

impl OwnedVariant {
    fn empty() -> Self {
        Self(VARIANT::default())
    }

    fn with(vt: VARENUM, fill: impl FnOnce(&mut VARIANT_0_0)) -> Self {
        let mut v = VARIANT::default();
        unsafe {
            let inner = &mut *v.Anonymous.Anonymous;
            inner.vt = vt;
            fill(inner);
        }
        Self(v)
    }

    fn from_value(value: &Value) -> RemoteResult<Self> {
        let v = match value {
            Value::Empty => Self::empty(),
            Value::Bool(b) => Self::with(VT_BOOL, |v| v.Anonymous.boolVal = VARIANT_BOOL(if *b { -1 } else { 0 })),
            Value::Int(i) => Self::with(VT_I4, |v| v.Anonymous.lVal = *i),
            Value::Float(f) => Self::with(VT_R8, |v| v.Anonymous.dblVal = *f),
            Value::Str(s) => {
                let bstr = BSTR::from(s.as_str());
                Self::with(VT_BSTR, |v| v.Anonymous.bstrVal = ManuallyDrop::new(bstr))
            }
            Value::FloatArray(values) => {
                let cells: Vec<Value> = values.iter().map(|f| Value::Float(*f)).collect();
                Self::array(&[cells.len()], &cells)?
            }
            Value::FloatMatrix(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                let cells: Vec<Value> = rows.iter().flatten().map(|f| Value::Float(*f)).collect();
                Self::array(&[rows.len(), cols], &cells)?
            }
            Value::StrMatrix(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                let cells: Vec<Value> = rows.iter().flatten().map(|s| Value::Str(s.clone())).collect();
                Self::array(&[rows.len(), cols], &cells)?
            }
        };
        Ok(v)
    }

    /// SAFEARRAY of VARIANT with the given dimensions, cells in row-major order.
    fn array(dims: &[usize], cells: &[Value]) -> RemoteResult<Self> {
        let bounds: Vec<SAFEARRAYBOUND> = dims
            .iter()
            .map(|d| SAFEARRAYBOUND {
                cElements: *d as u32,
                lLbound: 0,
            })
            .collect();
        let psa = unsafe { SafeArrayCreate(VT_VARIANT, bounds.len() as u32, bounds.as_ptr()) };
        if psa.is_null() {
            return Err(RemoteError::new(0, TRANSPORT_SOURCE, "SafeArrayCreate failed"));
        }

        let cols = dims.get(1).copied().unwrap_or(1).max(1);
        for (n, cell) in cells.iter().enumerate() {
            let indices: Vec<i32> = if dims.len() == 2 {
                vec![(n / cols) as i32, (n % cols) as i32]
            } else {
                vec![n as i32]
            };
            let element = OwnedVariant::from_value(cell)?;
            let put = unsafe {
                SafeArrayPutElement(psa, indices.as_ptr(), &element.0 as *const VARIANT as *const c_void)
            };
            if let Err(e) = put {
                unsafe {
                    let _ = SafeArrayDestroy(psa);
                }
                return Err(transport_error(e));
            }
        }

        Ok(Self::with(VARENUM(VT_ARRAY.0 | VT_VARIANT.0), |v| v.Anonymous.parray = psa))
    }

    /// Bitwise copy sharing the payload. The copy must not be cleared.
    fn shallow_copy(&self) -> VARIANT {
        unsafe { std::ptr::read(&self.0) }
    }

    /// `VT_BYREF | VT_VARIANT` pointing at this variant.
    fn by_ref(&mut self) -> VARIANT {
        let target: *mut VARIANT = &mut self.0;
        Self::with(VARENUM(VT_BYREF.0 | VT_VARIANT.0), |v| v.Anonymous.pvarVal = target).into_raw()
    }

    fn into_raw(self) -> VARIANT {
        let this = ManuallyDrop::new(self);
        unsafe { std::ptr::read(&this.0) }
    }

    fn to_value(&self) -> RemoteResult<Value> {
        variant_to_value(&self.0)
    }
}

impl Drop for OwnedVariant {
    fn drop(&mut self) {
        unsafe {
            let _ = VariantClear(&mut self.0);
        }
    }
}

fn variant_to_value(v: &VARIANT) -> RemoteResult<Value> {
    unsafe {
        let inner = &*v.Anonymous.Anonymous;
        let vt = inner.vt;
        if vt.0 & VT_BYREF.0 != 0 {
            if vt.0 & !VT_BYREF.0 == VT_VARIANT.0 && !inner.Anonymous.pvarVal.is_null() {
                return variant_to_value(&*inner.Anonymous.pvarVal);
            }
            return Err(unsupported(vt));
        }
        if vt.0 & VT_ARRAY.0 != 0 {
            return safearray_to_value(inner.Anonymous.parray);
        }
        let value = match vt {
            VT_EMPTY | VT_NULL => Value::Empty,
            VT_BOOL => Value::Bool(inner.Anonymous.boolVal.0 != 0),
            VT_I2 => Value::Int(i32::from(inner.Anonymous.iVal)),
            VT_I4 | VT_INT => Value::Int(inner.Anonymous.lVal),
            VT_UI1 => Value::Int(i32::from(inner.Anonymous.bVal)),
            VT_UI2 => Value::Int(i32::from(inner.Anonymous.uiVal)),
            VT_UI4 => Value::Int(inner.Anonymous.ulVal as i32),
            VT_R4 => Value::Float(f64::from(inner.Anonymous.fltVal)),
            VT_R8 => Value::Float(inner.Anonymous.dblVal),
            VT_BSTR => Value::Str(inner.Anonymous.bstrVal.to_string()),
            other => return Err(unsupported(other)),
        };
        Ok(value)
    }
}

/// Read a 1- or 2-dimensional SAFEARRAY of VARIANT.
unsafe fn safearray_to_value(psa: *const SAFEARRAY) -> RemoteResult<Value> {
    if psa.is_null() {
        return Ok(Value::Empty);
    }
    let dims = SafeArrayGetDim(psa);
    let extent = |dim: u32| -> RemoteResult<(i32, i32)> {
        let lo = SafeArrayGetLBound(psa, dim).map_err(transport_error)?;
        let hi = SafeArrayGetUBound(psa, dim).map_err(transport_error)?;
        Ok((lo, hi))
    };
    let element = |indices: &[i32]| -> RemoteResult<Value> {
        let mut cell = OwnedVariant::empty();
        SafeArrayGetElement(psa, indices.as_ptr(), &mut cell.0 as *mut VARIANT as *mut c_void)
            .map_err(transport_error)?;
        cell.to_value()
    };

    match dims {
        1 => {
            let (lo, hi) = extent(1)?;
            let values = (lo..=hi)
                .map(|i| element(&[i])?.into_f64("SAFEARRAY").map_err(shape_error))
                .collect::<RemoteResult<Vec<f64>>>()?;
            Ok(Value::FloatArray(values))
        }
        2 => {
            let (row_lo, row_hi) = extent(1)?;
            let (col_lo, col_hi) = extent(2)?;
            let mut rows = Vec::new();
            for r in row_lo..=row_hi {
                let mut row = Vec::new();
                for c in col_lo..=col_hi {
                    row.push(element(&[r, c])?);
                }
                rows.push(row);
            }
            let has_strings = rows.iter().flatten().any(|v| matches!(v, Value::Str(_)));
            if has_strings {
                let matrix = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|v| v.into_string("SAFEARRAY").map_err(shape_error)).collect())
                    .collect::<RemoteResult<Vec<Vec<String>>>>()?;
                Ok(Value::StrMatrix(matrix))
            } else {
                let matrix = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|v| v.into_f64("SAFEARRAY").map_err(shape_error)).collect())
                    .collect::<RemoteResult<Vec<Vec<f64>>>>()?;
                Ok(Value::FloatMatrix(matrix))
            }
        }
        n => Err(RemoteError::new(
            0,
            TRANSPORT_SOURCE,
            format!("Unsupported SAFEARRAY with {n} dimensions"),
        )),
    }
}

fn transport_error(e: windows::core::Error) -> RemoteError {
    RemoteError::new(e.code().0, TRANSPORT_SOURCE, e.message().to_string())
}

fn invoke_error(e: windows::core::Error, excep: &EXCEPINFO) -> RemoteError {
    if e.code() != DISP_E_EXCEPTION {
        return transport_error(e);
    }
    let code = if excep.scode != 0 {
        excep.scode
    } else {
        i32::from(excep.wCode)
    };
    let source = excep.bstrSource.to_string();
    let description = excep.bstrDescription.to_string();
    RemoteError::new(
        code,
        if source.is_empty() { TRANSPORT_SOURCE.to_string() } else { source },
        if description.is_empty() { e.message().to_string() } else { description },
    )
}

fn unsupported(vt: VARENUM) -> RemoteError {
    RemoteError::new(0, TRANSPORT_SOURCE, format!("Unsupported VARIANT type {:#06x}", vt.0))
}

fn shape_error(e: crate::error::VvError) -> RemoteError {
    RemoteError::new(0, TRANSPORT_SOURCE, e.to_string())
}
