//! The tagged-union operand wire format of the foreign interface: a tag
//! byte (0=LOW, 1=MID, 2=TOP) followed by an opaque payload whose layout
//! depends on the tag.

use vm_asm::Digit81;
use vm_core::{BigIntMid, Operand, Sign, Tensor, VmError};

/// A `Digit81` laid out for C: three plain fields, no padding tricks.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiDigit81 {
    pub a: u32,
    pub b: u32,
    pub c: u8,
}

/// The wire operand. For `tag == 0` (LOW), `low` holds the value and
/// `payload`/`payload_len` are unused. For `tag == 1` (MID) and `tag == 2`
/// (TOP), `payload` points at `payload_len` bytes produced by `encode`;
/// ownership passes to whoever holds the `FfiOperand` and must be released
/// with [`crate::vm_free_operand_payload`].
#[repr(C)]
pub struct FfiOperand {
    pub tag: u8,
    pub low: FfiDigit81,
    pub payload: *mut u8,
    pub payload_len: usize,
}

pub const TAG_LOW: u8 = 0;
pub const TAG_MID: u8 = 1;
pub const TAG_TOP: u8 = 2;

/// Serializes a `BigIntMid` as: sign byte (0=positive, 1=negative), 4-byte
/// little-endian digit count, then that many base-243 digit bytes.
fn encode_mid(value: &BigIntMid) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + value.digits().len());
    out.push(match value.sign() {
        Sign::Positive => 0,
        Sign::Negative => 1,
    });
    out.extend_from_slice(&(value.digits().len() as u32).to_le_bytes());
    out.extend_from_slice(value.digits());
    out
}

fn decode_mid(bytes: &[u8]) -> Result<(BigIntMid, &[u8]), VmError> {
    let (&sign_byte, rest) = bytes.split_first().ok_or(VmError::InvalidInput)?;
    let (len_bytes, rest) = rest.split_at_checked(4).ok_or(VmError::InvalidInput)?;
    let len = u32::from_le_bytes(len_bytes.try_into().expect("checked len")) as usize;
    let (digit_bytes, rest) = rest.split_at_checked(len).ok_or(VmError::InvalidInput)?;

    let mut magnitude = BigIntMid::zero();
    let base = BigIntMid::from_i64(243);
    for &digit in digit_bytes.iter().rev() {
        magnitude = magnitude.mul(&base).add(&BigIntMid::from_i64(digit as i64));
    }
    let value = if sign_byte == 1 && !magnitude.is_zero() {
        magnitude.neg()
    } else {
        magnitude
    };
    Ok((value, rest))
}

/// Serializes a `Tensor` as: 4-byte rank, that many 4-byte shape entries,
/// then each element as an `encode_mid` block prefixed by its own 4-byte
/// length.
fn encode_top(tensor: &Tensor) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(tensor.rank() as u32).to_le_bytes());
    for &dim in tensor.shape() {
        out.extend_from_slice(&(dim as u32).to_le_bytes());
    }
    for element in tensor.elements() {
        let encoded = encode_mid(element);
        out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        out.extend_from_slice(&encoded);
    }
    out
}

fn decode_top(bytes: &[u8]) -> Result<Tensor, VmError> {
    let (rank_bytes, rest) = bytes.split_at_checked(4).ok_or(VmError::InvalidInput)?;
    let rank = u32::from_le_bytes(rank_bytes.try_into().expect("checked len")) as usize;

    let mut rest = rest;
    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        let (dim_bytes, tail) = rest.split_at_checked(4).ok_or(VmError::InvalidInput)?;
        shape.push(u32::from_le_bytes(dim_bytes.try_into().expect("checked len")) as usize);
        rest = tail;
    }

    let size = shape.iter().product::<usize>().max(1);
    let mut elements = Vec::with_capacity(size);
    for _ in 0..size {
        let (len_bytes, tail) = rest.split_at_checked(4).ok_or(VmError::InvalidInput)?;
        let len = u32::from_le_bytes(len_bytes.try_into().expect("checked len")) as usize;
        let (block, tail) = tail.split_at_checked(len).ok_or(VmError::InvalidInput)?;
        let (element, _) = decode_mid(block)?;
        elements.push(element);
        rest = tail;
    }

    Tensor::new(shape, elements)
}

/// Converts a core `Operand` into its wire form, allocating a payload
/// buffer for MID/TOP that the caller must eventually release.
pub fn encode(operand: &Operand) -> FfiOperand {
    match operand {
        Operand::Low(digit) => FfiOperand {
            tag: TAG_LOW,
            low: FfiDigit81 {
                a: digit.a,
                b: digit.b,
                c: digit.c,
            },
            payload: std::ptr::null_mut(),
            payload_len: 0,
        },
        Operand::Mid(value) => leak_payload(TAG_MID, encode_mid(value)),
        Operand::Top(tensor) => leak_payload(TAG_TOP, encode_top(tensor)),
    }
}

fn leak_payload(tag: u8, bytes: Vec<u8>) -> FfiOperand {
    let boxed = bytes.into_boxed_slice();
    let len = boxed.len();
    let ptr = Box::into_raw(boxed) as *mut u8;
    FfiOperand {
        tag,
        low: FfiDigit81 { a: 0, b: 0, c: 0 },
        payload: ptr,
        payload_len: len,
    }
}

/// Converts a wire operand back into a core `Operand`. Does not take
/// ownership of `operand.payload`; the caller is still responsible for it.
///
/// # Safety
/// `operand.payload` must be valid for `operand.payload_len` bytes when
/// `operand.tag` is `TAG_MID` or `TAG_TOP`.
pub unsafe fn decode(operand: &FfiOperand) -> Result<Operand, VmError> {
    match operand.tag {
        TAG_LOW => Ok(Operand::Low(Digit81::new(
            operand.low.a,
            operand.low.b,
            operand.low.c,
        ))),
        TAG_MID => {
            let bytes =
                unsafe { std::slice::from_raw_parts(operand.payload, operand.payload_len) };
            let (value, _) = decode_mid(bytes)?;
            Ok(Operand::Mid(value))
        }
        TAG_TOP => {
            let bytes =
                unsafe { std::slice::from_raw_parts(operand.payload, operand.payload_len) };
            Ok(Operand::Top(decode_top(bytes)?))
        }
        _ => Err(VmError::TypeError),
    }
}
