//! Typed tag values.
//!
//! A [`Value`] is the materialized payload of one IFD entry: a vector of
//! elements of exactly one [`DataType`]. Values are decoded from the source
//! byte order once and re-encoded in the target byte order on save.

use crate::error::{Result, TiffError};

use super::header::ByteOrder;
use super::tags::DataType;

/// Multiplier applied per step when turning a float into a rational.
const RATIONAL_STEP: f64 = 10.0;

// =============================================================================
// Value
// =============================================================================

/// Materialized payload of an IFD entry, one variant per data type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(Vec<u8>),
    /// Raw ASCII bytes, including NUL terminators
    Ascii(Vec<u8>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ifd(Vec<u32>),
    Long8(Vec<u64>),
    SLong8(Vec<i64>),
    Ifd8(Vec<u64>),
}

impl Value {
    /// ASCII value holding `s` followed by a NUL terminator.
    pub fn ascii(s: &str) -> Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        Value::Ascii(bytes)
    }

    /// Unsigned rationals approximating `values`.
    pub fn rationals(values: &[f64]) -> Result<Self> {
        values
            .iter()
            .map(|&v| rat_to_ints(v, false).map(|(n, d)| (n as u32, d as u32)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Rational)
    }

    /// Signed rationals approximating `values`.
    pub fn signed_rationals(values: &[f64]) -> Result<Self> {
        values
            .iter()
            .map(|&v| rat_to_ints(v, true).map(|(n, d)| (n as i32, d as i32)))
            .collect::<Result<Vec<_>>>()
            .map(Value::SRational)
    }

    /// The data type of every element.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Byte(_) => DataType::Byte,
            Value::Ascii(_) => DataType::Ascii,
            Value::Short(_) => DataType::Short,
            Value::Long(_) => DataType::Long,
            Value::Rational(_) => DataType::Rational,
            Value::SByte(_) => DataType::SByte,
            Value::Undefined(_) => DataType::Undefined,
            Value::SShort(_) => DataType::SShort,
            Value::SLong(_) => DataType::SLong,
            Value::SRational(_) => DataType::SRational,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Ifd(_) => DataType::Ifd,
            Value::Long8(_) => DataType::Long8,
            Value::SLong8(_) => DataType::SLong8,
            Value::Ifd8(_) => DataType::Ifd8,
        }
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        match self {
            Value::Byte(v) | Value::Ascii(v) | Value::Undefined(v) => v.len(),
            Value::Short(v) => v.len(),
            Value::Long(v) | Value::Ifd(v) => v.len(),
            Value::Rational(v) => v.len(),
            Value::SByte(v) => v.len(),
            Value::SShort(v) => v.len(),
            Value::SLong(v) => v.len(),
            Value::SRational(v) => v.len(),
            Value::Float(v) => v.len(),
            Value::Double(v) => v.len(),
            Value::Long8(v) | Value::Ifd8(v) => v.len(),
            Value::SLong8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Size of the encoded payload in bytes.
    pub fn encoded_len(&self) -> u64 {
        self.count() as u64 * self.data_type().size_in_bytes() as u64
    }

    // -------------------------------------------------------------------------
    // Decoding
    // -------------------------------------------------------------------------

    /// Decode `count` elements of `data_type` from `bytes`.
    ///
    /// Fails if `bytes` is shorter than the declared payload.
    pub fn decode(
        data_type: DataType,
        count: usize,
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> Result<Self> {
        let width = data_type.size_in_bytes();
        let needed = count
            .checked_mul(width)
            .ok_or_else(|| TiffError::UnsupportedSize(format!("{count} elements of {data_type}")))?;
        if bytes.len() < needed {
            return Err(TiffError::Io(crate::error::IoError::UnexpectedEndOfData {
                offset: 0,
                requested: needed as u64,
                available: bytes.len() as u64,
            }));
        }
        let bytes = &bytes[..needed];

        let u16s = || bytes.chunks_exact(2).map(|c| byte_order.read_u16(c));
        let u32s = || bytes.chunks_exact(4).map(|c| byte_order.read_u32(c));
        let u64s = || bytes.chunks_exact(8).map(|c| byte_order.read_u64(c));

        Ok(match data_type {
            DataType::Byte => Value::Byte(bytes.to_vec()),
            DataType::Ascii => Value::Ascii(bytes.to_vec()),
            DataType::Undefined => Value::Undefined(bytes.to_vec()),
            DataType::SByte => Value::SByte(bytes.iter().map(|&b| b as i8).collect()),
            DataType::Short => Value::Short(u16s().collect()),
            DataType::SShort => Value::SShort(u16s().map(|v| v as i16).collect()),
            DataType::Long => Value::Long(u32s().collect()),
            DataType::Ifd => Value::Ifd(u32s().collect()),
            DataType::SLong => Value::SLong(u32s().map(|v| v as i32).collect()),
            DataType::Float => Value::Float(u32s().map(f32::from_bits).collect()),
            DataType::Rational => {
                let raw: Vec<u32> = u32s().collect();
                Value::Rational(raw.chunks_exact(2).map(|p| (p[0], p[1])).collect())
            }
            DataType::SRational => {
                let raw: Vec<i32> = u32s().map(|v| v as i32).collect();
                Value::SRational(raw.chunks_exact(2).map(|p| (p[0], p[1])).collect())
            }
            DataType::Double => Value::Double(u64s().map(f64::from_bits).collect()),
            DataType::Long8 => Value::Long8(u64s().collect()),
            DataType::Ifd8 => Value::Ifd8(u64s().collect()),
            DataType::SLong8 => Value::SLong8(u64s().map(|v| v as i64).collect()),
        })
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    /// Append the encoded payload to `out`.
    pub fn encode(&self, byte_order: ByteOrder, out: &mut Vec<u8>) {
        fn put<const N: usize>(out: &mut Vec<u8>, le: [u8; N], be: [u8; N], order: ByteOrder) {
            match order {
                ByteOrder::LittleEndian => out.extend_from_slice(&le),
                ByteOrder::BigEndian => out.extend_from_slice(&be),
            }
        }

        let o = byte_order;
        match self {
            Value::Byte(v) | Value::Ascii(v) | Value::Undefined(v) => out.extend_from_slice(v),
            Value::SByte(v) => out.extend(v.iter().map(|&b| b as u8)),
            Value::Short(v) => v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o)),
            Value::SShort(v) => v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o)),
            Value::Long(v) | Value::Ifd(v) => {
                v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o))
            }
            Value::SLong(v) => v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o)),
            Value::Float(v) => v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o)),
            Value::Rational(v) => v.iter().for_each(|(n, d)| {
                put(out, n.to_le_bytes(), n.to_be_bytes(), o);
                put(out, d.to_le_bytes(), d.to_be_bytes(), o);
            }),
            Value::SRational(v) => v.iter().for_each(|(n, d)| {
                put(out, n.to_le_bytes(), n.to_be_bytes(), o);
                put(out, d.to_le_bytes(), d.to_be_bytes(), o);
            }),
            Value::Double(v) => v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o)),
            Value::Long8(v) | Value::Ifd8(v) => {
                v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o))
            }
            Value::SLong8(v) => v.iter().for_each(|x| put(out, x.to_le_bytes(), x.to_be_bytes(), o)),
        }
    }

    /// Encoded payload as a fresh buffer.
    pub fn to_bytes(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        self.encode(byte_order, &mut out);
        out
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// BYTE or UNDEFINED payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Byte(v) | Value::Undefined(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_shorts(&self) -> Option<&[u16]> {
        match self {
            Value::Short(v) => Some(v),
            _ => None,
        }
    }

    /// LONG or IFD payload.
    pub fn as_longs(&self) -> Option<&[u32]> {
        match self {
            Value::Long(v) | Value::Ifd(v) => Some(v),
            _ => None,
        }
    }

    /// LONG8 or IFD8 payload.
    pub fn as_long8s(&self) -> Option<&[u64]> {
        match self {
            Value::Long8(v) | Value::Ifd8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rationals(&self) -> Option<&[(u32, u32)]> {
        match self {
            Value::Rational(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Every element widened to i64, for integer values.
    pub fn to_i64s(&self) -> Option<Vec<i64>> {
        Some(match self {
            Value::Byte(v) | Value::Undefined(v) => v.iter().map(|&x| x as i64).collect(),
            Value::Short(v) => v.iter().map(|&x| x as i64).collect(),
            Value::Long(v) | Value::Ifd(v) => v.iter().map(|&x| x as i64).collect(),
            Value::SByte(v) => v.iter().map(|&x| x as i64).collect(),
            Value::SShort(v) => v.iter().map(|&x| x as i64).collect(),
            Value::SLong(v) => v.iter().map(|&x| x as i64).collect(),
            Value::SLong8(v) => v.clone(),
            Value::Long8(v) | Value::Ifd8(v) => {
                return v.iter().map(|&x| i64::try_from(x).ok()).collect()
            }
            _ => return None,
        })
    }

    /// Every element widened to u64, for integer values with no negatives.
    pub fn to_u64s(&self) -> Option<Vec<u64>> {
        match self {
            Value::Long8(v) | Value::Ifd8(v) => Some(v.clone()),
            _ => self
                .to_i64s()?
                .into_iter()
                .map(|x| u64::try_from(x).ok())
                .collect(),
        }
    }

    /// Every element as f64, for numeric values.
    ///
    /// Rationals with a zero denominator read as NaN.
    pub fn to_f64s(&self) -> Option<Vec<f64>> {
        let ratio = |n: f64, d: f64| if d == 0.0 { f64::NAN } else { n / d };
        match self {
            Value::Rational(v) => Some(v.iter().map(|&(n, d)| ratio(n as f64, d as f64)).collect()),
            Value::SRational(v) => {
                Some(v.iter().map(|&(n, d)| ratio(n as f64, d as f64)).collect())
            }
            Value::Float(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Value::Double(v) => Some(v.clone()),
            Value::Long8(v) | Value::Ifd8(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Value::Ascii(_) => None,
            _ => Some(self.to_i64s()?.into_iter().map(|x| x as f64).collect()),
        }
    }

    /// First NUL-terminated string of an ASCII value.
    pub fn as_str(&self) -> Option<String> {
        match self {
            Value::Ascii(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Conversion
    // -------------------------------------------------------------------------

    /// Re-express this value as `target`, if every element is representable.
    ///
    /// Integers convert between integer types within range, integers and
    /// reals convert to real types, and byte blobs convert between BYTE and
    /// UNDEFINED. Returns `None` otherwise.
    pub fn convert_to(&self, target: DataType) -> Option<Value> {
        if self.data_type() == target {
            return Some(self.clone());
        }

        match self {
            Value::Byte(v) | Value::Undefined(v) if target == DataType::Undefined => {
                return Some(Value::Undefined(v.clone()))
            }
            Value::Byte(v) | Value::Undefined(v) if target == DataType::Byte => {
                return Some(Value::Byte(v.clone()))
            }
            Value::Ascii(_) => return None,
            _ => {}
        }

        if target.is_integer() {
            let ints = self.to_i64s()?;
            return Self::from_i64s(target, &ints);
        }

        let reals = self.to_f64s()?;
        match target {
            DataType::Float => Some(Value::Float(reals.iter().map(|&x| x as f32).collect())),
            DataType::Double => Some(Value::Double(reals)),
            DataType::Rational => Value::rationals(&reals).ok(),
            DataType::SRational => Value::signed_rationals(&reals).ok(),
            _ => None,
        }
    }

    /// Unsigned integers stored as `target`, if every element fits.
    pub fn from_u64s(target: DataType, values: &[u64]) -> Option<Value> {
        fn narrow<T: TryFrom<u64>>(values: &[u64]) -> Option<Vec<T>> {
            values.iter().map(|&x| T::try_from(x).ok()).collect()
        }

        Some(match target {
            DataType::Byte => Value::Byte(narrow(values)?),
            DataType::Short => Value::Short(narrow(values)?),
            DataType::Long => Value::Long(narrow(values)?),
            DataType::Ifd => Value::Ifd(narrow(values)?),
            DataType::Long8 => Value::Long8(values.to_vec()),
            DataType::Ifd8 => Value::Ifd8(values.to_vec()),
            _ => return None,
        })
    }

    fn from_i64s(target: DataType, ints: &[i64]) -> Option<Value> {
        fn narrow<T: TryFrom<i64>>(ints: &[i64]) -> Option<Vec<T>> {
            ints.iter().map(|&x| T::try_from(x).ok()).collect()
        }

        Some(match target {
            DataType::Byte => Value::Byte(narrow(ints)?),
            DataType::Undefined => Value::Undefined(narrow(ints)?),
            DataType::Short => Value::Short(narrow(ints)?),
            DataType::Long => Value::Long(narrow(ints)?),
            DataType::Ifd => Value::Ifd(narrow(ints)?),
            DataType::SByte => Value::SByte(narrow(ints)?),
            DataType::SShort => Value::SShort(narrow(ints)?),
            DataType::SLong => Value::SLong(narrow(ints)?),
            DataType::SLong8 => Value::SLong8(ints.to_vec()),
            DataType::Long8 => Value::Long8(narrow(ints)?),
            DataType::Ifd8 => Value::Ifd8(narrow(ints)?),
            _ => return None,
        })
    }
}

// =============================================================================
// Rational encoding
// =============================================================================

/// Approximate `value` as a (numerator, denominator) pair.
///
/// Numerator and denominator are scaled by ten until the numerator is
/// integral or the next step would pass the 32-bit precision ceiling, then
/// reduced. `0.0` encodes as `0/1`.
///
/// # Errors
/// - `NegativeRational` for negative input when `signed` is false
/// - `UnsupportedSize` for non-finite input or magnitudes past the ceiling
pub fn rat_to_ints(value: f64, signed: bool) -> Result<(i64, i64)> {
    let ceiling = if signed {
        i32::MAX as f64
    } else {
        u32::MAX as f64
    };

    if !value.is_finite() {
        return Err(TiffError::UnsupportedSize(format!(
            "{value} has no rational representation"
        )));
    }
    if value < 0.0 && !signed {
        return Err(TiffError::NegativeRational(value));
    }
    if value.abs() > ceiling {
        return Err(TiffError::UnsupportedSize(format!(
            "{value} exceeds the rational numerator range"
        )));
    }

    let mut num = value;
    let mut den = 1.0_f64;
    while num.fract() != 0.0
        && (num * RATIONAL_STEP).abs() <= ceiling
        && den * RATIONAL_STEP <= ceiling
    {
        num *= RATIONAL_STEP;
        den *= RATIONAL_STEP;
    }

    let n = num.round() as i64;
    let d = den as i64;
    let g = gcd(n.unsigned_abs(), d as u64).max(1) as i64;
    Ok((n / g, d / g))
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Decode / encode
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_shorts_both_orders() {
        let bytes = [0x01, 0x00, 0x02, 0x00];
        let le = Value::decode(DataType::Short, 2, &bytes, ByteOrder::LittleEndian).unwrap();
        assert_eq!(le, Value::Short(vec![1, 2]));

        let be = Value::decode(DataType::Short, 2, &bytes, ByteOrder::BigEndian).unwrap();
        assert_eq!(be, Value::Short(vec![0x0100, 0x0200]));
    }

    #[test]
    fn test_decode_rationals() {
        let mut bytes = Vec::new();
        Value::Rational(vec![(72, 1), (300, 2)]).encode(ByteOrder::BigEndian, &mut bytes);
        assert_eq!(bytes.len(), 16);
        let decoded = Value::decode(DataType::Rational, 2, &bytes, ByteOrder::BigEndian).unwrap();
        assert_eq!(decoded, Value::Rational(vec![(72, 1), (300, 2)]));
        assert_eq!(decoded.to_f64s().unwrap(), vec![72.0, 150.0]);
    }

    #[test]
    fn test_decode_short_input() {
        let err = Value::decode(DataType::Long, 2, &[0, 0, 0, 0], ByteOrder::LittleEndian);
        assert!(err.is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        // Inline field padding after the payload
        let v = Value::decode(DataType::Short, 1, &[5, 0, 9, 9], ByteOrder::LittleEndian).unwrap();
        assert_eq!(v, Value::Short(vec![5]));
    }

    #[test]
    fn test_encode_doubles_big_endian() {
        let bytes = Value::Double(vec![1.0]).to_bytes(ByteOrder::BigEndian);
        assert_eq!(bytes, 1.0f64.to_be_bytes().to_vec());
    }

    // -------------------------------------------------------------------------
    // Views and conversion
    // -------------------------------------------------------------------------

    #[test]
    fn test_widening_views() {
        assert_eq!(Value::Short(vec![1, 2, 3]).to_u64s(), Some(vec![1, 2, 3]));
        assert_eq!(Value::Byte(vec![255]).to_u64s(), Some(vec![255]));
        assert_eq!(Value::SShort(vec![-1]).to_u64s(), None);
        assert_eq!(Value::SShort(vec![-1]).to_i64s(), Some(vec![-1]));
        assert_eq!(Value::Ascii(b"x\0".to_vec()).to_u64s(), None);
        assert_eq!(Value::Long8(vec![u64::MAX]).to_u64s(), Some(vec![u64::MAX]));
    }

    #[test]
    fn test_ascii_helpers() {
        let v = Value::ascii("hello");
        assert_eq!(v.count(), 6);
        assert_eq!(v.as_str().as_deref(), Some("hello"));
        assert_eq!(Value::Short(vec![1]).as_str(), None);
    }

    #[test]
    fn test_strict_accessors() {
        let v = Value::Short(vec![1, 2]);
        assert_eq!(v.as_shorts(), Some(&[1u16, 2][..]));
        assert_eq!(v.as_longs(), None);
        assert_eq!(Value::Ifd(vec![8]).as_longs(), Some(&[8u32][..]));
        assert_eq!(Value::Undefined(vec![3]).as_bytes(), Some(&[3u8][..]));
    }

    #[test]
    fn test_from_u64s() {
        assert_eq!(
            Value::from_u64s(DataType::Short, &[1, 2]),
            Some(Value::Short(vec![1, 2]))
        );
        assert_eq!(Value::from_u64s(DataType::Short, &[70_000]), None);
        assert_eq!(Value::from_u64s(DataType::Double, &[1]), None);
    }

    #[test]
    fn test_convert_integers() {
        let v = Value::Long(vec![1, 70_000]);
        assert_eq!(v.convert_to(DataType::Short), None);
        assert_eq!(v.convert_to(DataType::Long8), Some(Value::Long8(vec![1, 70_000])));
        assert_eq!(
            Value::Long8(vec![12]).convert_to(DataType::Long),
            Some(Value::Long(vec![12]))
        );
        assert_eq!(
            Value::Byte(vec![1]).convert_to(DataType::Undefined),
            Some(Value::Undefined(vec![1]))
        );
        assert_eq!(Value::ascii("a").convert_to(DataType::Byte), None);
    }

    #[test]
    fn test_convert_to_rational() {
        let v = Value::Double(vec![0.5, 300.0]);
        assert_eq!(
            v.convert_to(DataType::Rational),
            Some(Value::Rational(vec![(1, 2), (300, 1)]))
        );
        assert_eq!(Value::Double(vec![-1.0]).convert_to(DataType::Rational), None);
    }

    // -------------------------------------------------------------------------
    // Rationals
    // -------------------------------------------------------------------------

    #[test]
    fn test_rat_to_ints_half() {
        let (n, d) = rat_to_ints(0.5, false).unwrap();
        assert!((n as f64 / d as f64 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rat_to_ints_zero_has_denominator() {
        let (n, d) = rat_to_ints(0.0, false).unwrap();
        assert_eq!(n, 0);
        assert_ne!(d, 0);
    }

    #[test]
    fn test_rat_to_ints_itu_coefficients() {
        assert_eq!(rat_to_ints(0.299, false).unwrap(), (299, 1000));
        assert_eq!(rat_to_ints(0.587, false).unwrap(), (587, 1000));
        assert_eq!(rat_to_ints(72.0, false).unwrap(), (72, 1));
    }

    #[test]
    fn test_rat_to_ints_bounded_precision() {
        let (n, d) = rat_to_ints(std::f64::consts::PI, false).unwrap();
        assert!(n <= u32::MAX as i64 && d <= u32::MAX as i64);
        assert!((n as f64 / d as f64 - std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_rat_to_ints_negative() {
        assert!(matches!(
            rat_to_ints(-0.25, false),
            Err(TiffError::NegativeRational(_))
        ));
        assert_eq!(rat_to_ints(-0.25, true).unwrap(), (-1, 4));
    }

    #[test]
    fn test_rat_to_ints_rejects_non_finite() {
        assert!(rat_to_ints(f64::NAN, false).is_err());
        assert!(rat_to_ints(1e12, false).is_err());
    }
}
