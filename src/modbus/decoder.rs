use thiserror::Error;

use crate::config::points::{DataType, MetricDef};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unsupported data type '{0}'")]
    UnsupportedDataType(String),

    #[error("{data_type} at offset {offset} needs {needed} registers, only {available} available")]
    InsufficientRegisters {
        data_type: DataType,
        offset: u16,
        needed: usize,
        available: usize,
    },
}

/// Turn the words of one group read into the engineering value of `metric`.
///
/// INT16 words are unsigned magnitudes divided by `scale_factor`; there is no
/// sign extension. FLOAT32 takes the word at `register_offset` as the high half
/// and the next word as the low half of a big-endian IEEE-754 value.
pub fn decode(registers: &[u16], metric: &MetricDef) -> Result<f64, DecodeError> {
    let width = metric
        .data_type
        .register_width()
        .ok_or_else(|| DecodeError::UnsupportedDataType(metric.data_type.to_string()))?;

    let offset = usize::from(metric.register_offset);
    let needed = offset + usize::from(width);
    if needed > registers.len() {
        return Err(DecodeError::InsufficientRegisters {
            data_type: metric.data_type.clone(),
            offset: metric.register_offset,
            needed,
            available: registers.len(),
        });
    }

    match metric.data_type {
        DataType::Int16 => Ok(f64::from(registers[offset]) / metric.scale_factor),
        DataType::Float32 => {
            let hi = registers[offset].to_be_bytes();
            let lo = registers[offset + 1].to_be_bytes();
            Ok(f64::from(f32::from_be_bytes([hi[0], hi[1], lo[0], lo[1]])))
        }
        DataType::Unsupported(ref name) => Err(DecodeError::UnsupportedDataType(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(offset: u16, data_type: DataType, scale_factor: f64) -> MetricDef {
        MetricDef {
            id: "m".to_string(),
            display_name: "M".to_string(),
            unit: String::new(),
            register_offset: offset,
            data_type,
            scale_factor,
        }
    }

    #[test]
    fn test_int16_divides_by_scale() {
        let registers = [0, 1234, 7];
        assert_eq!(decode(&registers, &metric(1, DataType::Int16, 10.0)), Ok(123.4));
        assert_eq!(decode(&registers, &metric(2, DataType::Int16, 1.0)), Ok(7.0));
    }

    #[test]
    fn test_int16_is_unsigned() {
        let registers = [0xFFFF];
        assert_eq!(decode(&registers, &metric(0, DataType::Int16, 1.0)), Ok(65535.0));
    }

    #[test]
    fn test_float32_big_endian_word_order() {
        let registers = [0x4049, 0x0FDB];
        let value = decode(&registers, &metric(0, DataType::Float32, 1.0)).unwrap();
        assert!((value - std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_float32_ignores_scale_factor() {
        // 100.0f32 == 0x42C8_0000
        let registers = [0x42C8, 0x0000];
        assert_eq!(decode(&registers, &metric(0, DataType::Float32, 10.0)), Ok(100.0));
    }

    #[test]
    fn test_float32_at_last_register_fails() {
        let registers = [0x4049, 0x0FDB, 0, 0];
        assert_eq!(
            decode(&registers, &metric(3, DataType::Float32, 1.0)),
            Err(DecodeError::InsufficientRegisters {
                data_type: DataType::Float32,
                offset: 3,
                needed: 5,
                available: 4,
            })
        );
        assert!(decode(&registers, &metric(0, DataType::Float32, 1.0)).is_ok());
    }

    #[test]
    fn test_int16_out_of_range() {
        assert!(matches!(
            decode(&[1, 2], &metric(2, DataType::Int16, 1.0)),
            Err(DecodeError::InsufficientRegisters { .. })
        ));
        assert!(decode(&[], &metric(0, DataType::Int16, 1.0)).is_err());
    }

    #[test]
    fn test_unsupported_type() {
        let err = decode(&[1, 2, 3, 4], &metric(0, DataType::Unsupported("UINT64".into()), 1.0))
            .unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedDataType("UINT64".to_string()));
    }
}
