//! PNG and TIFF predictors applied after FlateDecode.

use crate::error::{Error, Result};

/// Predictor parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// 1 = none, 2 = TIFF, 10-15 = PNG
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

/// Largest `/Columns` accepted in `/DecodeParms`.
pub const MAX_COLUMNS: i64 = 1 << 24;
/// Largest `/Colors` accepted in `/DecodeParms`.
pub const MAX_COLORS: i64 = 32;

impl DecodeParams {
    /// Read predictor parameters from integer `/DecodeParms` values.
    ///
    /// Columns and colors must be positive and within [`MAX_COLUMNS`] and
    /// [`MAX_COLORS`]; bits per component must be 1, 2, 4, 8 or 16.
    pub fn from_values(predictor: i64, columns: i64, colors: i64, bits_per_component: i64) -> Result<Self> {
        let bounded = |name: &str, value: i64, max: i64| {
            if (1..=max).contains(&value) {
                Ok(value as usize)
            } else {
                Err(Error::Decode(format!("/{} out of range: {}", name, value)))
            }
        };
        let bits_per_component = match bits_per_component {
            1 | 2 | 4 | 8 | 16 => bits_per_component as usize,
            other => return Err(Error::Decode(format!("/BitsPerComponent out of range: {}", other))),
        };

        Ok(Self {
            predictor,
            columns: bounded("Columns", columns, MAX_COLUMNS)?,
            colors: bounded("Colors", colors, MAX_COLORS)?,
            bits_per_component,
        })
    }

    /// Bytes of sample data per row, excluding any PNG tag byte.
    pub fn pixel_bytes_per_row(&self) -> Result<usize> {
        let bits = self
            .columns
            .checked_mul(self.colors)
            .and_then(|n| n.checked_mul(self.bits_per_component))
            .ok_or_else(|| Error::Decode("predictor row size overflows".to_string()))?;
        match bits.div_ceil(8) {
            0 => Err(Error::Decode("predictor row size is zero".to_string())),
            len => Ok(len),
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        self.colors
            .saturating_mul(self.bits_per_component)
            .div_ceil(8)
            .max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.pixel_bytes_per_row()?;
    let bpp = params.bytes_per_pixel();
    let mut out = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let start = out.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { out[start + i - bpp] } else { 0 };
            out.push(byte.wrapping_add(left));
        }
    }
    Ok(out)
}

/// Every PNG row starts with its own filter-type byte, whatever /Predictor says.
fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row()?;
    let bpp = params.bytes_per_pixel();
    let stride = row_len
        .checked_add(1)
        .ok_or_else(|| Error::Decode("predictor row size overflows".to_string()))?;

    if data.len() % stride != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            stride
        )));
    }

    let mut out = Vec::with_capacity(data.len() / stride * row_len);
    let mut prev = vec![0u8; row_len];

    for row in data.chunks(stride) {
        let (tag, encoded) = (row[0], &row[1..]);
        let mut current = vec![0u8; row_len];

        for i in 0..row_len {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };

            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other))),
            };
            current[i] = encoded[i].wrapping_add(predicted);
        }

        out.extend_from_slice(&current);
        prev = current;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
