//! Bit-level reader over byte buffers.

/// A bit-level cursor over a byte buffer.
///
/// Implements the H.264 style bit reading operations needed for slice-header
/// and parameter-set parsing:
///
/// - fixed-width reads interpreted big-endian
/// - unsigned exponential Golomb codes (ue(v))
/// - signed exponential Golomb codes (se(v))
///
/// The reader is deliberately lenient: reading past the end of the buffer
/// yields `0` instead of an error, so callers that need strict behavior must
/// check [`BitReader::available_bits`] before reading.
///
/// Example:
/// ```
/// use vidsync::utils::BitReader;
///
/// let data = [0b1011_0011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bits(3), 0b101);
/// assert_eq!(reader.read_bits(5), 0b10011);
/// assert_eq!(reader.available_bits(), 0);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new reader positioned at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Returns the number of bits left to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }

    fn read_bit(&mut self) -> u32 {
        if self.byte_offset >= self.data.len() {
            return 0;
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        bit as u32
    }

    /// Reads `n` bits (`n <= 32`) as a big-endian unsigned number, advancing
    /// the cursor. Returns 0 without advancing if fewer than `n` bits remain.
    pub fn read_bits(&mut self, n: u32) -> u32 {
        if n == 0 || n > 32 || (n as usize) > self.available_bits() {
            return 0;
        }

        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit();
        }
        value
    }

    /// Reads `n` bits without advancing the cursor.
    pub fn peek_bits(&mut self, n: u32) -> u32 {
        let byte_offset = self.byte_offset;
        let bit_offset = self.bit_offset;
        let value = self.read_bits(n);
        self.byte_offset = byte_offset;
        self.bit_offset = bit_offset;
        value
    }

    /// Skips `n` bits, clamped to the end of the buffer.
    pub fn skip_bits(&mut self, n: u32) {
        let n = (n as usize).min(self.available_bits());
        for _ in 0..n {
            self.read_bit();
        }
    }

    /// Advances past consecutive zero bits and returns their count, leaving
    /// the cursor on the terminating set bit (or at the end of the buffer).
    pub fn skip_leading_zeros(&mut self) -> u32 {
        let mut count = 0;
        while self.available_bits() > 0 && self.peek_bits(1) == 0 {
            self.read_bit();
            count += 1;
        }
        count
    }

    /// Reads an unsigned exponential Golomb code (ue(v)):
    /// M leading zeros, a set bit, then M INFO bits; value = 2^M + INFO - 1.
    pub fn read_golomb(&mut self) -> u32 {
        let leading_zeros = self.skip_leading_zeros();
        self.read_bits(leading_zeros + 1).saturating_sub(1)
    }

    /// Reads a signed exponential Golomb code (se(v)). Odd codes map to
    /// positive values, even codes to negative ones.
    pub fn read_signed_golomb(&mut self) -> i32 {
        let k = self.read_golomb();
        if k == 0 {
            return 0;
        }

        let magnitude = ((k + 1) >> 1) as i32;
        if k & 1 == 1 {
            magnitude
        } else {
            -magnitude
        }
    }
}

#[cfg(test)]
mod test_utils {
    /// Encodes a single value as an ue(v) exp-Golomb code.
    pub fn encode_golomb(value: u32) -> Vec<u8> {
        if value == 0 {
            return vec![0b1000_0000];
        }

        let leading_zeros = 32 - (value + 1).leading_zeros() - 1;
        let info = value - ((1u32 << leading_zeros) - 1);

        let total_bits = (leading_zeros as usize) * 2 + 1;
        let total_bytes = (total_bits + 7) / 8;
        let mut result = vec![0u8; total_bytes];

        let mut bit_pos = leading_zeros as usize;

        result[bit_pos / 8] |= 1 << (7 - (bit_pos % 8));
        bit_pos += 1;

        for i in 0..leading_zeros as usize {
            let bit = (info >> (leading_zeros - 1 - i as u32)) & 1;
            if bit == 1 {
                result[bit_pos / 8] |= 1 << (7 - (bit_pos % 8));
            }
            bit_pos += 1;
        }

        result
    }

    /// Packs several ue(v) codes back to back into one byte array.
    pub fn encode_multiple_golomb(values: &[u32]) -> Vec<u8> {
        let mut bits = Vec::new();
        for &value in values {
            if value == 0 {
                bits.push(1u8);
                continue;
            }
            let leading_zeros = 32 - (value + 1).leading_zeros() - 1;
            let code = value + 1;
            for _ in 0..leading_zeros {
                bits.push(0);
            }
            for i in (0..=leading_zeros).rev() {
                bits.push(((code >> i) & 1) as u8);
            }
        }

        let mut result = vec![0u8; (bits.len() + 7) / 8];
        for (i, bit) in bits.iter().enumerate() {
            if *bit == 1 {
                result[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        let data = [0b1011_0011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3), 0b101);
        assert_eq!(reader.read_bits(5), 0b10011);

        // cross-byte boundary
        let data = [0b1011_0011, 0b0101_1010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3), 0b101);
        assert_eq!(reader.read_bits(8), 0b1001_1010);

        // exhausted reader yields zero and does not advance
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(16), 0);
        assert_eq!(reader.available_bits(), 8);
        assert_eq!(reader.read_bits(8), 0xFF);
        assert_eq!(reader.read_bits(1), 0);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0b1100_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.peek_bits(2), 0b11);
        assert_eq!(reader.available_bits(), 8);
        assert_eq!(reader.read_bits(2), 0b11);
    }

    #[test]
    fn test_skip_leading_zeros() {
        let data = [0b0001_0110];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.skip_leading_zeros(), 3);
        // cursor sits on the set bit
        assert_eq!(reader.read_bits(1), 1);

        // all-zero buffer stops at the end
        let data = [0x00];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.skip_leading_zeros(), 8);
        assert_eq!(reader.available_bits(), 0);
    }

    #[test]
    fn test_read_golomb() {
        // known patterns from the H.264 spec
        let test_cases = [
            ([0b1000_0000], 0, "1"),
            ([0b0100_0000], 1, "010"),
            ([0b0110_0000], 2, "011"),
            ([0b0010_0000], 3, "00100"),
            ([0b0010_1000], 4, "00101"),
            ([0b0011_0000], 5, "00110"),
            ([0b0011_1000], 6, "00111"),
            ([0b0001_0000], 7, "0001000"),
            ([0b0001_0010], 8, "0001001"),
        ];

        for (input, expected, pattern) in test_cases.iter() {
            let mut reader = BitReader::new(input);
            assert_eq!(reader.read_golomb(), *expected, "failed for {}", pattern);

            let encoded = encode_golomb(*expected);
            assert_eq!(&encoded[..1], input, "encoding {} gave wrong bits", expected);
        }
    }

    #[test]
    fn test_signed_golomb() {
        let test_cases = [
            ([0b1000_0000], 0),
            ([0b0100_0000], 1),
            ([0b0110_0000], -1),
            ([0b0010_0000], 2),
            ([0b0010_1000], -2),
            ([0b0011_0000], -3),
        ];

        for (input, expected) in test_cases.iter() {
            let mut reader = BitReader::new(input);
            assert_eq!(reader.read_signed_golomb(), *expected);
        }
    }

    #[test]
    fn test_consecutive_golomb() {
        let values = [3, 5, 1, 0, 4];
        let encoded = encode_multiple_golomb(&values);
        let mut reader = BitReader::new(&encoded);

        for &expected in &values {
            assert_eq!(reader.read_golomb(), expected);
        }
    }

    #[quickcheck]
    fn prop_golomb_round_trip(values: Vec<u16>) -> bool {
        if values.is_empty() {
            return true;
        }

        let values: Vec<u32> = values.into_iter().map(|v| v as u32).collect();
        let encoded = encode_multiple_golomb(&values);
        let mut reader = BitReader::new(&encoded);

        values.iter().all(|&expected| reader.read_golomb() == expected)
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        let n = (n % 33) as u32;
        let mut reader = BitReader::new(&data);
        let result = reader.read_bits(n);

        if n == 0 || (n as usize) > data.len() * 8 {
            return result == 0;
        }

        let mut expected = 0u32;
        for i in 0..n as usize {
            let bit = (data[i / 8] >> (7 - (i % 8))) & 1;
            expected = (expected << 1) | bit as u32;
        }
        result == expected
    }
}
