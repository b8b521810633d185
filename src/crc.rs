const POLYNOMIAL: u32 = 0xEDB88320;

const fn gen_crc_table() -> [[u32; 256]; 8] {
    let mut table: [[u32; 256]; 8] = [[0; 256]; 8];

    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            j += 1;
        }

        table[0][i] = crc;
        i += 1;
    }

    let mut k = 1;
    while k < 8 {
        let mut j = 0;
        while j < 256 {
            let prev = table[k - 1][j];
            table[k][j] = (prev >> 8) ^ table[0][(prev & 0xFF) as usize];
            j += 1;
        }
        k += 1;
    }

    table
}

static CRC_TABLE: [[u32; 256]; 8] = gen_crc_table();

/// Compute the CRC-32 (IEEE) of a byte slice held entirely in memory.
///
/// Streaming computations should use [`Crc32`] or a
/// [`ChecksumTracker`](crate::ChecksumTracker).
pub fn crc32(data: &[u8]) -> u32 {
    crc32_chunk(data, 0)
}

/// Continue a CRC-32 computation where `prev` is the result over all the
/// preceding bytes.
#[inline]
pub fn crc32_chunk(data: &[u8], prev: u32) -> u32 {
    let mut chunks = data.chunks_exact(8);
    let mut crc = chunks.by_ref().fold(!prev, |crc, chunk| {
        let lo = crc ^ u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let hi = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        CRC_TABLE[7][(lo & 0xFF) as usize]
            ^ CRC_TABLE[6][((lo >> 8) & 0xFF) as usize]
            ^ CRC_TABLE[5][((lo >> 16) & 0xFF) as usize]
            ^ CRC_TABLE[4][(lo >> 24) as usize]
            ^ CRC_TABLE[3][(hi & 0xFF) as usize]
            ^ CRC_TABLE[2][((hi >> 8) & 0xFF) as usize]
            ^ CRC_TABLE[1][((hi >> 16) & 0xFF) as usize]
            ^ CRC_TABLE[0][(hi >> 24) as usize]
    });

    crc = chunks.remainder().iter().fold(crc, |crc, &x| {
        (crc >> 8) ^ CRC_TABLE[0][((crc ^ u32::from(x)) & 0xFF) as usize]
    });

    !crc
}

/// Incremental CRC-32 (IEEE) state.
///
/// ```
/// let mut hasher = zipcodec::Crc32::new();
/// hasher.update(b"1234");
/// hasher.update(b"56789");
/// assert_eq!(hasher.value(), 0xCBF43926);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    pub const fn new() -> Self {
        Crc32 { value: 0 }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.value = crc32_chunk(data, self.value);
    }

    /// The checksum over every byte passed to `update` so far
    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }
}
