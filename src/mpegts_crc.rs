//! The CRC-32 variant used by MPEG-2 sections: polynomial `0x04C11DB7`, initial value
//! `0xffffffff`, no bit reflection and no final XOR.

use crc::{Crc, CRC_32_MPEG_2};

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Computes the CRC over the given data.
///
/// Computing the sum over a whole section, including its trailing `CRC_32` field, yields `0` when
/// the section is intact.
pub fn sum32(data: &[u8]) -> u32 {
    CRC_MPEG.checksum(data)
}
