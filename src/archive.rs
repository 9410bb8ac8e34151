//! Repack the files of a ROM that are listed in a file address table.
//!
//! The table is a list of big endian addresses into the ROM, ended by a zero
//! address. Each pair of consecutive addresses is the start and end of one
//! file, so `n` addresses describe `n - 1` files. The top bit of a start address
//! marks the file as an LZKN64 stream.
//!
//! ```text
//! 0x00000040  file 0 starts at 0x40, stored as-is
//! 0x800000A4  file 1 starts at 0xA4, compressed
//! 0x000000B2  end of file 1, the last file
//! 0x00000000  end of table
//! ```
//!
//! Repacking rewrites every file back to back from the first file's start,
//! then rewrites the table in place.

use crate::{
    decode::decompress,
    encode::{encode, Variant},
    errors::Lzkn64Error,
};
use std::borrow::Cow;
use tracing::{debug, info};

/// Set on a start address when the file is compressed
pub const COMPRESSED_FLAG: u32 = 0x8000_0000;

const ADDRESS_SIZE: usize = 4;

/// One file in a [`FileTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub start: usize,
    pub end: usize,
    pub compressed: bool,
}

impl TableEntry {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The file address table of a ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTable {
    /// where the table is stored in the ROM
    offset: usize,
    /// every address before the zero terminator, flags included
    addresses: Vec<u32>,
}

impl FileTable {
    /// Read the table stored at `offset` in `rom`.
    ///
    /// Fails if the table runs off the end of `rom`, if an address points
    /// past the end of `rom`, or if a file would end before it starts.
    pub fn read(rom: &[u8], offset: usize) -> Result<Self, Lzkn64Error> {
        let mut addresses = Vec::new();

        loop {
            let index = addresses.len();
            let at = offset + index * ADDRESS_SIZE;
            let address = rom
                .get(at..at + ADDRESS_SIZE)
                .and_then(|b| <[u8; ADDRESS_SIZE]>::try_from(b).ok())
                .map(u32::from_be_bytes)
                .ok_or(Lzkn64Error::InvalidTableEntry { index, address: 0 })?;

            if address == 0 {
                break;
            }

            let masked = (address & !COMPRESSED_FLAG) as usize;
            let before = addresses
                .last()
                .map_or(0, |&prev: &u32| (prev & !COMPRESSED_FLAG) as usize);
            if masked > rom.len() || masked < before {
                return Err(Lzkn64Error::InvalidTableEntry { index, address });
            }

            addresses.push(address);
        }

        debug!(
            "read {} addresses from the file table at {:#x}",
            addresses.len(),
            offset
        );

        Ok(Self { offset, addresses })
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of files in the table
    pub fn len(&self) -> usize {
        self.addresses.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End of the table in the ROM, zero terminator included
    pub fn end(&self) -> usize {
        self.offset + (self.addresses.len() + 1) * ADDRESS_SIZE
    }

    /// The raw addresses, with their flags
    pub fn addresses(&self) -> &[u32] {
        &self.addresses
    }

    pub fn entry(&self, index: usize) -> Option<TableEntry> {
        let start = *self.addresses.get(index)?;
        let end = *self.addresses.get(index + 1)?;

        Some(TableEntry {
            start: (start & !COMPRESSED_FLAG) as usize,
            end: (end & !COMPRESSED_FLAG) as usize,
            compressed: start & COMPRESSED_FLAG != 0,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = TableEntry> + '_ {
        (0..self.len()).filter_map(move |i| self.entry(i))
    }

    /// Store the addresses back at the table's offset in `rom`
    fn write(&self, rom: &mut [u8]) -> Result<(), Lzkn64Error> {
        let end = self.offset + self.addresses.len() * ADDRESS_SIZE;
        let rom_size = rom.len();
        let dst = rom
            .get_mut(self.offset..end)
            .ok_or(Lzkn64Error::TableOverlap {
                table_end: self.end(),
                payload_start: rom_size,
            })?;

        for (chunk, address) in dst.chunks_exact_mut(ADDRESS_SIZE).zip(&self.addresses) {
            chunk.copy_from_slice(&address.to_be_bytes());
        }

        Ok(())
    }
}

/// Settings for a [`Repacker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepackSettings {
    /// ROM offset of the file address table
    pub table_offset: usize,
    /// Encoder used when compressing files
    pub variant: Variant,
    /// Zero fill the output up to the next power of two
    pub pad_to_power_of_two: bool,
}

impl RepackSettings {
    pub fn new(table_offset: usize) -> Self {
        Self {
            table_offset,
            variant: Variant::Accurate,
            pad_to_power_of_two: false,
        }
    }
}

/// Compress or decompress every file in a ROM's file address table.
///
/// ```
/// # use lzkn64::archive::{RepackSettings, Repacker};
/// // a table at 0x10 listing one 64 byte file at 0x20
/// let mut rom = vec![0u8; 0x60];
/// rom[0x10..0x18].copy_from_slice(&[0, 0, 0, 0x20, 0, 0, 0, 0x60]);
///
/// let packed = Repacker::new(&rom, RepackSettings::new(0x10)).compress().unwrap();
/// assert!(packed.len() < rom.len());
///
/// let unpacked = Repacker::new(&packed, RepackSettings::new(0x10)).decompress().unwrap();
/// assert_eq!(unpacked, rom);
/// ```
pub struct Repacker<'a> {
    rom: &'a [u8],
    reference: Option<&'a [u8]>,
    settings: RepackSettings,
}

impl<'a> Repacker<'a> {
    pub fn new(rom: &'a [u8], settings: RepackSettings) -> Self {
        Self {
            rom,
            reference: None,
            settings,
        }
    }

    /// Only compress the files that are compressed in `reference`, so that
    /// a ROM can be rebuilt to match an original image.
    #[inline]
    pub fn with_reference(&mut self, reference: &'a [u8]) -> &mut Self {
        self.reference = Some(reference);
        self
    }

    /// Compress every uncompressed file, and flag it in the table.
    pub fn compress(&self) -> Result<Vec<u8>, Lzkn64Error> {
        let table = FileTable::read(self.rom, self.settings.table_offset)?;
        let reference = self
            .reference
            .map(|r| FileTable::read(r, self.settings.table_offset))
            .transpose()?;
        let variant = self.settings.variant;

        self.rebuild(&table, |index, entry, data| {
            if entry.compressed || entry.is_empty() {
                return Ok((Cow::Borrowed(data), entry.compressed));
            }

            let wanted = reference
                .as_ref()
                .map_or(true, |r| r.entry(index).map_or(false, |e| e.compressed));
            if !wanted {
                debug!("file {}: not compressed in the reference, copying", index);
                return Ok((Cow::Borrowed(data), false));
            }

            let mut packed = encode(data, variant)?;
            // files are aligned to two bytes
            if packed.len() % 2 != 0 {
                packed.push(0);
            }
            debug!("file {}: compressed {:#x} -> {:#x}", index, data.len(), packed.len());

            Ok((Cow::Owned(packed), true))
        })
    }

    /// Decompress every compressed file, and clear its flag in the table.
    pub fn decompress(&self) -> Result<Vec<u8>, Lzkn64Error> {
        let table = FileTable::read(self.rom, self.settings.table_offset)?;

        self.rebuild(&table, |index, entry, data| {
            if !entry.compressed || entry.is_empty() {
                return Ok((Cow::Borrowed(data), entry.compressed));
            }

            let unpacked = decompress(data)?;
            debug!("file {}: decompressed {:#x} -> {:#x}", index, data.len(), unpacked.len());

            Ok((Cow::Owned(unpacked), false))
        })
    }

    /// Lay out the files produced by `repack` after the data that precedes the
    /// first file, then write the new table.
    fn rebuild<F>(&self, table: &FileTable, mut repack: F) -> Result<Vec<u8>, Lzkn64Error>
    where
        F: FnMut(usize, TableEntry, &'a [u8]) -> Result<(Cow<'a, [u8]>, bool), Lzkn64Error>,
    {
        let rom = self.rom;
        let payload_start = match table.entry(0) {
            Some(first) => first.start,
            None => {
                info!("file table at {:#x} lists no files", table.offset());
                return Ok(self.finish(rom.to_vec()));
            }
        };

        if table.end() > payload_start {
            return Err(Lzkn64Error::TableOverlap {
                table_end: table.end(),
                payload_start,
            });
        }

        let mut output = rom[..payload_start].to_vec();
        let mut addresses = Vec::with_capacity(table.addresses().len());
        let mut changed = 0;

        for (index, entry) in table.entries().enumerate() {
            let (data, compressed) = repack(index, entry, &rom[entry.start..entry.end])?;
            if compressed != entry.compressed {
                changed += 1;
            }

            let start = table_address(output.len())?;
            addresses.push(if compressed { start | COMPRESSED_FLAG } else { start });
            output.extend_from_slice(&data);
        }
        addresses.push(table_address(output.len())?);

        let new_table = FileTable {
            offset: table.offset(),
            addresses,
        };
        new_table.write(&mut output)?;

        info!(
            "repacked {} files ({} changed): {:#x} -> {:#x} bytes",
            table.len(),
            changed,
            rom.len(),
            output.len()
        );

        Ok(self.finish(output))
    }

    fn finish(&self, mut output: Vec<u8>) -> Vec<u8> {
        if self.settings.pad_to_power_of_two {
            pad_to_power_of_two(&mut output);
        }
        output
    }
}

fn table_address(position: usize) -> Result<u32, Lzkn64Error> {
    u32::try_from(position)
        .ok()
        .filter(|&a| a & COMPRESSED_FLAG == 0)
        .ok_or(Lzkn64Error::StreamTooLarge(position))
}

/// Zero fill `rom` up to the next power of two size
pub fn pad_to_power_of_two(rom: &mut Vec<u8>) {
    let size = rom.len().next_power_of_two();
    rom.resize(size, 0);
}
