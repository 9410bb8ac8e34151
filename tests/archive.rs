use lzkn64::{
    archive::{FileTable, RepackSettings, Repacker, COMPRESSED_FLAG},
    decompress, Lzkn64Error, Variant,
};

const TABLE: usize = 0x100;
const DATA: usize = 0x200;

fn sample_files() -> Vec<Vec<u8>> {
    let lorem = include_str!("lorem.txt").as_bytes();
    vec![
        lorem.to_vec(),
        vec![0; 0x800],
        (0..=255).collect(),
        Vec::new(),
        lorem[..97].to_vec(),
        vec![0x5A; 3],
    ]
}

fn build_rom(files: &[Vec<u8>]) -> Vec<u8> {
    let mut rom: Vec<u8> = (0..DATA).map(|i| i as u8).collect();
    rom[TABLE..DATA].iter_mut().for_each(|b| *b = 0);

    let mut addresses = Vec::new();
    for file in files {
        addresses.push(rom.len() as u32);
        rom.extend_from_slice(file);
    }
    addresses.push(rom.len() as u32);

    for (i, address) in addresses.iter().enumerate() {
        let at = TABLE + i * 4;
        rom[at..at + 4].copy_from_slice(&address.to_be_bytes());
    }

    rom
}

#[test]
fn packed_files_decompress_to_the_originals() {
    let files = sample_files();
    let rom = build_rom(&files);

    for &variant in &[Variant::Accurate, Variant::Efficient] {
        let mut settings = RepackSettings::new(TABLE);
        settings.variant = variant;
        let packed = Repacker::new(&rom, settings).compress().unwrap();

        let table = FileTable::read(&packed, TABLE).unwrap();
        assert_eq!(table.len(), files.len());

        for (entry, original) in table.entries().zip(&files) {
            let data = &packed[entry.start..entry.end];
            assert_eq!(entry.start % 2, 0, "files stay two byte aligned");

            if original.is_empty() {
                assert!(!entry.compressed);
                assert!(entry.is_empty());
            } else {
                assert!(entry.compressed);
                assert_eq!(&decompress(data).unwrap(), original);
            }
        }

        let unpacked = Repacker::new(&packed, RepackSettings::new(TABLE))
            .decompress()
            .unwrap();
        assert_eq!(unpacked, rom);
    }
}

#[test]
fn repacking_a_packed_rom_changes_nothing() {
    let rom = build_rom(&sample_files());
    let settings = RepackSettings::new(TABLE);

    let packed = Repacker::new(&rom, settings).compress().unwrap();
    let repacked = Repacker::new(&packed, settings).compress().unwrap();
    assert_eq!(repacked, packed);
}

#[test]
fn reference_rom_is_matched() {
    let files = sample_files();
    let rom = build_rom(&files);

    // an "original" ROM where only the second and fifth files are compressed
    let mut reference = rom.clone();
    for &index in &[1usize, 4] {
        let at = TABLE + index * 4;
        let address = u32::from_be_bytes([
            reference[at],
            reference[at + 1],
            reference[at + 2],
            reference[at + 3],
        ]);
        reference[at..at + 4].copy_from_slice(&(address | COMPRESSED_FLAG).to_be_bytes());
    }

    let packed = Repacker::new(&rom, RepackSettings::new(TABLE))
        .with_reference(&reference)
        .compress()
        .unwrap();

    let flags: Vec<_> = FileTable::read(&packed, TABLE)
        .unwrap()
        .entries()
        .map(|e| e.compressed)
        .collect();
    assert_eq!(flags, [false, true, false, false, true, false]);
}

#[test]
fn bad_table_offset() {
    let rom = build_rom(&sample_files());

    let err = Repacker::new(&rom, RepackSettings::new(rom.len()))
        .compress()
        .unwrap_err();
    assert!(matches!(err, Lzkn64Error::InvalidTableEntry { index: 0, .. }));

    // the table lands in the middle of the lorem text
    let err = Repacker::new(&rom, RepackSettings::new(DATA))
        .decompress()
        .unwrap_err();
    assert!(matches!(err, Lzkn64Error::InvalidTableEntry { .. }));
}

#[test]
fn padded_output() {
    let rom = build_rom(&sample_files());
    let mut settings = RepackSettings::new(TABLE);
    settings.pad_to_power_of_two = true;

    let packed = Repacker::new(&rom, settings).compress().unwrap();
    assert!(packed.len().is_power_of_two());

    let table = FileTable::read(&packed, TABLE).unwrap();
    let end = table.entry(table.len() - 1).unwrap().end;
    assert!(packed[end..].iter().all(|&b| b == 0));
}
